
use std::io::{self, Error, ErrorKind, Write};

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

pub struct Packer {
	buff: Vec<u8>,
}

pub struct Unpacker {
	buff: Vec<u8>,
	pos: usize,
}

impl Packer {

	pub fn new() -> Self { Packer{ buff: Vec::new() } }

	pub fn reset(&mut self) { self.buff.clear(); }

	pub fn get_buf(&self) -> &[u8] { &self.buff }

	// Packing methods that can only add multiples of four bytes, so if we started off with the correct
	// padding, we'll end up with the correct padding
	pub fn pack_u32(&mut self, x:u32) -> io::Result<()> { self.buff.write_u32::<BigEndian>(x) }
	pub fn pack_i32(&mut self, x:i32) -> io::Result<()> { self.buff.write_i32::<BigEndian>(x) }

	pub fn pack_bool(&mut self, b:bool) -> io::Result<()> {
		if b { self.pack_i32(1) }
		else { self.pack_i32(0) }
	}

	pub fn pack_enum(&mut self, x:i32) -> io::Result<()> { self.pack_i32(x) }

	// Packing methods that require padding checks at the end
	pub fn pack_variable_len_opaque(&mut self, data:&[u8]) -> io::Result<()> {
		self.pack_u32(data.len() as u32)?;
		self.buff.write(data)?;

		// Ensure alignment
		while self.buff.len() % 4 != 0 { self.buff.push(0); }
		Ok(())
	}

}

impl Unpacker {

	pub fn new() -> Self { Unpacker{ buff: Vec::new(), pos: 0 } }

	pub fn reset(&mut self, data:&[u8]) {
		self.buff.clear();
		self.buff.extend_from_slice(data);
		self.pos = 0;
	}

	pub fn all_data_consumed(&self) -> bool { self.pos == self.buff.len() }

	// All reads go through here so running off the end of the buffer is always an error, never a panic
	fn take(&mut self, n:usize) -> io::Result<&[u8]> {
		if self.pos + n > self.buff.len() {
			return Err(Error::new(ErrorKind::Other, "Tried to unpack past the end of the buffer"));
		}
		let ans = &self.buff[self.pos..(self.pos+n)];
		self.pos += n;
		Ok(ans)
	}

	pub fn unpack_u32(&mut self) -> io::Result<u32> { Ok(BigEndian::read_u32(self.take(4)?)) }
	pub fn unpack_i32(&mut self) -> io::Result<i32> { Ok(BigEndian::read_i32(self.take(4)?)) }

	// An enum is just an i32 with a restricted set of values.  The restricted set depends on the
	// application, so at this level an enum is the same as an i32
	pub fn unpack_enum(&mut self) -> io::Result<i32> { self.unpack_i32() }

	pub fn unpack_bool(&mut self) -> io::Result<bool> {
		match self.unpack_i32()? {
			0 => Ok(false),
			1 => Ok(true),
			x => Err(Error::new(ErrorKind::Other, format!("Expected 0 or 1 in unpack_bool but got {}", x))),
		}
	}

	pub fn unpack_variable_len_opaque(&mut self) -> io::Result<Vec<u8>> {
		let n:usize = self.unpack_u32()? as usize;

		// The payload is padded up to the next multiple of four; take the padding too so the
		// position stays aligned
		let padded:usize = (n + 3) & !3;
		Ok(self.take(padded)?[..n].to_vec())
	}

}

#[cfg(test)]
mod tests {

	use super::*;

	#[test]
	fn opaque_stays_aligned() {
		let mut packer = Packer::new();
		packer.pack_variable_len_opaque(b"inst0").unwrap();
		assert_eq!(packer.get_buf().len() % 4, 0);

		let mut unpacker = Unpacker::new();
		unpacker.reset(packer.get_buf());
		assert_eq!(unpacker.unpack_variable_len_opaque().unwrap(), b"inst0");
		assert!(unpacker.all_data_consumed());
	}

	#[test]
	fn bool_rejects_other_values() {
		let mut packer = Packer::new();
		packer.pack_i32(2).unwrap();

		let mut unpacker = Unpacker::new();
		unpacker.reset(packer.get_buf());
		assert!(unpacker.unpack_bool().is_err());
	}

	#[test]
	fn short_buffer_is_an_error() {
		let mut unpacker = Unpacker::new();
		unpacker.reset(&[0, 0]);
		assert!(unpacker.unpack_u32().is_err());
	}

}

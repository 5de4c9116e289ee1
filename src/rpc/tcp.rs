
use std::io::{self, Read, Write, Error, ErrorKind};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::xdr;
use super::header;

pub struct TcpClient {
	stream: TcpStream,
	prog: u32,
	vers: u32,
	lastxid: u32,
	pub packer: xdr::Packer,
	pub unpacker: xdr::Unpacker,
}

impl TcpClient {

	pub fn connect<A: ToSocketAddrs>(addr:A, prog:u32, vers:u32, timeout:Duration) -> io::Result<Self> {
		let stream = TcpStream::connect(addr)?;

		// Both directions share the same bound; an instrument that stops answering
		// surfaces as an I/O timeout instead of a hang
		stream.set_read_timeout(Some(timeout))?;
		stream.set_write_timeout(Some(timeout))?;

		Ok(Self{ stream, prog, vers, lastxid: 0, packer: xdr::Packer::new(), unpacker: xdr::Unpacker::new() })
	}

	// Begins a new call by packing the header.  The caller packs the arguments next, then
	// runs finish_call to put the reply in the unpacker
	pub fn start_call(&mut self, prc:u32) -> io::Result<()> {
		self.lastxid += 1;
		self.packer.reset();
		header::pack_callheader_no_auth(&mut self.packer, self.lastxid, self.prog, self.vers, prc)
	}

	pub fn finish_call(&mut self) -> io::Result<()> {
		let call = self.packer.get_buf();
		if call.is_empty() {
			return Err(Error::new(ErrorKind::Other, "Tried to send a call with no header"));
		}

		// Record marking: a u32 fragment length with the high bit marking the last fragment.
		// Calls are small enough to always go out as a single fragment
		let header:u32 = call.len() as u32 | 0x80000000;

		let mut send_bytes:Vec<u8> = vec![];
		send_bytes.write_u32::<BigEndian>(header)?;
		send_bytes.extend_from_slice(call);
		self.stream.write_all(&send_bytes)?;

		'outer: loop {
			let mut reply:Vec<u8> = vec![];

			let mut last:bool = false;
			while !last {
				let x:u32 = self.stream.read_u32::<BigEndian>()?;

				last = (x & 0x80000000) != 0;
				let n = (x & 0x7fffffff) as usize;

				let mut frag:Vec<u8> = vec![0; n];
				self.stream.read_exact(&mut frag)?;
				reply.append(&mut frag);
			}

			// Load the response into the unpacker and make sure the xid matches
			self.unpacker.reset(&reply);

			let xid = header::unpack_replyheader(&mut self.unpacker)?;
			if xid == self.lastxid {
				// Packet from the present
				return Ok(());
			} else if xid < self.lastxid {
				// Packet from the past
				continue 'outer;
			} else {
				// Packet from the future?
				return Err(Error::new(ErrorKind::Other, "Somehow got a packet from the future"));
			}
		}

	}

}

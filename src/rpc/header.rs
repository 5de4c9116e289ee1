
use std::io::{self, Error, ErrorKind};

use crate::xdr::{Packer, Unpacker};
use super::{CALL, RPCVERSION, REPLY, MSG_DENIED, RPC_MISMATCH, AUTH_ERROR, MSG_ACCEPTED,
	PROG_UNAVAIL, PROG_MISMATCH, PROC_UNAVAIL, GARBAGE_ARGS, SUCCESS};

pub fn pack_auth(packer:&mut Packer, flavor:i32, stuff:&[u8]) -> io::Result<()> {
	packer.pack_enum(flavor)?;
	packer.pack_variable_len_opaque(stuff)
}

pub fn pack_callheader(packer:&mut Packer, xid:u32, prog:u32, vers:u32, prc:u32, cred:(i32, &[u8]), verf:(i32, &[u8])) -> io::Result<()> {
	packer.pack_u32(xid)?;
	packer.pack_enum(CALL)?;
	packer.pack_u32(RPCVERSION)?;
	packer.pack_u32(prog)?;
	packer.pack_u32(vers)?;
	packer.pack_u32(prc)?;
	pack_auth(packer, cred.0, cred.1)?;
	pack_auth(packer, verf.0, verf.1)
}

// VXI-11 instruments don't use RPC authentication, so this is the only header variant the
// rest of the crate ever packs
pub fn pack_callheader_no_auth(packer:&mut Packer, xid:u32, prog:u32, vers:u32, prc:u32) -> io::Result<()> {
	pack_callheader(packer, xid, prog, vers, prc, (0, &[]), (0, &[]))
}

pub fn unpack_auth(unpacker:&mut Unpacker) -> io::Result<(i32, Vec<u8>)> {
	let flavor:i32    = unpacker.unpack_enum()?;
	let stuff:Vec<u8> = unpacker.unpack_variable_len_opaque()?;
	Ok((flavor, stuff))
}

// Consumes the reply header and returns the xid, leaving the unpacker positioned at the start
// of the call results.  Any outcome other than an accepted, successful call becomes an error
pub fn unpack_replyheader(unpacker:&mut Unpacker) -> io::Result<u32> {
	let xid:u32 = unpacker.unpack_u32()?;

	let mtype:i32 = unpacker.unpack_enum()?;
	if mtype != REPLY { return Err(Error::new(ErrorKind::Other, "Expected REPLY message type in unpack_replyheader")); }

	match unpacker.unpack_enum()? {
		MSG_DENIED => {
			match unpacker.unpack_enum()? {
				RPC_MISMATCH => {
					unpacker.unpack_u32()?;	// This u32 gives the low value
					unpacker.unpack_u32()?;	// This u32 gives the high value
					return Err(Error::new(ErrorKind::Other, "Message denied due to RPC_MISMATCH in unpack_replyheader"))
				},
				AUTH_ERROR => {
					unpacker.unpack_u32()?;	// This u32 gives us another status code that might have more detail if needed
					return Err(Error::new(ErrorKind::Other, "Message denied due to AUTH_ERROR in unpack_replyheader"))
				},
				_ => return Err(Error::new(ErrorKind::Other, "Message denied for an unknown reason in unpack_replyheader")),
			}
		},
		MSG_ACCEPTED => { },
		_            => return Err(Error::new(ErrorKind::Other, "Neither MSG_DENIED nor MSG_ACCEPTED in unpack_replyheader")),
	}

	let _verf = unpack_auth(unpacker)?;

	match unpacker.unpack_enum()? {
		SUCCESS       => { },
		PROG_UNAVAIL  => return Err(Error::new(ErrorKind::Other, "Program unavailable in unpack_replyheader")),
		PROG_MISMATCH => {
			unpacker.unpack_u32()?;	// This u32 gives the low value
			unpacker.unpack_u32()?;	// This u32 gives the high value
			return Err(Error::new(ErrorKind::Other, "Program mismatch in unpack_replyheader"))
		},
		PROC_UNAVAIL  => return Err(Error::new(ErrorKind::Other, "Procedure unavailable in unpack_replyheader")),
		GARBAGE_ARGS  => return Err(Error::new(ErrorKind::Other, "Garbage args in unpack_replyheader")),
		_ => return Err(Error::new(ErrorKind::Other, "Call failed for unknown reason in unpack_replyheader")),
	}

	Ok(xid)
}

#[cfg(test)]
mod tests {

	use super::*;

	// A well-formed accepted/success reply leaves the unpacker at the call results
	#[test]
	fn accepted_success_reply() {
		let mut packer = Packer::new();
		packer.pack_u32(7).unwrap();            // xid
		packer.pack_enum(REPLY).unwrap();
		packer.pack_enum(MSG_ACCEPTED).unwrap();
		pack_auth(&mut packer, 0, &[]).unwrap();
		packer.pack_enum(SUCCESS).unwrap();
		packer.pack_u32(0xdead).unwrap();       // first word of the results

		let mut unpacker = Unpacker::new();
		unpacker.reset(packer.get_buf());

		assert_eq!(unpack_replyheader(&mut unpacker).unwrap(), 7);
		assert_eq!(unpacker.unpack_u32().unwrap(), 0xdead);
	}

	#[test]
	fn denied_reply_is_an_error() {
		let mut packer = Packer::new();
		packer.pack_u32(8).unwrap();
		packer.pack_enum(REPLY).unwrap();
		packer.pack_enum(MSG_DENIED).unwrap();
		packer.pack_enum(AUTH_ERROR).unwrap();
		packer.pack_u32(1).unwrap();

		let mut unpacker = Unpacker::new();
		unpacker.reset(packer.get_buf());

		assert!(unpack_replyheader(&mut unpacker).is_err());
	}

}


pub const PMAP_PROG:u32 = 100000;
pub const PMAP_VERS:u32 = 2;
pub const PMAP_PORT:u16 = 111;

pub const PMAPPROC_NULL:u32    = 0;     // (void) -> void
pub const PMAPPROC_SET:u32     = 1;     // (mapping) -> bool
pub const PMAPPROC_UNSET:u32   = 2;     // (mapping) -> bool
pub const PMAPPROC_GETPORT:u32 = 3;     // (mapping) -> unsigned int
pub const PMAPPROC_DUMP:u32    = 4;     // (void) -> pmaplist
pub const PMAPPROC_CALLIT:u32  = 5;     // (call_args) -> call_result

use std::io::{self, Error, ErrorKind};
use std::time::Duration;

use super::{IPPROTO_TCP, IPPROTO_UDP};
use super::tcp::TcpClient;

#[derive(Debug)]
pub enum Protocol {
	TCP,
	UDP,
}

impl Protocol {
	pub fn to_u32(&self) -> u32 { match self {
		Protocol::TCP => IPPROTO_TCP,
		Protocol::UDP => IPPROTO_UDP,
	}}
}

#[derive(Debug)]
pub struct Mapping {
	pub program: u32,
	pub version: u32,
	pub protocol: Protocol,
	pub port: u32,
}

pub struct PortMapperClient {
	client: TcpClient,
}

impl PortMapperClient {

	pub fn new(host:&str, timeout:Duration) -> io::Result<Self> {
		let client = TcpClient::connect((host, PMAP_PORT), PMAP_PROG, PMAP_VERS, timeout)?;
		Ok(Self{ client })
	}

	pub fn get_port(&mut self, m:&Mapping) -> io::Result<u16> {
		self.client.start_call(PMAPPROC_GETPORT)?;

		self.client.packer.pack_u32(m.program)?;
		self.client.packer.pack_u32(m.version)?;
		self.client.packer.pack_u32(m.protocol.to_u32())?;
		self.client.packer.pack_u32(m.port)?;

		self.client.finish_call()?;

		let port:u32 = self.client.unpacker.unpack_u32()?;

		if !self.client.unpacker.all_data_consumed() {
			return Err(Error::new(ErrorKind::Other, "Data unexpectedly left over in unpacker after unpacking port"));
		}

		// The port mapper answers zero for programs it has never heard of
		match port {
			0 => Err(Error::new(ErrorKind::Other, format!("Program {} is not registered with the instrument's port mapper", m.program))),
			p if p > u16::MAX as u32 => Err(Error::new(ErrorKind::Other, "Port mapper returned a port outside the u16 range")),
			p => Ok(p as u16),
		}
	}

}

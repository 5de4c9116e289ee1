
// Device core
pub const DEVICE_CORE_PROG:u32  = 0x0607af;
pub const DEVICE_CORE_VERS:u32  = 1;
pub const CREATE_LINK:u32       = 10;
pub const DEVICE_WRITE:u32      = 11;
pub const DEVICE_READ:u32       = 12;
pub const DEVICE_READSTB:u32    = 13;
pub const DEVICE_TRIGGER:u32    = 14;
pub const DEVICE_CLEAR:u32      = 15;
pub const DEVICE_REMOTE:u32     = 16;
pub const DEVICE_LOCAL:u32      = 17;
pub const DEVICE_LOCK:u32       = 18;
pub const DEVICE_UNLOCK:u32     = 19;
pub const DEVICE_ENABLE_SRQ:u32 = 20;
pub const DEVICE_DOCMD:u32      = 22;
pub const DESTROY_LINK:u32      = 23;
pub const CREATE_INTR_CHAN:u32  = 25;
pub const DESTROY_INTR_CHAN:u32 = 26;

pub const CLIENT_ID:i32 = 3333;
pub const DEFAULT_LOCK_TIMEOUT_MS:u32 = 10000;

// The only device name a Rigol scope exposes on its core channel
pub const DEVICE_NAME:&str = "inst0";

// Flags for DEVICE_WRITE
pub const OPERATION_FLAGS_END_ONLY:i32 = 8;

// Reason bits in a DEVICE_READ response
pub const REASON_REQCNT:i32 = 1;
pub const REASON_CHR:i32    = 2;
pub const REASON_END:i32    = 4;

use std::convert::TryFrom;
use std::io::{self, Error, ErrorKind};
use std::time::Duration;

use log::debug;

use crate::rpc::portmap::{PortMapperClient, Mapping, Protocol};
use crate::rpc::tcp::TcpClient;

fn err(msg:&str) -> io::Error { Error::new(ErrorKind::Other, msg) }

pub mod params;

// Error codes shared by every device core procedure
fn check_device_error(error:i32, ctx:&str) -> io::Result<()> {
	let msg = match error {
		0  => return Ok(()),
		1  => "Syntax error",
		3  => "Device not accessible",
		4  => "Invalid link identifier",
		5  => "Parameter error",
		6  => "Channel not established",
		8  => "Operation not supported",
		9  => "Out of resources",
		11 => "Device locked by another link",
		12 => "No lock held by this link",
		15 => "I/O timeout",
		17 => "I/O error",
		21 => "Invalid address",
		23 => "Abort",
		29 => "Channel already established",
		_  => return Err(Error::new(ErrorKind::Other, format!("Unknown error code {} in {}", error, ctx))),
	};
	Err(Error::new(ErrorKind::Other, format!("{} in {}", msg, ctx)))
}

pub struct CoreClient {
	client: TcpClient,
	opt_link: Option<Link>,
	io_timeout_ms: u32,
}

pub struct Link {
	pub link_id: i32,
	pub abort_port: u32,
	pub max_recv_size: u32,
}

impl CoreClient {

	fn get_link(&self) -> io::Result<i32> {
		match self.opt_link {
			Some(Link{ link_id, .. }) => Ok(link_id),
			None => Err(err("No link")),
		}
	}

	pub fn connect(host:&str, timeout:Duration) -> io::Result<Self> {

		// Find the port to use for the core program
		let mut pmap_client = PortMapperClient::new(host, timeout)?;

		let mapping = Mapping {
			program: DEVICE_CORE_PROG,
			version: DEVICE_CORE_VERS,
			protocol: Protocol::TCP,
			port: 0,
		};

		let port = pmap_client.get_port(&mapping)?;
		debug!("Core channel for {} is on port {}", host, port);

		// Connect on the port specified
		let client = TcpClient::connect((host, port), DEVICE_CORE_PROG, DEVICE_CORE_VERS, timeout)?;

		let io_timeout_ms = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);

		Ok(CoreClient{ client, opt_link: None, io_timeout_ms })
	}

	pub fn create_link(&mut self) -> io::Result<()> {
		if self.opt_link.is_some() {
			return Err(err("Already connected to a link"));
		}

		self.client.start_call(CREATE_LINK)?;
		params::pack_create_link_parms(&mut self.client.packer, CLIENT_ID, false, DEFAULT_LOCK_TIMEOUT_MS, DEVICE_NAME)?;
		self.client.finish_call()?;

		let error:i32         = self.client.unpacker.unpack_i32()?;
		let link_id:i32       = self.client.unpacker.unpack_i32()?;
		let abort_port:u32    = self.client.unpacker.unpack_u32()?;
		let max_recv_size:u32 = self.client.unpacker.unpack_u32()?;

		check_device_error(error, "create_link")?;

		debug!("Created link {} with max_recv_size {}", link_id, max_recv_size);
		self.opt_link = Some(Link{ link_id, abort_port, max_recv_size });

		Ok(())
	}

	pub fn ask(&mut self, data:&[u8]) -> io::Result<Vec<u8>> {
		self.write(data)?;
		self.read()
	}

	pub fn write(&mut self, data:&[u8]) -> io::Result<()> {
		let link_id:i32 = self.get_link()?;

		self.client.start_call(DEVICE_WRITE)?;
		params::pack_device_write_parms(&mut self.client.packer, link_id, self.io_timeout_ms, DEFAULT_LOCK_TIMEOUT_MS, OPERATION_FLAGS_END_ONLY, data)?;
		self.client.finish_call()?;

		let error:i32 = self.client.unpacker.unpack_i32()?;
		let size:u32  = self.client.unpacker.unpack_u32()?;

		check_device_error(error, "write")?;

		if size as usize != data.len() {
			return Err(err("Number of bytes in confirmation doesn't match number of bytes sent"));
		}

		Ok(())
	}

	// Reads until the instrument sets the END bit.  A display capture is far larger than one
	// link-sized chunk, so a single DEVICE_READ is almost never the whole answer
	pub fn read(&mut self) -> io::Result<Vec<u8>> {
		let (link_id, max_recv_size) = match &self.opt_link {
			Some(link) => (link.link_id, link.max_recv_size.max(1024)),
			None => return Err(err("No link")),
		};

		let mut ans:Vec<u8> = vec![];

		loop {
			self.client.start_call(DEVICE_READ)?;
			params::pack_device_read_parms(&mut self.client.packer, link_id, max_recv_size, self.io_timeout_ms, DEFAULT_LOCK_TIMEOUT_MS, 0, 0)?;
			self.client.finish_call()?;

			let error:i32    = self.client.unpacker.unpack_i32()?;
			let reason:i32   = self.client.unpacker.unpack_i32()?;
			let data:Vec<u8> = self.client.unpacker.unpack_variable_len_opaque()?;

			check_device_error(error, "read")?;

			if data.is_empty() && reason == 0 {
				// The instrument is obligated to set a reason bit eventually; an empty
				// reasonless chunk means it never will
				return Err(err("Instrument returned no data and no reason"));
			}

			ans.extend_from_slice(&data);

			if reason & REASON_END != 0 {
				return Ok(ans);
			}
			// REASON_REQCNT just means our buffer filled; go around again for the rest
		}
	}

	pub fn destroy_link(&mut self) -> io::Result<()> {
		let link_id:i32 = self.get_link()?;

		self.client.start_call(DESTROY_LINK)?;
		params::pack_device_link(&mut self.client.packer, link_id)?;
		self.client.finish_call()?;

		let error:i32 = self.client.unpacker.unpack_i32()?;
		self.opt_link = None;

		check_device_error(error, "destroy_link")
	}

}

impl Drop for CoreClient {

	fn drop(&mut self) {
		if self.opt_link.is_some() {
			if let Err(e) = self.destroy_link() {
				debug!("Unable to destroy link on drop: {}", e);
			}
		}
	}

}


// Currently the only devices supported here are Rigol oscilloscopes.  If multiple
// manufacturers are ever supported, I'll probably organize them into modules by manufacturer

pub mod rigol;

use std::io::{self, Error, ErrorKind};
use std::str;

use crate::usbtmc::UsbtmcClient;
use crate::vxi11::CoreClient;

// The seam between a device driver and the two wire protocols
pub enum Transport {
	Vxi11(CoreClient),
	Usbtmc(UsbtmcClient),
}

impl Transport {

	pub fn write(&mut self, data:&[u8]) -> io::Result<()> {
		match self {
			Transport::Vxi11(core) => core.write(data),
			Transport::Usbtmc(tmc) => tmc.write(data),
		}
	}

	pub fn ask(&mut self, data:&[u8]) -> io::Result<Vec<u8>> {
		match self {
			Transport::Vxi11(core) => core.ask(data),
			Transport::Usbtmc(tmc) => tmc.ask(data),
		}
	}

	pub fn ask_str(&mut self, data:&str) -> io::Result<String> {
		str::from_utf8(&self.ask(data.as_bytes())?)
			.map(|s| s.to_owned())
			.map_err(|_| Error::new(ErrorKind::Other, "Unable to parse response as UTF-8"))
	}

}

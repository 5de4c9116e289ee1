
use std::fmt;
use std::io::{self, Error, ErrorKind};

use crate::usbtmc::TmcDevice;

// Rigol oscilloscope vendor/product pairs this tool recognizes out of the box.  Anything
// not listed here can still be reached with an explicit --name match
pub const RIGOL_VID_PIDS:&[(u16, u16)] = &[
	(0x1ab1, 0x04ce),	// DS1000Z / MSO1000Z
	(0x1ab1, 0x044c),	// DHO800 / DHO900
	(0x1ab1, 0x0588),	// DS1000E
	(0x1ab1, 0x04b0),	// DS2000A
];

// VISA-style resource identifier, the dialect users of the original tooling already know
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceId {
	Tcpip { host: String },
	Usb { vendor_id: u16, product_id: u16, serial: String },
}

impl fmt::Display for ResourceId {
	fn fmt(&self, f:&mut fmt::Formatter) -> fmt::Result {
		match self {
			ResourceId::Tcpip{ host } => write!(f, "TCPIP0::{}::INSTR", host),
			ResourceId::Usb{ vendor_id, product_id, serial } =>
				write!(f, "USB0::0x{:04X}::0x{:04X}::{}::INSTR", vendor_id, product_id, serial),
		}
	}
}

impl From<&TmcDevice> for ResourceId {
	fn from(dev:&TmcDevice) -> Self {
		ResourceId::Usb {
			vendor_id: dev.vendor_id,
			product_id: dev.product_id,
			serial: dev.serial.clone(),
		}
	}
}

impl ResourceId {

	pub fn is_known_rigol(&self) -> bool {
		match self {
			ResourceId::Usb{ vendor_id, product_id, .. } => RIGOL_VID_PIDS.contains(&(*vendor_id, *product_id)),
			ResourceId::Tcpip{ .. } => false,
		}
	}

	// Case-insensitive substring match against the full resource string, so a serial
	// number, "0x1AB1" or a whole resource name all work as selectors
	pub fn matches(&self, needle:&str) -> bool {
		self.to_string().to_uppercase().contains(&needle.to_uppercase())
	}

}

// Picks exactly one instrument.  With a name the needle is matched against every resource;
// without one the vendor/product table decides.  Zero matches and ambiguous matches are both
// fatal, the latter listing the candidates so the user can pick with --name
pub fn select(ids:&[ResourceId], name:Option<&str>) -> io::Result<usize> {
	let candidates:Vec<usize> = match name {
		Some(needle) => ids.iter().enumerate().filter(|(_, id)| id.matches(needle)).map(|(i, _)| i).collect(),
		None         => ids.iter().enumerate().filter(|(_, id)| id.is_known_rigol()).map(|(i, _)| i).collect(),
	};

	match candidates.len() {
		0 => match name {
			Some(needle) => Err(Error::new(ErrorKind::Other, format!("Could not find an instrument matching {:?}. Check USB?", needle))),
			None         => Err(Error::new(ErrorKind::Other, "Could not find a Rigol oscilloscope. Check USB?")),
		},
		1 => Ok(candidates[0]),
		_ => {
			let mut msg = String::from("Found multiple instruments. Please select one with --name:");
			for idx in &candidates {
				msg.push_str(&format!("\n    {}", ids[*idx]));
			}
			Err(Error::new(ErrorKind::Other, msg))
		},
	}
}

#[cfg(test)]
mod tests {

	use super::*;

	fn ds1104z(serial:&str) -> ResourceId {
		ResourceId::Usb{ vendor_id: 0x1ab1, product_id: 0x04ce, serial: serial.to_owned() }
	}

	#[test]
	fn usb_resource_string() {
		assert_eq!(ds1104z("DS1ZA000000000").to_string(), "USB0::0x1AB1::0x04CE::DS1ZA000000000::INSTR");
	}

	#[test]
	fn tcpip_resource_string() {
		let id = ResourceId::Tcpip{ host: "192.168.2.4".to_owned() };
		assert_eq!(id.to_string(), "TCPIP0::192.168.2.4::INSTR");
	}

	#[test]
	fn selects_single_rigol_without_name() {
		let ids = vec![
			ResourceId::Usb{ vendor_id: 0x0403, product_id: 0x6001, serial: "A50285BI".to_owned() },
			ds1104z("DS1ZA000000000"),
		];
		assert_eq!(select(&ids, None).unwrap(), 1);
	}

	#[test]
	fn name_matches_serial_case_insensitively() {
		let ids = vec![ds1104z("DS1ZA000000000"), ds1104z("DS1ZA999999999")];
		assert_eq!(select(&ids, Some("ds1za9999")).unwrap(), 1);
	}

	#[test]
	fn no_match_is_an_error() {
		assert!(select(&[], None).is_err());
		assert!(select(&[ds1104z("DS1ZA000000000")], Some("DHO9")).is_err());
	}

	#[test]
	fn ambiguous_match_is_an_error() {
		let ids = vec![ds1104z("DS1ZA000000000"), ds1104z("DS1ZA999999999")];
		let err = select(&ids, None).unwrap_err();
		assert!(err.to_string().contains("DS1ZA000000000"));
		assert!(err.to_string().contains("DS1ZA999999999"));
	}

}

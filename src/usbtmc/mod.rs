
// USB Test and Measurement Class transport.  One bulk-out endpoint carries SCPI commands
// wrapped in DEV_DEP_MSG_OUT transfers, one bulk-in endpoint carries the responses.  That is
// the whole protocol surface a display capture needs

use std::io::{self, Error, ErrorKind};
use std::time::Duration;

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, warn};
use rusb::{Device, DeviceHandle, Direction, GlobalContext, TransferType};

pub const TMC_INTERFACE_CLASS:u8    = 0xfe;
pub const TMC_INTERFACE_SUBCLASS:u8 = 0x03;

// Bulk message ids
const DEV_DEP_MSG_OUT:u8        = 1;
const REQUEST_DEV_DEP_MSG_IN:u8 = 2;
const DEV_DEP_MSG_IN:u8         = 2;

const HEADER_LEN:usize = 12;
const EOM:u8 = 0x01;

// How much we ask the instrument for per REQUEST_DEV_DEP_MSG_IN
const MAX_TRANSFER_SIZE:usize = 1024 * 1024;

fn usb_err(e:rusb::Error) -> io::Error { Error::new(ErrorKind::Other, format!("usb error: {}", e)) }

fn err(msg:&str) -> io::Error { Error::new(ErrorKind::Other, msg) }

// A USBTMC-capable device found on the bus, not yet opened
pub struct TmcDevice {
	pub device: Device<GlobalContext>,
	pub vendor_id: u16,
	pub product_id: u16,
	pub serial: String,
	pub interface: u8,
	pub setting: u8,
	pub ep_bulk_in: u8,
	pub ep_bulk_out: u8,
}

struct TmcInterface {
	interface: u8,
	setting: u8,
	ep_bulk_in: u8,
	ep_bulk_out: u8,
}

// The first interface declaring the TMC class/subclass pair, along with its bulk endpoints
fn tmc_interface(device:&Device<GlobalContext>) -> Option<TmcInterface> {
	let config = device.active_config_descriptor().ok()?;

	for interface in config.interfaces() {
		for id in interface.descriptors() {
			if id.class_code() != TMC_INTERFACE_CLASS || id.sub_class_code() != TMC_INTERFACE_SUBCLASS {
				continue;
			}

			let mut ep_in:Option<u8>  = None;
			let mut ep_out:Option<u8> = None;
			for ep in id.endpoint_descriptors() {
				if ep.transfer_type() == TransferType::Bulk {
					match ep.direction() {
						Direction::In  => ep_in  = Some(ep.address()),
						Direction::Out => ep_out = Some(ep.address()),
					}
				}
			}

			if let (Some(ep_bulk_in), Some(ep_bulk_out)) = (ep_in, ep_out) {
				return Some(TmcInterface {
					interface: id.interface_number(),
					setting: id.setting_number(),
					ep_bulk_in,
					ep_bulk_out,
				});
			}
		}
	}

	None
}

// Walk the bus and collect every instrument that talks USBTMC.  Devices that can't be
// inspected (permissions, detached mid-scan) are skipped with a warning rather than
// failing the whole enumeration
pub fn list_devices() -> io::Result<Vec<TmcDevice>> {
	let mut ans:Vec<TmcDevice> = vec![];

	for device in rusb::devices().map_err(usb_err)?.iter() {
		let desc = match device.device_descriptor() {
			Ok(d)  => d,
			Err(e) => {
				warn!("Couldn't read descriptor of bus {:03} device {:03}: {}", device.bus_number(), device.address(), e);
				continue;
			},
		};

		let tmc = match tmc_interface(&device) {
			Some(t) => t,
			None    => continue,
		};

		// The serial number is how users tell two identical scopes apart, but a device we
		// can't open is still worth listing
		let serial = match device.open() {
			Ok(handle) => handle.read_serial_number_string_ascii(&desc).unwrap_or_default(),
			Err(e) => {
				warn!("Couldn't open bus {:03} device {:03} to read its serial number: {}", device.bus_number(), device.address(), e);
				String::new()
			},
		};

		debug!("Found USBTMC device {:04x}:{:04x} (serial {:?}) on bus {:03} device {:03}",
			desc.vendor_id(), desc.product_id(), serial, device.bus_number(), device.address());

		ans.push(TmcDevice {
			device,
			vendor_id: desc.vendor_id(),
			product_id: desc.product_id(),
			serial,
			interface: tmc.interface,
			setting: tmc.setting,
			ep_bulk_in: tmc.ep_bulk_in,
			ep_bulk_out: tmc.ep_bulk_out,
		});
	}

	Ok(ans)
}

pub struct UsbtmcClient {
	handle: DeviceHandle<GlobalContext>,
	ep_bulk_in: u8,
	ep_bulk_out: u8,
	btag: u8,
	timeout: Duration,
}

// bTags run 1..=255 and never take the value zero
fn advance_btag(btag:u8) -> u8 {
	if btag == 255 { 1 } else { btag + 1 }
}

fn dev_dep_msg_out_header(btag:u8, transfer_size:u32) -> [u8; HEADER_LEN] {
	let mut header = [0u8; HEADER_LEN];
	header[0] = DEV_DEP_MSG_OUT;
	header[1] = btag;
	header[2] = !btag;
	LittleEndian::write_u32(&mut header[4..8], transfer_size);
	header[8] = EOM;
	header
}

fn request_dev_dep_msg_in_header(btag:u8, transfer_size:u32) -> [u8; HEADER_LEN] {
	let mut header = [0u8; HEADER_LEN];
	header[0] = REQUEST_DEV_DEP_MSG_IN;
	header[1] = btag;
	header[2] = !btag;
	LittleEndian::write_u32(&mut header[4..8], transfer_size);
	header
}

impl UsbtmcClient {

	pub fn open(dev:&TmcDevice, timeout:Duration) -> io::Result<Self> {
		let mut handle = dev.device.open().map_err(usb_err)?;

		// On Linux the usbtmc kernel module may already own the interface
		match handle.set_auto_detach_kernel_driver(true) {
			Ok(()) | Err(rusb::Error::NotSupported) => { },
			Err(e) => return Err(usb_err(e)),
		}

		handle.claim_interface(dev.interface).map_err(usb_err)?;
		if dev.setting != 0 {
			handle.set_alternate_setting(dev.interface, dev.setting).map_err(usb_err)?;
		}

		Ok(UsbtmcClient {
			handle,
			ep_bulk_in: dev.ep_bulk_in,
			ep_bulk_out: dev.ep_bulk_out,
			btag: 1,
			timeout,
		})
	}

	fn take_btag(&mut self) -> u8 {
		let btag = self.btag;
		self.btag = advance_btag(self.btag);
		btag
	}

	pub fn write(&mut self, data:&[u8]) -> io::Result<()> {
		let btag = self.take_btag();

		let mut msg:Vec<u8> = Vec::with_capacity(HEADER_LEN + data.len() + 3);
		msg.extend_from_slice(&dev_dep_msg_out_header(btag, data.len() as u32));
		msg.extend_from_slice(data);

		// Ensure alignment
		while msg.len() % 4 != 0 { msg.push(0); }

		let n = self.handle.write_bulk(self.ep_bulk_out, &msg, self.timeout).map_err(usb_err)?;
		if n != msg.len() {
			return Err(err("Number of bytes accepted by the bulk-out endpoint doesn't match number of bytes sent"));
		}

		Ok(())
	}

	// Reads until the instrument sets the EOM bit in a response header
	pub fn read(&mut self) -> io::Result<Vec<u8>> {
		let mut ans:Vec<u8> = vec![];

		loop {
			let btag = self.take_btag();
			let req = request_dev_dep_msg_in_header(btag, MAX_TRANSFER_SIZE as u32);
			self.handle.write_bulk(self.ep_bulk_out, &req, self.timeout).map_err(usb_err)?;

			let mut buff:Vec<u8> = vec![0; HEADER_LEN + MAX_TRANSFER_SIZE];
			let n = self.handle.read_bulk(self.ep_bulk_in, &mut buff, self.timeout).map_err(usb_err)?;

			if n < HEADER_LEN {
				return Err(err("Bulk-in response shorter than a USBTMC header"));
			}
			if buff[0] != DEV_DEP_MSG_IN {
				return Err(Error::new(ErrorKind::Other, format!("Expected DEV_DEP_MSG_IN response but got message id {}", buff[0])));
			}
			if buff[1] != btag {
				return Err(Error::new(ErrorKind::Other, format!("Response bTag {} doesn't echo request bTag {}", buff[1], btag)));
			}

			let transfer_size = LittleEndian::read_u32(&buff[4..8]) as usize;
			let eom = buff[8] & EOM != 0;

			let got = (n - HEADER_LEN).min(transfer_size);
			let mut payload:Vec<u8> = buff[HEADER_LEN..(HEADER_LEN + got)].to_vec();

			// The device may split one message across several bulk transfers
			while payload.len() < transfer_size {
				let mut chunk:Vec<u8> = vec![0; transfer_size - payload.len()];
				let m = self.handle.read_bulk(self.ep_bulk_in, &mut chunk, self.timeout).map_err(usb_err)?;
				if m == 0 {
					return Err(err("Bulk-in transfer ended before the declared transfer size"));
				}
				payload.extend_from_slice(&chunk[..m]);
			}

			ans.extend_from_slice(&payload);

			if eom {
				return Ok(ans);
			}
		}
	}

	pub fn ask(&mut self, data:&[u8]) -> io::Result<Vec<u8>> {
		self.write(data)?;
		self.read()
	}

}

#[cfg(test)]
mod tests {

	use super::*;

	#[test]
	fn out_header_layout() {
		let header = dev_dep_msg_out_header(7, 0x0102);
		assert_eq!(header[0], DEV_DEP_MSG_OUT);
		assert_eq!(header[1], 7);
		assert_eq!(header[2], !7u8);
		assert_eq!(&header[4..8], &[0x02, 0x01, 0x00, 0x00]);  // little-endian transfer size
		assert_eq!(header[8], EOM);
	}

	#[test]
	fn in_request_has_no_eom() {
		let header = request_dev_dep_msg_in_header(1, 64);
		assert_eq!(header[0], REQUEST_DEV_DEP_MSG_IN);
		assert_eq!(header[8], 0);
	}

	#[test]
	fn btag_skips_zero() {
		assert_eq!(advance_btag(1), 2);
		assert_eq!(advance_btag(254), 255);
		assert_eq!(advance_btag(255), 1);
	}

}

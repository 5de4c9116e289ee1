
use std::io::{self, Error, ErrorKind};
use std::str;

use lazy_static::lazy_static;
use log::{debug, warn};
use regex::{Captures, Match, Regex};
use serde::{Serialize, Deserialize};

use super::Transport;

lazy_static! {
	static ref IDN_RE: Regex = Regex::new("([^,]+),([^,]+),([^,]+),([^,\\s]+)").unwrap();
}

// The 8-byte signature every PNG stream starts with
const PNG_MAGIC:[u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

fn match_str(opt_match:Option<Match>, err:&str) -> io::Result<String> {
	match opt_match {
		Some(m) => Ok(m.as_str().to_owned()),
		None    => Err(Error::new(ErrorKind::Other, err))
	}
}

fn err(msg:&str) -> io::Error { Error::new(ErrorKind::Other, msg) }

#[derive(Debug, Serialize, Deserialize)]
pub struct Identity {
	pub manufacturer: String,
	pub model: String,
	pub serial_num: String,
	pub fw_version: String,
}

impl Identity {

	pub fn parse(idn:&str) -> io::Result<Self> {
		let caps:Captures = match IDN_RE.captures(idn) {
			Some(c) => c,
			None    => return Err(Error::new(ErrorKind::Other, format!("Unable to parse *IDN? response {:?}", idn.trim()))),
		};

		let manufacturer:String = match_str(caps.get(1), "No match for manufacturer")?;
		let model:String        = match_str(caps.get(2), "No match for model")?;
		let serial_num:String   = match_str(caps.get(3), "No match for serial_num")?;
		let fw_version:String   = match_str(caps.get(4), "No match for fw_version")?;

		Ok(Identity{ manufacturer, model, serial_num, fw_version })
	}

	// The DHO-series firmware dropped the ON,0 arguments the older models take
	pub fn display_data_command(&self) -> &'static str {
		if self.model.to_uppercase().starts_with("DHO") {
			":DISP:DATA? PNG"
		} else {
			":DISP:DATA? ON,0,PNG"
		}
	}

}

pub struct RigolScope {
	transport: Transport,
	pub identity: Identity,
}

impl RigolScope {

	pub fn open(mut transport:Transport) -> io::Result<Self> {
		let idn = transport.ask_str("*IDN?")?;
		let identity = Identity::parse(&idn)?;

		if !identity.manufacturer.to_uppercase().contains("RIGOL") {
			// USB matches were already filtered on vendor id and a LAN address is explicit
			// user input, so this is a warning rather than an abort
			warn!("Connected instrument identifies as {} {}, not a Rigol", identity.manufacturer, identity.model);
		}

		debug!("Connected to {} {} (serial {}, firmware {})",
			identity.manufacturer, identity.model, identity.serial_num, identity.fw_version);

		Ok(RigolScope{ transport, identity })
	}

	// Fetches the current display image as PNG bytes
	pub fn screen_capture(&mut self) -> io::Result<Vec<u8>> {
		let cmd = self.identity.display_data_command();
		debug!("Requesting display data with {:?}", cmd);

		let raw = self.transport.ask(cmd.as_bytes())?;
		let png = decode_definite_length_block(&raw)?;

		if png.len() < PNG_MAGIC.len() || png[..PNG_MAGIC.len()] != PNG_MAGIC {
			warn!("Display data does not start with a PNG signature ({} bytes received)", png.len());
		}

		Ok(png)
	}

}

// Display data arrives as an IEEE 488.2 definite-length block: '#', one digit giving the
// width of the length field, the decimal payload length, then the payload itself.  Rigol
// firmware appends a newline after the block; anything after the declared length is trimmed
pub fn decode_definite_length_block(raw:&[u8]) -> io::Result<Vec<u8>> {
	if raw.first() != Some(&b'#') {
		return Err(err("Display data response does not start with '#'"));
	}

	let ndigits = match raw.get(1).map(|b| (*b as char).to_digit(10)) {
		Some(Some(0)) => return Err(err("Indefinite-length block is not supported")),
		Some(Some(n)) => n as usize,
		_             => return Err(err("Display data block has no digit count")),
	};

	let header_len = 2 + ndigits;
	if raw.len() < header_len {
		return Err(err("Display data block header is truncated"));
	}

	let length:usize = str::from_utf8(&raw[2..header_len])
		.ok()
		.and_then(|s| s.parse::<usize>().ok())
		.ok_or_else(|| err("Display data block length field is not a number"))?;

	if raw.len() < header_len + length {
		return Err(Error::new(ErrorKind::Other,
			format!("Display data truncated: header declares {} payload bytes but only {} arrived", length, raw.len() - header_len)));
	}

	Ok(raw[header_len..(header_len + length)].to_vec())
}

#[cfg(test)]
mod tests {

	use std::fs;

	use super::*;

	#[test]
	fn parses_rigol_idn() {
		let identity = Identity::parse("RIGOL TECHNOLOGIES,DS1104Z,DS1ZA000000000,00.04.04.SP3\n").unwrap();
		assert_eq!(identity.manufacturer, "RIGOL TECHNOLOGIES");
		assert_eq!(identity.model, "DS1104Z");
		assert_eq!(identity.serial_num, "DS1ZA000000000");
		assert_eq!(identity.fw_version, "00.04.04.SP3");
	}

	#[test]
	fn rejects_garbage_idn() {
		assert!(Identity::parse("?\n").is_err());
	}

	#[test]
	fn dho_models_use_the_short_command() {
		let dho = Identity::parse("RIGOL TECHNOLOGIES,DHO924,DHO9A2544014,00.01.02").unwrap();
		assert_eq!(dho.display_data_command(), ":DISP:DATA? PNG");

		let ds = Identity::parse("RIGOL TECHNOLOGIES,DS1104Z,DS1ZA000000000,00.04.04").unwrap();
		assert_eq!(ds.display_data_command(), ":DISP:DATA? ON,0,PNG");
	}

	fn block_with_payload(payload:&[u8]) -> Vec<u8> {
		let mut raw = format!("#9{:09}", payload.len()).into_bytes();
		raw.extend_from_slice(payload);
		raw
	}

	#[test]
	fn decodes_block_and_trims_terminator() {
		let mut raw = block_with_payload(b"fake png bytes");
		raw.push(b'\n');
		assert_eq!(decode_definite_length_block(&raw).unwrap(), b"fake png bytes");
	}

	#[test]
	fn rejects_missing_prefix_and_bad_lengths() {
		assert!(decode_definite_length_block(b"fake png bytes").is_err());
		assert!(decode_definite_length_block(b"#").is_err());
		assert!(decode_definite_length_block(b"#X123").is_err());
		assert!(decode_definite_length_block(b"#2AB__").is_err());

		// Header declares more payload than arrived
		assert!(decode_definite_length_block(b"#2990123").is_err());
	}

	// The deliverable is "bytes received, bytes written": a decoded payload of N bytes must
	// land on disk as exactly those N bytes
	#[test]
	fn decoded_payload_round_trips_through_a_file() {
		let payload:Vec<u8> = (0..=255u8).cycle().take(4096).collect();
		let decoded = decode_definite_length_block(&block_with_payload(&payload)).unwrap();

		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("rigol.png");
		fs::write(&path, &decoded).unwrap();

		assert_eq!(fs::read(&path).unwrap(), payload);
	}

}

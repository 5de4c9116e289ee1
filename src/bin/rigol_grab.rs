
// Save a Rigol oscilloscope display as a PNG file, over USB or the LAN

use std::fs;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Arg, ArgAction, ArgMatches, Command};
use thiserror::Error;

use rigol_grab::devices::rigol::RigolScope;
use rigol_grab::devices::Transport;
use rigol_grab::resource::{self, ResourceId};
use rigol_grab::usbtmc::{self, UsbtmcClient};
use rigol_grab::viewer;
use rigol_grab::vxi11::CoreClient;

#[derive(Error, Debug)]
enum Error {
	#[error("io error: {0}")]
	IO(#[from] std::io::Error),
	#[error("json error: {0}")]
	Json(#[from] serde_json::Error),
	#[error("{0}")]
	Arg(String),
}
type Result<T> = std::result::Result<T, Error>;

fn run(matches:&ArgMatches) -> Result<()> {
	let seconds:u64 = matches
		.get_one::<String>("timeout")
		.unwrap()
		.parse()
		.map_err(|_| Error::Arg("Timeout must be a whole number of seconds".to_string()))?;
	let timeout = Duration::from_secs(seconds);

	let transport = match matches.get_one::<String>("port") {
		Some(host) => {
			let id = ResourceId::Tcpip{ host: host.clone() };
			log::debug!("Opening {}", id);

			let mut core = CoreClient::connect(host, timeout)?;
			core.create_link()?;
			Transport::Vxi11(core)
		},
		None => {
			let devices = usbtmc::list_devices()?;
			let ids:Vec<ResourceId> = devices.iter().map(ResourceId::from).collect();

			let idx = resource::select(&ids, matches.get_one::<String>("name").map(String::as_str))?;
			log::debug!("Opening {}", ids[idx]);

			Transport::Usbtmc(UsbtmcClient::open(&devices[idx], timeout)?)
		},
	};

	let mut scope = RigolScope::open(transport)?;

	if matches.get_flag("info") {
		println!("{}", serde_json::to_string_pretty(&scope.identity)?);
	}

	let png = scope.screen_capture()?;

	let filename = PathBuf::from(matches.get_one::<String>("filename").unwrap());
	log::debug!("Capturing screen to {} ({} bytes)", filename.display(), png.len());
	fs::write(&filename, &png)?;
	log::debug!("Successfully captured screen to {}", filename.display());

	if matches.get_flag("auto_view") {
		// The capture is already on disk at this point, so a missing viewer is not fatal
		if let Err(err) = viewer::open_with_system_viewer(&filename) {
			log::warn!("Could not open {} with the system viewer: {}", filename.display(), err);
		}
	}

	Ok(())
}

fn main() {
	let matches = Command::new("rigol-grab")
		.about("Save a Rigol oscilloscope display as a PNG file")
		.arg(
			Arg::new("filename")
				.short('f')
				.long("filename")
				.value_name("PATH")
				.default_value("rigol.png")
				.help("Name of the output file"),
		)
		.arg(
			Arg::new("auto_view")
				.short('a')
				.long("auto-view")
				.alias("auto-open")
				.help("Open the saved file with the system image viewer")
				.action(ArgAction::SetTrue),
		)
		.arg(
			Arg::new("verbose")
				.short('v')
				.long("verbose")
				.help("Print additional output")
				.action(ArgAction::SetTrue),
		)
		.arg(
			Arg::new("name")
				.short('n')
				.long("name")
				.value_name("SUBSTR")
				.help("Select the instrument whose resource name contains this string (a serial number works)"),
		)
		.arg(
			Arg::new("port")
				.short('p')
				.long("port")
				.value_name("ADDR")
				.help("Instrument IP address (skips USB discovery)"),
		)
		.arg(
			Arg::new("timeout")
				.short('t')
				.long("timeout")
				.value_name("SECONDS")
				.default_value("10")
				.help("I/O timeout in seconds"),
		)
		.arg(
			Arg::new("info")
				.long("info")
				.help("Print the instrument identity as JSON")
				.action(ArgAction::SetTrue),
		)
		.get_matches();

	let level = if matches.get_flag("verbose") { "debug" } else { "warn" };
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
		.format_timestamp(None)
		.init();

	if let Err(err) = run(&matches) {
		log::error!("{}, quitting", err);
		process::exit(1);
	}
}

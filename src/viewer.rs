
use std::io::{self, Error, ErrorKind};
use std::path::Path;
use std::process::Command;

use log::debug;

// Hands the file to whatever the desktop considers its default image viewer.  macOS and
// Windows ship shell-level openers; everything else is assumed to have xdg-open
pub fn open_with_system_viewer(path:&Path) -> io::Result<()> {
	debug!("Opening {} with the system viewer", path.display());

	#[cfg(target_os = "macos")]
	let status = Command::new("open").arg(path).status()?;

	#[cfg(target_os = "windows")]
	let status = Command::new("cmd").args(["/C", "start", ""]).arg(path).status()?;

	#[cfg(not(any(target_os = "macos", target_os = "windows")))]
	let status = Command::new("xdg-open").arg(path).status()?;

	if status.success() {
		Ok(())
	} else {
		Err(Error::new(ErrorKind::Other, format!("Viewer exited with {}", status)))
	}
}

//! Server address discovery.
//!
//! The client reads the server location from a two-line text file: the
//! address on the first line, the port on the second. This file is the
//! only persisted configuration.

use std::fs;
use std::path::Path;

/// Loads `<address>:<port>` from the two-line config file.
pub fn load_server_addr<P: AsRef<Path>>(path: P) -> Result<String, Box<dyn std::error::Error>> {
    let contents = fs::read_to_string(&path)?;
    let mut lines = contents.lines();

    let address = lines
        .next()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .ok_or("config file missing address line")?;
    let port: u16 = lines
        .next()
        .map(str::trim)
        .ok_or("config file missing port line")?
        .parse()?;

    Ok(format!("{}:{}", address, port))
}

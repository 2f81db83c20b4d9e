//! Utilities related to the parsing of arguments.

use std::time::Duration;

/// Utility method to parse the number of concurrent jobs passed in on the
/// command line and ensure that at least one job may run.
pub fn at_least_one(raw: &str) -> Result<usize, String> {
    let value: usize = raw
        .parse()
        .map_err(|_| format!("{} isn't a positive integer", raw))?;

    match value {
        0 => Err(String::from("value must be at least 1")),
        v => Ok(v),
    }
}

/// Utility method to parse a timeout in seconds passed in on the command line.
pub fn timeout_in_seconds(raw: &str) -> Result<Duration, String> {
    let secs: u64 = raw
        .parse()
        .map_err(|_| format!("{} isn't a whole number of seconds", raw))?;

    match secs {
        0 => Err(String::from("timeout must be greater than zero seconds")),
        s => Ok(Duration::from_secs(s)),
    }
}

/// Splits a comma separated list, dropping empty items and surrounding
/// whitespace.
pub fn comma_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

//! Forwarding of the engine's own log into the `log` facade.
//!
//! The engine writes whole lines such as `"Warn,  T0: Skipping one or more lines"`. The
//! severity header picks the `log` level and is stripped. Records go to the `assimp` target so
//! they can be filtered apart from the bridge's own.

use log::Level;

/// Target of every forwarded record.
pub const TARGET: &str = "assimp";

const HEADERS: [(&str, Level); 4] = [
    ("Debug,", Level::Debug),
    ("Info,", Level::Info),
    ("Warn,", Level::Warn),
    ("Error,", Level::Error),
];

/// Splits an engine log line into its level and message. Lines without a known header are
/// `Info`, kept whole.
pub fn split_engine_line(line: &str) -> (Level, &str) {
    let line = line.trim_end_matches(|c| c == '\n' || c == '\r');
    for &(header, level) in HEADERS.iter() {
        if line.starts_with(header) {
            let rest = &line[header.len()..];
            // thread marker: "  T0: "
            let message = match rest.find(": ") {
                Some(at) => &rest[at + 2..],
                None => rest.trim_start(),
            };
            return (level, message);
        }
    }
    (Level::Info, line)
}

/// Logs one engine line at its own level.
pub fn forward_engine_line(line: &str) {
    let (level, message) = split_engine_line(line);
    if message.is_empty() {
        return;
    }
    match level {
        Level::Error => error!(target: TARGET, "{}", message),
        Level::Warn => warn!(target: TARGET, "{}", message),
        Level::Info => info!(target: TARGET, "{}", message),
        Level::Debug | Level::Trace => debug!(target: TARGET, "{}", message),
    }
}

#[test]
fn headers_pick_the_level() {
    assert_eq!(
        split_engine_line("Debug, T0: Load cube.obj\n"),
        (Level::Debug, "Load cube.obj")
    );
    assert_eq!(
        split_engine_line("Info,  T12: Found a matching importer for this file format: OBJ.\n"),
        (Level::Info, "Found a matching importer for this file format: OBJ.")
    );
    assert_eq!(
        split_engine_line("Warn,  T0: OBJ: unexpected token"),
        (Level::Warn, "OBJ: unexpected token")
    );
    assert_eq!(
        split_engine_line("Error, T3: Unable to open file \"a.obj\".\r\n"),
        (Level::Error, "Unable to open file \"a.obj\".")
    );
}

#[test]
fn unknown_headers_are_kept_whole() {
    assert_eq!(split_engine_line("plain text\n"), (Level::Info, "plain text"));
    assert_eq!(split_engine_line("Error,"), (Level::Error, ""));
    assert_eq!(split_engine_line(""), (Level::Info, ""));
}

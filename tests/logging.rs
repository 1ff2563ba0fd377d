extern crate asset_bridge;
extern crate log;

mod common;

use asset_bridge::logging::TARGET;
use asset_bridge::{Bridge, ImportOptions};
use common::*;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::cell::RefCell;

// Keeps engine records per test thread; this binary installs no other logger.
struct Capture;

thread_local! {
    static RECORDS: RefCell<Vec<(Level, String)>> = RefCell::new(Vec::new());
}

impl Log for Capture {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.target() == TARGET
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            RECORDS.with(|r| r.borrow_mut().push((record.level(), record.args().to_string())));
        }
    }

    fn flush(&self) {}
}

static CAPTURE: Capture = Capture;

fn install() {
    let _ = log::set_logger(&CAPTURE);
    log::set_max_level(LevelFilter::Trace);
    RECORDS.with(|r| r.borrow_mut().clear());
}

fn records() -> Vec<(Level, String)> {
    RECORDS.with(|r| r.borrow().clone())
}

#[test]
fn engine_lines_keep_their_level() {
    install();
    let engine = MockEngine::new().with_file("a.obj", b"v");
    let bridge = Bridge::new(engine);
    assert!(bridge.attach_engine_log(false));

    let (found, missing) = (cs("a.obj"), cs("missing.obj"));
    assert!(bridge.import_file(Some(&found), &ImportOptions::default()).is_some());
    assert!(bridge.import_file(Some(&missing), &ImportOptions::default()).is_none());

    assert_eq!(
        records(),
        vec![
            (Level::Info, "Load a.obj".to_owned()),
            (Level::Error, "Unable to open file \"missing.obj\".".to_owned()),
        ]
    );
    assert!(bridge.detach_engine_log());
}

#[test]
fn verbose_log_adds_debug_lines() {
    install();
    let bridge = Bridge::new(MockEngine::new().with_file("a.obj", b"v 1"));
    assert!(bridge.attach_engine_log(true));

    let path = cs("a.obj");
    assert!(bridge.import_file(Some(&path), &ImportOptions::default()).is_some());
    assert_eq!(
        records(),
        vec![
            (Level::Debug, "3 bytes from a.obj".to_owned()),
            (Level::Info, "Load a.obj".to_owned()),
        ]
    );
}

#[test]
fn detached_log_is_silent() {
    install();
    let bridge = Bridge::new(MockEngine::new().with_file("a.obj", b"v"));
    assert!(!bridge.detach_engine_log());
    assert!(bridge.attach_engine_log(false));
    assert!(bridge.detach_engine_log());

    let path = cs("a.obj");
    assert!(bridge.import_file(Some(&path), &ImportOptions::default()).is_some());
    assert!(records().is_empty());
    assert!(!bridge.detach_engine_log());
}

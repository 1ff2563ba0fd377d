//! Bridge errors and the per-thread last-error slot.
//!
//! Every channel-style entry point clears the slot when it starts and writes it only when it
//! fails. The slot is thread-local, so concurrent calls on different threads never see each
//! other's messages.

use libc::c_char;
use std::cell::RefCell;
use std::ffi::CString;
use std::ptr;

#[derive(Clone, Debug, Fail, PartialEq)]
pub enum BridgeError {
    #[fail(display = "Path is null")]
    NullPath,
    #[fail(display = "Memory buffer is empty")]
    EmptyBuffer,
    #[fail(display = "Scene is null")]
    NullScene,
    #[fail(display = "Format id is null")]
    NullFormatId,
    /// Message reported by the engine's importer, passed through verbatim.
    #[fail(display = "{}", _0)]
    Import(String),
    /// Message reported by the engine's exporter, passed through verbatim.
    #[fail(display = "{}", _0)]
    Export(String),
    #[fail(display = "aiCopyScene returned null")]
    CopyFailed,
    #[fail(display = "Export support is disabled in this build")]
    ExportDisabled,
    #[fail(display = "Invalid property: {}", _0)]
    InvalidProperty(String),
    #[fail(display = "panic in bridge call")]
    Panic,
}

impl BridgeError {
    /// Engine import failure. Some readers fail without a message.
    pub fn import<S: Into<String>>(message: S) -> BridgeError {
        let message = message.into();
        if message.is_empty() {
            BridgeError::Import("Import failed".to_owned())
        } else {
            BridgeError::Import(message)
        }
    }

    pub fn export<S: Into<String>>(message: S) -> BridgeError {
        let message = message.into();
        if message.is_empty() {
            BridgeError::Export("Export failed".to_owned())
        } else {
            BridgeError::Export(message)
        }
    }
}

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = RefCell::new(None);
}

pub fn clear_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

/// Overwrites this thread's slot. Interior NULs are replaced so the message stays readable
/// from C.
pub fn set_error<S: AsRef<str>>(message: S) {
    let bytes: Vec<u8> = message
        .as_ref()
        .bytes()
        .map(|b| if b == 0 { b'?' } else { b })
        .collect();
    // no NUL left in `bytes`
    let message = CString::new(bytes).unwrap_or_default();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(message));
}

/// Records `err` in the slot (its `Display` form).
pub fn record(err: &BridgeError) {
    set_error(err.to_string());
}

/// Copy of this thread's last error, `None` when the last call succeeded.
pub fn last_error() -> Option<String> {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map(|msg| msg.to_string_lossy().into_owned())
    })
}

/// Borrowed pointer to this thread's last error, or null.
///
/// Valid until the next bridge call on the same thread.
pub fn last_error_ptr() -> *const c_char {
    LAST_ERROR.with(|slot| match *slot.borrow() {
        Some(ref msg) => msg.as_ptr(),
        None => ptr::null(),
    })
}

#[cfg(test)]
use std::ffi::CStr;
#[cfg(test)]
use std::thread;

#[test]
fn slot_starts_empty_and_clears() {
    clear_error();
    assert_eq!(last_error(), None);
    assert!(last_error_ptr().is_null());

    record(&BridgeError::NullPath);
    assert_eq!(last_error(), Some("Path is null".to_owned()));
    let raw = unsafe { CStr::from_ptr(last_error_ptr()) };
    assert_eq!(raw.to_str().unwrap(), "Path is null");

    clear_error();
    assert_eq!(last_error(), None);
}

#[test]
fn set_error_overwrites_and_scrubs_nul() {
    set_error("first");
    set_error("second\0half");
    assert_eq!(last_error(), Some("second?half".to_owned()));
    clear_error();
}

#[test]
fn empty_engine_messages_get_a_fallback() {
    assert_eq!(BridgeError::import("").to_string(), "Import failed");
    assert_eq!(BridgeError::export("").to_string(), "Export failed");
    assert_eq!(
        BridgeError::import("Unable to open file \"a.obj\".").to_string(),
        "Unable to open file \"a.obj\"."
    );
}

#[test]
fn slot_is_per_thread() {
    set_error("main thread");
    let other = thread::spawn(|| last_error()).join().unwrap();
    assert_eq!(other, None);
    assert_eq!(last_error(), Some("main thread".to_owned()));
    clear_error();
}

//! Progress reporting through one scalar C callback.

use engine::{step_fraction, ProgressHandler};
use ffi::AiProgressCallback;
use libc::{c_char, c_float, c_void};
use std::ffi::CStr;
use std::io::{Cursor, Write};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

/// Size of the message buffer handed to the callback, NUL included.
pub const MESSAGE_CAPACITY: usize = 64;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProgressPhase {
    Read,
    PostProcess,
    Write,
}

impl ProgressPhase {
    pub fn label(self) -> &'static str {
        match self {
            ProgressPhase::Read => "read",
            ProgressPhase::PostProcess => "post",
            ProgressPhase::Write => "write",
        }
    }

    /// Overall fraction for a step of this phase. Reading and writing cover `[0,0.5]`,
    /// post-processing `[0.5,1]`. With no steps, read/write report 0 and post-processing
    /// reports itself complete.
    pub fn fraction(self, current_step: i32, number_of_steps: i32) -> f32 {
        match self {
            ProgressPhase::Read | ProgressPhase::Write => {
                step_fraction(current_step, number_of_steps, 0.0) * 0.5
            }
            ProgressPhase::PostProcess => step_fraction(current_step, number_of_steps, 1.0) * 0.5 + 0.5,
        }
    }
}

/// Formats `"<phase> <step>/<total>"` into `buf`, truncating to fit.
pub fn format_message(
    buf: &mut [u8; MESSAGE_CAPACITY],
    phase: ProgressPhase,
    current_step: i32,
    number_of_steps: i32,
) -> &CStr {
    let len = {
        let mut cursor = Cursor::new(&mut buf[..MESSAGE_CAPACITY - 1]);
        // a full buffer just truncates the message
        let _ = write!(cursor, "{} {}/{}", phase.label(), current_step, number_of_steps);
        cursor.position() as usize
    };
    buf[len] = 0;
    // the formatted text never contains NUL
    unsafe { CStr::from_bytes_with_nul_unchecked(&buf[..len + 1]) }
}

/// Engine progress handler forwarding to a C callback and its user pointer.
pub struct CallbackProgressHandler {
    callback: AiProgressCallback,
    user_data: *mut c_void,
}

impl CallbackProgressHandler {
    pub fn new(callback: AiProgressCallback, user_data: *mut c_void) -> CallbackProgressHandler {
        CallbackProgressHandler { callback, user_data }
    }

    fn phased(&mut self, phase: ProgressPhase, current_step: i32, number_of_steps: i32) {
        let callback = match self.callback {
            Some(callback) => callback,
            None => return,
        };
        let mut buf = [0u8; MESSAGE_CAPACITY];
        let message = format_message(&mut buf, phase, current_step, number_of_steps);
        let fraction = phase.fraction(current_step, number_of_steps);
        // only `update` can cancel
        let _ = unsafe { callback(fraction, message.as_ptr(), self.user_data) };
    }
}

impl ProgressHandler for CallbackProgressHandler {
    fn update(&mut self, percentage: f32) -> bool {
        match self.callback {
            Some(callback) => unsafe { callback(percentage, ptr::null(), self.user_data) },
            None => true,
        }
    }

    fn update_file_read(&mut self, current_step: i32, number_of_steps: i32) {
        self.phased(ProgressPhase::Read, current_step, number_of_steps)
    }

    fn update_post_process(&mut self, current_step: i32, number_of_steps: i32) {
        self.phased(ProgressPhase::PostProcess, current_step, number_of_steps)
    }

    fn update_file_write(&mut self, current_step: i32, number_of_steps: i32) {
        self.phased(ProgressPhase::Write, current_step, number_of_steps)
    }
}

/// Turns a Rust closure into a `(callback, user_data)` pair for the bridge.
///
/// The pair borrows the closure: it must not be used after `self` is dropped. A panic inside
/// the closure is caught and treated as a cancellation request.
pub struct ProgressClosure<'a, F: 'a> {
    closure: &'a mut F,
}

impl<'a, F> ProgressClosure<'a, F>
where
    F: FnMut(f32, Option<&str>) -> bool,
{
    pub fn new(closure: &'a mut F) -> ProgressClosure<'a, F> {
        ProgressClosure { closure }
    }

    pub fn callback(&self) -> AiProgressCallback {
        Some(trampoline::<F>)
    }

    pub fn user_data(&mut self) -> *mut c_void {
        &mut *self.closure as *mut F as *mut c_void
    }
}

unsafe extern "C" fn trampoline<F>(percentage: c_float, message: *const c_char, user: *mut c_void) -> bool
where
    F: FnMut(f32, Option<&str>) -> bool,
{
    let closure = match (user as *mut F).as_mut() {
        Some(closure) => closure,
        None => return true,
    };
    let message = if message.is_null() {
        None
    } else {
        CStr::from_ptr(message).to_str().ok()
    };
    match panic::catch_unwind(AssertUnwindSafe(|| closure(percentage, message))) {
        Ok(keep_going) => keep_going,
        Err(_) => {
            error!("progress callback panicked, cancelling");
            false
        }
    }
}

#[cfg(test)]
fn collect_events<H: FnOnce(&mut CallbackProgressHandler)>(drive: H) -> Vec<(f32, Option<String>)> {
    let mut events = Vec::new();
    {
        let mut record = |p: f32, m: Option<&str>| {
            events.push((p, m.map(|s| s.to_owned())));
            true
        };
        let mut pc = ProgressClosure::new(&mut record);
        let mut handler = CallbackProgressHandler::new(pc.callback(), pc.user_data());
        drive(&mut handler);
    }
    events
}

#[test]
fn empty_phases_use_the_substitution_policy() {
    assert_eq!(ProgressPhase::Read.fraction(0, 0), 0.0);
    assert_eq!(ProgressPhase::Write.fraction(0, 0), 0.0);
    assert_eq!(ProgressPhase::PostProcess.fraction(0, 0), 1.0);
}

#[test]
fn phases_map_to_their_ranges() {
    assert_eq!(ProgressPhase::Read.fraction(2, 4), 0.25);
    assert_eq!(ProgressPhase::Read.fraction(4, 4), 0.5);
    assert_eq!(ProgressPhase::PostProcess.fraction(0, 4), 0.5);
    assert_eq!(ProgressPhase::PostProcess.fraction(2, 4), 0.75);
    assert_eq!(ProgressPhase::Write.fraction(1, 1), 0.5);
}

#[test]
fn phased_updates_carry_messages() {
    let events = collect_events(|h| {
        h.update_file_read(1, 2);
        h.update_post_process(3, 3);
        h.update_file_write(0, 0);
        h.update(-1.0);
    });
    assert_eq!(
        events,
        vec![
            (0.25, Some("read 1/2".to_owned())),
            (1.0, Some("post 3/3".to_owned())),
            (0.0, Some("write 0/0".to_owned())),
            (-1.0, None),
        ]
    );
}

#[test]
fn message_fits_extreme_counters() {
    let mut buf = [0u8; MESSAGE_CAPACITY];
    let msg = format_message(&mut buf, ProgressPhase::PostProcess, i32::min_value(), i32::max_value());
    assert_eq!(msg.to_str().unwrap(), "post -2147483648/2147483647");
    assert!(msg.to_bytes().len() < MESSAGE_CAPACITY);
}

#[test]
fn update_reports_cancellation() {
    let mut stop = |_: f32, _: Option<&str>| false;
    let mut pc = ProgressClosure::new(&mut stop);
    let mut handler = CallbackProgressHandler::new(pc.callback(), pc.user_data());
    assert!(!handler.update(0.3));
    // phased updates ignore the answer
    handler.update_file_read(1, 1);
}

#[test]
fn absent_callback_never_cancels() {
    let mut handler = CallbackProgressHandler::new(None, ptr::null_mut());
    assert!(handler.update(0.5));
    handler.update_post_process(0, 0);
}

#[test]
fn panicking_closure_cancels_instead_of_unwinding() {
    let mut boom = |_: f32, _: Option<&str>| -> bool { panic!("boom") };
    let mut pc = ProgressClosure::new(&mut boom);
    let mut handler = CallbackProgressHandler::new(pc.callback(), pc.user_data());
    assert!(!handler.update(0.1));
}

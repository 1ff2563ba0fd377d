//! Re-exposes an `IoSystem` to the engine's C API as an `aiFileIO` table.

use engine::{IoStream, IoSystem};
use ffi::{AiFile, AiFileIO, AiOrigin, AiReturn};
use libc::{c_char, c_int, size_t};
use std::ffi::CStr;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::slice;

/// Owns an `IoSystem` and the table pointing at it. Boxed: the engine keeps the table's
/// address for the whole call.
#[repr(C)]
pub struct IoBridge {
    // must stay first
    table: AiFileIO,
    system: Box<dyn IoSystem>,
}

#[repr(C)]
struct StreamBridge {
    // must stay first
    file: AiFile,
    stream: Option<Box<dyn IoStream>>,
}

impl IoBridge {
    pub fn new(system: Box<dyn IoSystem>) -> Box<IoBridge> {
        let mut bridge = Box::new(IoBridge {
            table: AiFileIO {
                open_proc: Some(bridge_open),
                close_proc: Some(bridge_close),
                user_data: ptr::null_mut(),
            },
            system,
        });
        bridge.table.user_data = &mut *bridge as *mut IoBridge as *mut c_char;
        bridge
    }

    pub fn table(&mut self) -> *mut AiFileIO {
        &mut self.table
    }
}

// the engine's C++ code cannot take an unwinding panic
pub fn contain<R, F: FnOnce() -> R>(what: &str, fallback: R, f: F) -> R {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(r) => r,
        Err(_) => {
            error!("panic in {} callback", what);
            fallback
        }
    }
}

unsafe fn io_bridge<'a>(io: *mut AiFileIO) -> Option<&'a mut IoBridge> {
    io.as_ref()
        .and_then(|table| (table.user_data as *mut IoBridge).as_mut())
}

unsafe fn stream<'a>(file: *mut AiFile) -> Option<&'a mut Box<dyn IoStream>> {
    (file as *mut StreamBridge)
        .as_mut()
        .and_then(|bridge| bridge.stream.as_mut())
}

unsafe extern "C" fn bridge_open(io: *mut AiFileIO, path: *const c_char, mode: *const c_char) -> *mut AiFile {
    let bridge = match io_bridge(io) {
        Some(bridge) => bridge,
        None => return ptr::null_mut(),
    };
    if path.is_null() {
        return ptr::null_mut();
    }
    let path = CStr::from_ptr(path);
    let mode = if mode.is_null() { Default::default() } else { CStr::from_ptr(mode) };
    contain("file open", ptr::null_mut(), || match bridge.system.open(path, mode) {
        Some(stream) => {
            let file = Box::new(StreamBridge {
                file: AiFile {
                    read_proc: Some(bridge_read),
                    write_proc: Some(bridge_write),
                    tell_proc: Some(bridge_tell),
                    file_size_proc: Some(bridge_size),
                    seek_proc: Some(bridge_seek),
                    flush_proc: Some(bridge_flush),
                    user_data: ptr::null_mut(),
                },
                stream: Some(stream),
            });
            Box::into_raw(file) as *mut AiFile
        }
        None => ptr::null_mut(),
    })
}

unsafe extern "C" fn bridge_close(io: *mut AiFileIO, file: *mut AiFile) {
    if file.is_null() {
        return;
    }
    let mut file = Box::from_raw(file as *mut StreamBridge);
    let stream = match file.stream.take() {
        Some(stream) => stream,
        None => return,
    };
    match io_bridge(io) {
        Some(bridge) => contain("file close", (), || bridge.system.close(stream)),
        // no system to hand it back to; the stream's own drop has to do
        None => drop(stream),
    }
}

unsafe extern "C" fn bridge_read(file: *mut AiFile, buffer: *mut c_char, size: size_t, count: size_t) -> size_t {
    let stream = match stream(file) {
        Some(stream) => stream,
        None => return 0,
    };
    if buffer.is_null() || size == 0 || count == 0 {
        return 0;
    }
    let buffer = slice::from_raw_parts_mut(buffer as *mut u8, size.saturating_mul(count));
    contain("file read", 0, || stream.read(buffer, size, count))
}

unsafe extern "C" fn bridge_write(file: *mut AiFile, buffer: *const c_char, size: size_t, count: size_t) -> size_t {
    let stream = match stream(file) {
        Some(stream) => stream,
        None => return 0,
    };
    if buffer.is_null() || size == 0 || count == 0 {
        return 0;
    }
    let buffer = slice::from_raw_parts(buffer as *const u8, size.saturating_mul(count));
    contain("file write", 0, || stream.write(buffer, size, count))
}

unsafe extern "C" fn bridge_tell(file: *mut AiFile) -> size_t {
    match stream(file) {
        Some(stream) => contain("file tell", 0, || stream.tell()),
        None => 0,
    }
}

unsafe extern "C" fn bridge_size(file: *mut AiFile) -> size_t {
    match stream(file) {
        Some(stream) => contain("file size", 0, || stream.file_size()),
        None => 0,
    }
}

unsafe extern "C" fn bridge_seek(file: *mut AiFile, offset: size_t, origin: c_int) -> c_int {
    let origin = match AiOrigin::from_raw(origin) {
        Some(origin) => origin,
        None => return AiReturn::Failure.to_raw(),
    };
    match stream(file) {
        Some(stream) => contain("file seek", AiReturn::Failure, || stream.seek(offset, origin)).to_raw(),
        None => AiReturn::Failure.to_raw(),
    }
}

unsafe extern "C" fn bridge_flush(file: *mut AiFile) {
    if let Some(stream) = stream(file) {
        contain("file flush", (), || stream.flush())
    }
}

#[cfg(test)]
use io::{FileIoStream, FileIoSystem, MemoryFileIo};
#[cfg(test)]
use std::ffi::CString;

#[test]
fn bridged_table_round_trips_through_an_io_system() {
    let mem = MemoryFileIo::new();
    mem.add_file("in.bin", vec![9, 8, 7]);
    let mut bridge = IoBridge::new(Box::new(FileIoSystem::new(mem.table())));
    let table = bridge.table();

    let path = CString::new("in.bin").unwrap();
    let mode = CString::new("rb").unwrap();
    unsafe {
        let open = (*table).open_proc.unwrap();
        let close = (*table).close_proc.unwrap();
        let file = open(table, path.as_ptr(), mode.as_ptr());
        assert!(!file.is_null());

        let mut buf = [0u8; 3];
        let read = (*file).read_proc.unwrap();
        assert_eq!(read(file, buf.as_mut_ptr() as *mut c_char, 1, 3), 3);
        assert_eq!(buf, [9, 8, 7]);
        assert_eq!((*file).file_size_proc.unwrap()(file), 3);

        close(table, file);
    }
    assert_eq!(mem.open_count(), 1);
    assert_eq!(mem.close_count(), 1);
}

#[test]
fn bridged_open_of_missing_file_is_null() {
    let mem = MemoryFileIo::new();
    let mut bridge = IoBridge::new(Box::new(FileIoSystem::new(mem.table())));
    let table = bridge.table();
    let path = CString::new("missing").unwrap();
    let mode = CString::new("rb").unwrap();
    unsafe {
        let open = (*table).open_proc.unwrap();
        assert!(open(table, path.as_ptr(), mode.as_ptr()).is_null());
    }
}

#[test]
fn bridged_close_after_inner_close_releases_once() {
    let mem = MemoryFileIo::new();
    mem.add_file("in.bin", vec![1]);
    let mut bridge = IoBridge::new(Box::new(FileIoSystem::new(mem.table())));
    let table = bridge.table();
    let path = CString::new("in.bin").unwrap();
    let mode = CString::new("rb").unwrap();
    unsafe {
        let file = (*table).open_proc.unwrap()(table, path.as_ptr(), mode.as_ptr());
        assert!(!file.is_null());
        {
            let inner = stream(file).unwrap();
            let inner = inner.as_any_mut().downcast_mut::<FileIoStream>().unwrap();
            inner.close();
            assert!(!inner.is_open());
        }
        assert_eq!(mem.close_count(), 1);
        (*table).close_proc.unwrap()(table, file);
    }
    assert_eq!(mem.open_count(), 1);
    assert_eq!(mem.close_count(), 1);
}

#[test]
fn bridged_seek_maps_raw_origins() {
    let mem = MemoryFileIo::new();
    mem.add_file("in.bin", vec![1, 2, 3]);
    let mut bridge = IoBridge::new(Box::new(FileIoSystem::new(mem.table())));
    let table = bridge.table();
    let path = CString::new("in.bin").unwrap();
    let mode = CString::new("rb").unwrap();
    unsafe {
        let file = (*table).open_proc.unwrap()(table, path.as_ptr(), mode.as_ptr());
        let seek = (*file).seek_proc.unwrap();
        assert_eq!(seek(file, 0, AiOrigin::End.to_raw()), AiReturn::Success.to_raw());
        assert_eq!((*file).tell_proc.unwrap()(file), 3);
        assert_eq!(seek(file, 0, 17), AiReturn::Failure.to_raw());
        (*table).close_proc.unwrap()(table, file);
    }
}

//! File I/O through a caller-supplied function table.
//!
//! `FileIoSystem` and `FileIoStream` present an `AiFileIO` table to the engine as its
//! file-system and file-stream abstractions. `MemoryFileIo` goes the other way: it is a real
//! `AiFileIO` table backed by in-memory buffers, handy for embedded assets and tests.

use engine::{IoStream, IoSystem};
use ffi::{AiFile, AiFileIO, AiOrigin, AiReturn};
use libc::{c_char, c_int, size_t};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::CStr;
use std::ptr;
use std::slice;

#[cfg(windows)]
const OS_SEPARATOR: char = '\\';
#[cfg(not(windows))]
const OS_SEPARATOR: char = '/';

/// Engine file system over a borrowed `AiFileIO`. The table must outlive the bridge call.
pub struct FileIoSystem {
    file_io: *const AiFileIO,
}

impl FileIoSystem {
    pub fn new(file_io: &AiFileIO) -> FileIoSystem {
        FileIoSystem { file_io }
    }

    fn table(&self) -> Option<&AiFileIO> {
        unsafe { self.file_io.as_ref() }
    }
}

impl IoSystem for FileIoSystem {
    // open/close probe: there is no stat in the table
    fn exists(&self, path: &CStr) -> bool {
        let table = match self.table() {
            Some(table) => table,
            None => return false,
        };
        let (open, close) = match (table.open_proc, table.close_proc) {
            (Some(open), Some(close)) => (open, close),
            _ => return false,
        };
        let io = self.file_io as *mut AiFileIO;
        unsafe {
            let file = open(io, path.as_ptr(), b"rb\0".as_ptr() as *const c_char);
            if file.is_null() {
                return false;
            }
            close(io, file);
        }
        true
    }

    fn os_separator(&self) -> char {
        OS_SEPARATOR
    }

    fn open(&mut self, path: &CStr, mode: &CStr) -> Option<Box<dyn IoStream>> {
        let open = self.table().and_then(|table| table.open_proc)?;
        let handle = unsafe { open(self.file_io as *mut AiFileIO, path.as_ptr(), mode.as_ptr()) };
        if handle.is_null() {
            debug!("file table could not open {:?} ({:?})", path, mode);
            return None;
        }
        Some(Box::new(FileIoStream {
            file_io: self.file_io,
            handle,
        }))
    }

    fn close(&mut self, mut stream: Box<dyn IoStream>) {
        if let Some(stream) = stream.as_any_mut().downcast_mut::<FileIoStream>() {
            stream.close();
        }
        // dropping the adapter is a no-op for the handle once closed
    }
}

/// One handle opened through a `FileIoSystem`.
pub struct FileIoStream {
    file_io: *const AiFileIO,
    handle: *mut AiFile,
}

impl FileIoStream {
    pub fn is_open(&self) -> bool {
        !self.handle.is_null()
    }

    /// Hands the handle back to the table. Safe to call more than once: the table's close runs
    /// only the first time.
    pub fn close(&mut self) {
        if self.handle.is_null() {
            return;
        }
        if let Some(table) = unsafe { self.file_io.as_ref() } {
            if let Some(close) = table.close_proc {
                unsafe { close(self.file_io as *mut AiFileIO, self.handle) };
            }
        }
        self.handle = ptr::null_mut();
    }

    fn file(&self) -> Option<&AiFile> {
        unsafe { self.handle.as_ref() }
    }
}

impl Drop for FileIoStream {
    fn drop(&mut self) {
        // the engine aborted without closing
        self.close();
    }
}

impl IoStream for FileIoStream {
    fn read(&mut self, buffer: &mut [u8], size: usize, count: usize) -> usize {
        let count = clamp_count(buffer.len(), size, count);
        match self.file().and_then(|f| f.read_proc) {
            Some(read) => unsafe { read(self.handle, buffer.as_mut_ptr() as *mut c_char, size, count) },
            None => 0,
        }
    }

    fn write(&mut self, buffer: &[u8], size: usize, count: usize) -> usize {
        let count = clamp_count(buffer.len(), size, count);
        match self.file().and_then(|f| f.write_proc) {
            Some(write) => unsafe { write(self.handle, buffer.as_ptr() as *const c_char, size, count) },
            None => 0,
        }
    }

    fn seek(&mut self, offset: usize, origin: AiOrigin) -> AiReturn {
        match self.file().and_then(|f| f.seek_proc) {
            Some(seek) => AiReturn::from_raw(unsafe { seek(self.handle, offset, origin.to_raw()) }),
            None => AiReturn::Failure,
        }
    }

    fn tell(&self) -> usize {
        match self.file().and_then(|f| f.tell_proc) {
            Some(tell) => unsafe { tell(self.handle) },
            None => 0,
        }
    }

    fn file_size(&self) -> usize {
        match self.file().and_then(|f| f.file_size_proc) {
            Some(file_size) => unsafe { file_size(self.handle) },
            None => 0,
        }
    }

    fn flush(&mut self) {
        if let Some(flush) = self.file().and_then(|f| f.flush_proc) {
            unsafe { flush(self.handle) }
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// never let the table touch memory past the end of `buffer`
fn clamp_count(len: usize, size: usize, count: usize) -> usize {
    if size == 0 {
        count
    } else {
        count.min(len / size)
    }
}

//--------------------------------------------------------------------------------------------------
// In-memory table

/// An `AiFileIO` table serving named in-memory buffers.
///
/// Files opened for writing are stored back when closed. The value is boxed so the table's
/// user pointer stays valid; keep it alive for as long as the table is in use.
pub struct MemoryFileIo {
    table: AiFileIO,
    files: RefCell<HashMap<String, Vec<u8>>>,
    opened: Cell<usize>,
    closed: Cell<usize>,
}

#[repr(C)]
struct MemoryFile {
    // must stay first: the engine only ever sees `*mut AiFile`
    file: AiFile,
    owner: *const MemoryFileIo,
    path: String,
    data: Vec<u8>,
    pos: usize,
    writable: bool,
}

impl MemoryFileIo {
    pub fn new() -> Box<MemoryFileIo> {
        let mut io = Box::new(MemoryFileIo {
            table: AiFileIO {
                open_proc: Some(memory_open),
                close_proc: Some(memory_close),
                user_data: ptr::null_mut(),
            },
            files: RefCell::new(HashMap::new()),
            opened: Cell::new(0),
            closed: Cell::new(0),
        });
        io.table.user_data = &*io as *const MemoryFileIo as *mut c_char;
        io
    }

    pub fn add_file<S: Into<String>>(&self, path: S, data: Vec<u8>) {
        self.files.borrow_mut().insert(path.into(), data);
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.borrow().get(path).cloned()
    }

    pub fn file_count(&self) -> usize {
        self.files.borrow().len()
    }

    /// The table to hand to the bridge. Copies of it stay bound to this value.
    pub fn table(&self) -> &AiFileIO {
        &self.table
    }

    pub fn open_count(&self) -> usize {
        self.opened.get()
    }

    pub fn close_count(&self) -> usize {
        self.closed.get()
    }
}

unsafe fn memory_owner<'a>(io: *mut AiFileIO) -> Option<&'a MemoryFileIo> {
    io.as_ref()
        .and_then(|table| (table.user_data as *const MemoryFileIo).as_ref())
}

unsafe fn memory_file<'a>(file: *mut AiFile) -> Option<&'a mut MemoryFile> {
    (file as *mut MemoryFile).as_mut()
}

unsafe extern "C" fn memory_open(io: *mut AiFileIO, path: *const c_char, mode: *const c_char) -> *mut AiFile {
    let owner = match memory_owner(io) {
        Some(owner) => owner,
        None => return ptr::null_mut(),
    };
    if path.is_null() {
        return ptr::null_mut();
    }
    let path = CStr::from_ptr(path).to_string_lossy().into_owned();
    let mode = if mode.is_null() {
        "rb".to_owned()
    } else {
        CStr::from_ptr(mode).to_string_lossy().into_owned()
    };

    let existing = owner.files.borrow().get(&path).cloned();
    let (data, pos, writable) = if mode.starts_with('w') {
        (Vec::new(), 0, true)
    } else if mode.starts_with('a') {
        let data = existing.unwrap_or_default();
        let end = data.len();
        (data, end, true)
    } else {
        match existing {
            Some(data) => (data, 0, mode.contains('+')),
            None => return ptr::null_mut(),
        }
    };

    owner.opened.set(owner.opened.get() + 1);
    let file = Box::new(MemoryFile {
        file: AiFile {
            read_proc: Some(memory_read),
            write_proc: Some(memory_write),
            tell_proc: Some(memory_tell),
            file_size_proc: Some(memory_size),
            seek_proc: Some(memory_seek),
            flush_proc: Some(memory_flush),
            user_data: ptr::null_mut(),
        },
        owner,
        path,
        data,
        pos,
        writable,
    });
    Box::into_raw(file) as *mut AiFile
}

unsafe extern "C" fn memory_close(_io: *mut AiFileIO, file: *mut AiFile) {
    if file.is_null() {
        return;
    }
    let file = Box::from_raw(file as *mut MemoryFile);
    if let Some(owner) = file.owner.as_ref() {
        owner.closed.set(owner.closed.get() + 1);
        if file.writable {
            let MemoryFile { path, data, .. } = *file;
            owner.files.borrow_mut().insert(path, data);
        }
    }
}

unsafe extern "C" fn memory_read(file: *mut AiFile, buffer: *mut c_char, size: size_t, count: size_t) -> size_t {
    let file = match memory_file(file) {
        Some(file) => file,
        None => return 0,
    };
    if buffer.is_null() || size == 0 || count == 0 {
        return 0;
    }
    let available = file.data.len().saturating_sub(file.pos);
    let elements = count.min(available / size);
    let bytes = elements * size;
    let out = slice::from_raw_parts_mut(buffer as *mut u8, bytes);
    out.copy_from_slice(&file.data[file.pos..file.pos + bytes]);
    file.pos += bytes;
    elements
}

unsafe extern "C" fn memory_write(file: *mut AiFile, buffer: *const c_char, size: size_t, count: size_t) -> size_t {
    let file = match memory_file(file) {
        Some(file) => file,
        None => return 0,
    };
    if !file.writable || buffer.is_null() || size == 0 || count == 0 {
        return 0;
    }
    let bytes = match size.checked_mul(count) {
        Some(bytes) => bytes,
        None => return 0,
    };
    let end = match file.pos.checked_add(bytes) {
        Some(end) => end,
        None => return 0,
    };
    let input = slice::from_raw_parts(buffer as *const u8, bytes);
    if file.data.len() < end {
        file.data.resize(end, 0);
    }
    file.data[file.pos..end].copy_from_slice(input);
    file.pos = end;
    count
}

unsafe extern "C" fn memory_tell(file: *mut AiFile) -> size_t {
    memory_file(file).map(|f| f.pos).unwrap_or(0)
}

unsafe extern "C" fn memory_size(file: *mut AiFile) -> size_t {
    memory_file(file).map(|f| f.data.len()).unwrap_or(0)
}

unsafe extern "C" fn memory_seek(file: *mut AiFile, offset: size_t, origin: c_int) -> c_int {
    let file = match memory_file(file) {
        Some(file) => file,
        None => return AiReturn::Failure.to_raw(),
    };
    let base = match AiOrigin::from_raw(origin) {
        Some(AiOrigin::Set) => 0,
        Some(AiOrigin::Cur) => file.pos,
        Some(AiOrigin::End) => file.data.len(),
        None => return AiReturn::Failure.to_raw(),
    };
    match base.checked_add(offset) {
        Some(pos) if pos <= file.data.len() => {
            file.pos = pos;
            AiReturn::Success.to_raw()
        }
        _ => AiReturn::Failure.to_raw(),
    }
}

unsafe extern "C" fn memory_flush(_file: *mut AiFile) {}

#[cfg(test)]
use std::ffi::CString;

#[cfg(test)]
fn cs(s: &str) -> CString {
    CString::new(s).unwrap()
}

#[test]
fn exists_probes_with_open_and_close() {
    let mem = MemoryFileIo::new();
    mem.add_file("mesh.obj", b"v 0 0 0".to_vec());
    let fs = FileIoSystem::new(mem.table());

    assert!(fs.exists(&cs("mesh.obj")));
    assert!(!fs.exists(&cs("missing.obj")));
    assert_eq!(mem.open_count(), 1);
    assert_eq!(mem.close_count(), 1);
}

#[test]
fn exists_is_false_without_open_or_close() {
    let mem = MemoryFileIo::new();
    mem.add_file("mesh.obj", Vec::new());

    let mut no_close = *mem.table();
    no_close.close_proc = None;
    assert!(!FileIoSystem::new(&no_close).exists(&cs("mesh.obj")));

    let mut no_open = *mem.table();
    no_open.open_proc = None;
    assert!(!FileIoSystem::new(&no_open).exists(&cs("mesh.obj")));

    assert_eq!(mem.open_count(), 0);
}

#[test]
fn separator_is_platform_policy() {
    let mem = MemoryFileIo::new();
    let fs = FileIoSystem::new(mem.table());
    if cfg!(windows) {
        assert_eq!(fs.os_separator(), '\\');
    } else {
        assert_eq!(fs.os_separator(), '/');
    }
}

#[test]
fn open_fails_on_missing_file_or_missing_proc() {
    let mem = MemoryFileIo::new();
    let mut fs = FileIoSystem::new(mem.table());
    assert!(fs.open(&cs("nope"), &cs("rb")).is_none());

    mem.add_file("a", vec![1]);
    let mut no_open = *mem.table();
    no_open.open_proc = None;
    assert!(FileIoSystem::new(&no_open).open(&cs("a"), &cs("rb")).is_none());
}

#[test]
fn stream_reads_whole_elements_and_seeks() {
    let mem = MemoryFileIo::new();
    mem.add_file("data.bin", (0u8..10).collect());
    let mut fs = FileIoSystem::new(mem.table());
    let mut stream = fs.open(&cs("data.bin"), &cs("rb")).unwrap();

    assert_eq!(stream.file_size(), 10);
    let mut buf = [0u8; 8];
    // 10 bytes hold only two complete 4-byte elements
    assert_eq!(stream.read(&mut buf, 4, 3), 2);
    assert_eq!(&buf, &[0, 1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(stream.tell(), 8);

    assert_eq!(stream.seek(2, AiOrigin::Set), AiReturn::Success);
    assert_eq!(stream.seek(100, AiOrigin::Cur), AiReturn::Failure);
    let mut one = [0u8; 1];
    assert_eq!(stream.read(&mut one, 1, 1), 1);
    assert_eq!(one[0], 2);

    fs.close(stream);
    assert_eq!(mem.close_count(), 1);
}

#[test]
fn written_files_are_stored_on_close() {
    let mem = MemoryFileIo::new();
    let mut fs = FileIoSystem::new(mem.table());
    let mut stream = fs.open(&cs("out.txt"), &cs("wb")).unwrap();
    assert_eq!(stream.write(b"hello", 1, 5), 5);
    stream.flush();
    fs.close(stream);
    assert_eq!(mem.file("out.txt"), Some(b"hello".to_vec()));
}

#[test]
fn close_is_idempotent() {
    let mem = MemoryFileIo::new();
    mem.add_file("a", vec![1, 2, 3]);
    let mut fs = FileIoSystem::new(mem.table());
    let mut stream = fs.open(&cs("a"), &cs("rb")).unwrap();

    {
        let adapter = stream.as_any_mut().downcast_mut::<FileIoStream>().unwrap();
        adapter.close();
        adapter.close();
        assert!(!adapter.is_open());
    }
    assert_eq!(mem.close_count(), 1);

    // operations on a closed adapter are inert
    let mut buf = [0u8; 3];
    assert_eq!(stream.read(&mut buf, 1, 3), 0);
    assert_eq!(stream.tell(), 0);
    assert_eq!(stream.seek(0, AiOrigin::Set), AiReturn::Failure);

    fs.close(stream);
    assert_eq!(mem.close_count(), 1);
}

#[test]
fn dropped_stream_still_closes_once() {
    let mem = MemoryFileIo::new();
    mem.add_file("a", vec![1]);
    let mut fs = FileIoSystem::new(mem.table());
    let stream = fs.open(&cs("a"), &cs("rb")).unwrap();
    drop(stream);
    assert_eq!(mem.open_count(), 1);
    assert_eq!(mem.close_count(), 1);
}

#[test]
fn missing_stream_procs_degrade_to_zero() {
    let mut file = AiFile {
        read_proc: None,
        write_proc: None,
        tell_proc: None,
        file_size_proc: None,
        seek_proc: None,
        flush_proc: None,
        user_data: ptr::null_mut(),
    };
    let table = AiFileIO {
        open_proc: None,
        close_proc: None,
        user_data: ptr::null_mut(),
    };
    let mut stream = FileIoStream {
        file_io: &table,
        handle: &mut file,
    };
    let mut buf = [0u8; 4];
    assert_eq!(stream.read(&mut buf, 1, 4), 0);
    assert_eq!(stream.write(&buf, 1, 4), 0);
    assert_eq!(stream.tell(), 0);
    assert_eq!(stream.file_size(), 0);
    assert_eq!(stream.seek(0, AiOrigin::End), AiReturn::Failure);
    stream.flush();
    // no close proc: the handle is simply forgotten
    stream.close();
    assert!(!stream.is_open());
}

#[test]
fn overflowing_write_is_refused() {
    let mem = MemoryFileIo::new();
    let table = mem.table() as *const AiFileIO as *mut AiFileIO;
    let byte = [7u8];
    unsafe {
        let open = (*table).open_proc.unwrap();
        let file = open(table, cs("out.bin").as_ptr(), cs("wb").as_ptr());
        assert!(!file.is_null());
        let write = (*file).write_proc.unwrap();
        let buffer = byte.as_ptr() as *const c_char;
        assert_eq!(write(file, buffer, usize::max_value(), 2), 0);
        assert_eq!(write(file, buffer, 2, usize::max_value()), 0);
        assert_eq!((*file).tell_proc.unwrap()(file), 0);
        assert_eq!(write(file, buffer, 1, 1), 1);
        (*table).close_proc.unwrap()(table, file);
    }
    assert_eq!(mem.file("out.bin"), Some(vec![7]));
}

#[cfg(test)]
unsafe extern "C" fn odd_seek(_: *mut AiFile, _: size_t, _: c_int) -> c_int {
    7
}

#[test]
fn unknown_seek_result_is_a_failure() {
    let mut file = AiFile {
        read_proc: None,
        write_proc: None,
        tell_proc: None,
        file_size_proc: None,
        seek_proc: Some(odd_seek),
        flush_proc: None,
        user_data: ptr::null_mut(),
    };
    let table = AiFileIO {
        open_proc: None,
        close_proc: None,
        user_data: ptr::null_mut(),
    };
    let mut stream = FileIoStream {
        file_io: &table,
        handle: &mut file,
    };
    assert_eq!(stream.seek(0, AiOrigin::Set), AiReturn::Failure);
    stream.close();
}

#[test]
fn memory_seek_rejects_unknown_origin() {
    let mem = MemoryFileIo::new();
    mem.add_file("a", vec![1, 2, 3]);
    let table = mem.table() as *const AiFileIO as *mut AiFileIO;
    unsafe {
        let file = (*table).open_proc.unwrap()(table, cs("a").as_ptr(), cs("rb").as_ptr());
        let seek = (*file).seek_proc.unwrap();
        assert_eq!(seek(file, 1, 9), AiReturn::Failure.to_raw());
        assert_eq!(seek(file, 1, AiOrigin::Set.to_raw()), AiReturn::Success.to_raw());
        (*table).close_proc.unwrap()(table, file);
    }
}

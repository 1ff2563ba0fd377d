//! Raw layouts shared with the engine and with C callers.
//!
//! The file table (`AiFileIO`/`AiFile`) and the blob/matrix/string types mirror the engine's
//! own headers and must keep their field order. `AiProperty` and `AiProgressCallback` are the
//! bridge's own additions to that ABI.

use libc::{c_char, c_float, c_int, c_void, size_t};
use std::ffi::CStr;
use std::fmt;
use std::slice;
use std::str;

// AiFile callbacks
pub type AiFileWriteProc =
    Option<unsafe extern "C" fn(*mut AiFile, *const c_char, size_t, size_t) -> size_t>;
pub type AiFileReadProc =
    Option<unsafe extern "C" fn(*mut AiFile, *mut c_char, size_t, size_t) -> size_t>;
pub type AiFileTellProc = Option<unsafe extern "C" fn(*mut AiFile) -> size_t>;
pub type AiFileFlushProc = Option<unsafe extern "C" fn(*mut AiFile)>;
// origin and result are raw `aiOrigin`/`aiReturn` values; see `AiOrigin::from_raw`
pub type AiFileSeek = Option<unsafe extern "C" fn(*mut AiFile, size_t, c_int) -> c_int>;

// AiFileIO callbacks
pub type AiFileOpenProc =
    Option<unsafe extern "C" fn(*mut AiFileIO, *const c_char, *const c_char) -> *mut AiFile>;
pub type AiFileCloseProc = Option<unsafe extern "C" fn(*mut AiFileIO, *mut AiFile)>;

// User defined data
pub type AiUserData = *mut c_char;

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct AiFileIO {
    pub open_proc: AiFileOpenProc,
    pub close_proc: AiFileCloseProc,
    pub user_data: AiUserData,
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct AiFile {
    pub read_proc: AiFileReadProc,
    pub write_proc: AiFileWriteProc,
    pub tell_proc: AiFileTellProc,
    pub file_size_proc: AiFileTellProc,
    pub seek_proc: AiFileSeek,
    pub flush_proc: AiFileFlushProc,
    pub user_data: AiUserData,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AiReturn {
    Success = 0,
    Failure = -1,
    OutOfMemory = -3,
}

impl AiReturn {
    /// Any code other than success or out-of-memory is a failure.
    pub fn from_raw(code: c_int) -> AiReturn {
        match code {
            0 => AiReturn::Success,
            -3 => AiReturn::OutOfMemory,
            _ => AiReturn::Failure,
        }
    }

    pub fn to_raw(self) -> c_int {
        self as c_int
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AiOrigin {
    Set = 0,
    Cur = 1,
    End = 2,
}

impl AiOrigin {
    pub fn from_raw(origin: c_int) -> Option<AiOrigin> {
        match origin {
            0 => Some(AiOrigin::Set),
            1 => Some(AiOrigin::Cur),
            2 => Some(AiOrigin::End),
            _ => None,
        }
    }

    pub fn to_raw(self) -> c_int {
        self as c_int
    }
}

/// Row-major 4x4 matrix, laid out like the engine's `aiMatrix4x4`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AiMatrix4x4 {
    pub a1: c_float,
    pub a2: c_float,
    pub a3: c_float,
    pub a4: c_float,
    pub b1: c_float,
    pub b2: c_float,
    pub b3: c_float,
    pub b4: c_float,
    pub c1: c_float,
    pub c2: c_float,
    pub c3: c_float,
    pub c4: c_float,
    pub d1: c_float,
    pub d2: c_float,
    pub d3: c_float,
    pub d4: c_float,
}

impl AiMatrix4x4 {
    pub fn identity() -> AiMatrix4x4 {
        AiMatrix4x4::from_rows([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    pub fn from_rows(m: [[f32; 4]; 4]) -> AiMatrix4x4 {
        AiMatrix4x4 {
            a1: m[0][0], a2: m[0][1], a3: m[0][2], a4: m[0][3],
            b1: m[1][0], b2: m[1][1], b3: m[1][2], b4: m[1][3],
            c1: m[2][0], c2: m[2][1], c3: m[2][2], c4: m[2][3],
            d1: m[3][0], d2: m[3][1], d3: m[3][2], d4: m[3][3],
        }
    }

    pub fn to_rows(&self) -> [[f32; 4]; 4] {
        [
            [self.a1, self.a2, self.a3, self.a4],
            [self.b1, self.b2, self.b3, self.b4],
            [self.c1, self.c2, self.c3, self.c4],
            [self.d1, self.d2, self.d3, self.d4],
        ]
    }
}

pub const MAXLEN: usize = 1024;

/// The engine's fixed-capacity string (5.x layout: 32-bit length).
#[repr(C)]
#[derive(Copy)]
pub struct AiString {
    pub length: u32,
    pub data: [c_char; MAXLEN],
}

impl Default for AiString {
    fn default() -> AiString {
        AiString {
            length: 0,
            data: [0; MAXLEN],
        }
    }
}

impl Clone for AiString {
    fn clone(&self) -> AiString {
        *self
    }
}

impl AiString {
    /// Copies `s`, truncating to `MAXLEN - 1` bytes.
    pub fn from_c_str(s: &CStr) -> AiString {
        let bytes = s.to_bytes();
        let len = bytes.len().min(MAXLEN - 1);
        let mut aistr = AiString::default();
        for i in 0..len {
            aistr.data[i] = bytes[i] as c_char;
        }
        aistr.length = len as u32;
        aistr
    }

    pub fn as_bytes(&self) -> &[u8] {
        let len = (self.length as usize).min(MAXLEN);
        unsafe { slice::from_raw_parts(self.data.as_ptr() as *const u8, len) }
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }
}

impl fmt::Debug for AiString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match str::from_utf8(self.as_bytes()) {
            Ok(s) => write!(f, "{:?}", s),
            Err(_) => write!(f, "{:?}", self.as_bytes()),
        }
    }
}

/// Opaque engine scene. Only ever handled by pointer or reference.
#[repr(C)]
pub struct AiScene {
    _private: [u8; 0],
}

/// One link of the engine's export blob chain.
#[repr(C)]
pub struct AiExportDataBlob {
    pub size: size_t,
    pub data: *mut c_void,
    pub name: AiString,
    pub next: *mut AiExportDataBlob,
}

impl AiExportDataBlob {
    pub fn data(&self) -> &[u8] {
        if self.data.is_null() || self.size == 0 {
            &[]
        } else {
            unsafe { slice::from_raw_parts(self.data as *const u8, self.size) }
        }
    }

    pub fn name(&self) -> String {
        self.name.to_string_lossy()
    }

    pub fn next(&self) -> Option<&AiExportDataBlob> {
        unsafe { self.next.as_ref() }
    }
}

/// Raw values of `AiProperty::kind`.
pub const AI_PROPERTY_KIND_INTEGER: c_int = 0;
pub const AI_PROPERTY_KIND_FLOAT: c_int = 1;
pub const AI_PROPERTY_KIND_STRING: c_int = 2;
pub const AI_PROPERTY_KIND_MATRIX4X4: c_int = 3;
pub const AI_PROPERTY_KIND_BOOLEAN: c_int = 4;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AiPropertyKind {
    Integer,
    Float,
    String,
    Matrix4x4,
    Boolean,
}

impl AiPropertyKind {
    /// `None` for tags this bridge does not know about.
    pub fn from_raw(kind: c_int) -> Option<AiPropertyKind> {
        match kind {
            AI_PROPERTY_KIND_INTEGER => Some(AiPropertyKind::Integer),
            AI_PROPERTY_KIND_FLOAT => Some(AiPropertyKind::Float),
            AI_PROPERTY_KIND_STRING => Some(AiPropertyKind::String),
            AI_PROPERTY_KIND_MATRIX4X4 => Some(AiPropertyKind::Matrix4x4),
            AI_PROPERTY_KIND_BOOLEAN => Some(AiPropertyKind::Boolean),
            _ => None,
        }
    }

    pub fn to_raw(self) -> c_int {
        match self {
            AiPropertyKind::Integer => AI_PROPERTY_KIND_INTEGER,
            AiPropertyKind::Float => AI_PROPERTY_KIND_FLOAT,
            AiPropertyKind::String => AI_PROPERTY_KIND_STRING,
            AiPropertyKind::Matrix4x4 => AI_PROPERTY_KIND_MATRIX4X4,
            AiPropertyKind::Boolean => AI_PROPERTY_KIND_BOOLEAN,
        }
    }
}

/// Property descriptor passed by the caller. Every pointer is borrowed for one bridge call.
///
/// The kind is kept as a raw integer so that unknown tags coming from C can be skipped
/// instead of being undefined behaviour.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct AiProperty {
    pub name: *const c_char,
    pub kind: c_int,
    /// Also carries booleans (0/1).
    pub int_value: c_int,
    pub float_value: c_float,
    pub string_value: *const c_char,
    /// Points to an `AiMatrix4x4`.
    pub matrix_value: *mut c_void,
}

impl Default for AiProperty {
    fn default() -> AiProperty {
        AiProperty {
            name: ::std::ptr::null(),
            kind: AI_PROPERTY_KIND_INTEGER,
            int_value: 0,
            float_value: 0.0,
            string_value: ::std::ptr::null(),
            matrix_value: ::std::ptr::null_mut(),
        }
    }
}

/// Progress callback. Return false to ask the engine to cancel.
pub type AiProgressCallback =
    Option<unsafe extern "C" fn(percentage: c_float, message: *const c_char, user: *mut c_void) -> bool>;

#[cfg(test)]
use std::ffi::CString;
#[cfg(test)]
use std::mem;

#[test]
fn property_kind_tags_roundtrip_and_reject_unknown() {
    for kind in &[
        AiPropertyKind::Integer,
        AiPropertyKind::Float,
        AiPropertyKind::String,
        AiPropertyKind::Matrix4x4,
        AiPropertyKind::Boolean,
    ] {
        assert_eq!(AiPropertyKind::from_raw(kind.to_raw()), Some(*kind));
    }
    assert_eq!(AiPropertyKind::from_raw(5), None);
    assert_eq!(AiPropertyKind::from_raw(-1), None);
}

#[test]
fn raw_seek_codes_are_mapped_not_transmuted() {
    assert_eq!(AiReturn::from_raw(0), AiReturn::Success);
    assert_eq!(AiReturn::from_raw(-3), AiReturn::OutOfMemory);
    assert_eq!(AiReturn::from_raw(-1), AiReturn::Failure);
    assert_eq!(AiReturn::from_raw(42), AiReturn::Failure);
    assert_eq!(AiReturn::OutOfMemory.to_raw(), -3);

    assert_eq!(AiOrigin::from_raw(2), Some(AiOrigin::End));
    assert_eq!(AiOrigin::from_raw(3), None);
    assert_eq!(AiOrigin::from_raw(-1), None);
    assert_eq!(AiOrigin::Cur.to_raw(), 1);
}

#[test]
fn file_tables_keep_engine_layout() {
    let ptr = mem::size_of::<usize>();
    assert_eq!(mem::size_of::<AiFileIO>(), 3 * ptr);
    assert_eq!(mem::size_of::<AiFile>(), 7 * ptr);
    assert_eq!(mem::size_of::<AiMatrix4x4>(), 16 * 4);
    assert_eq!(mem::size_of::<AiString>(), 4 + MAXLEN);
}

#[test]
fn aistring_truncates_long_input() {
    let long = CString::new(vec![b'x'; MAXLEN + 10]).unwrap();
    let s = AiString::from_c_str(&long);
    assert_eq!(s.length as usize, MAXLEN - 1);

    let short = CString::new("texture.png").unwrap();
    assert_eq!(AiString::from_c_str(&short).to_string_lossy(), "texture.png");
}

//! The exported C entry points.
//!
//! Each one clears the calling thread's error slot, runs the bridge against the native engine
//! and reports failures through `aiGetLastErrorStringRust`. Panics never cross this boundary.

use assimp::AssimpEngine;
use bridge::{Bridge, ExportOptions, ImportOptions};
use error::{self, BridgeError};
use ffi::{AiExportDataBlob, AiFileIO, AiProgressCallback, AiProperty, AiReturn, AiScene};
use libc::{c_char, c_uint, c_void, size_t};
use postprocess::PostProcessSteps;
use properties::descriptors_from_raw;
use std::ffi::CStr;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::slice;

fn guarded<R, F: FnOnce() -> R>(fallback: R, f: F) -> R {
    error::clear_error();
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(r) => r,
        Err(_) => {
            error!("panic caught at the C boundary");
            error::record(&BridgeError::Panic);
            fallback
        }
    }
}

unsafe fn opt_cstr<'a>(s: *const c_char) -> Option<&'a CStr> {
    if s.is_null() {
        None
    } else {
        Some(CStr::from_ptr(s))
    }
}

fn bridge() -> Bridge<AssimpEngine> {
    Bridge::new(AssimpEngine)
}

/// Imports a file, optionally through a custom file table, with properties and progress.
///
/// Free the result with `aiFreeScene`. Null on failure.
#[no_mangle]
pub unsafe extern "C" fn aiImportFileExWithProgressRust(
    path: *const c_char,
    flags: c_uint,
    file_io: *const AiFileIO,
    props: *const AiProperty,
    props_count: size_t,
    progress_cb: AiProgressCallback,
    progress_user: *mut c_void,
) -> *const AiScene {
    guarded(ptr::null(), || {
        let options = ImportOptions {
            flags: PostProcessSteps::from_bits_truncate(flags),
            file_io: file_io.as_ref(),
            properties: descriptors_from_raw(props, props_count),
            progress: progress_cb,
            user_data: progress_user,
        };
        bridge()
            .import_file(opt_cstr(path), &options)
            .map(|scene| scene.into_raw())
            .unwrap_or(ptr::null())
    })
}

/// Imports from a memory buffer. `hint` may be null.
///
/// Free the result with `aiFreeScene`. Null on failure.
#[no_mangle]
pub unsafe extern "C" fn aiImportFileFromMemoryWithProgressRust(
    data: *const c_char,
    length: c_uint,
    flags: c_uint,
    hint: *const c_char,
    props: *const AiProperty,
    props_count: size_t,
    progress_cb: AiProgressCallback,
    progress_user: *mut c_void,
) -> *const AiScene {
    guarded(ptr::null(), || {
        let buffer: &[u8] = if data.is_null() || length == 0 {
            &[]
        } else {
            slice::from_raw_parts(data as *const u8, length as usize)
        };
        let options = ImportOptions {
            flags: PostProcessSteps::from_bits_truncate(flags),
            file_io: None,
            properties: descriptors_from_raw(props, props_count),
            progress: progress_cb,
            user_data: progress_user,
        };
        bridge()
            .import_from_memory(buffer, opt_cstr(hint), &options)
            .map(|scene| scene.into_raw())
            .unwrap_or(ptr::null())
    })
}

/// Exports `scene` to `path`, optionally through a custom file table.
#[no_mangle]
pub unsafe extern "C" fn aiExportSceneExWithPropertiesRust(
    scene: *const AiScene,
    format_id: *const c_char,
    path: *const c_char,
    file_io: *const AiFileIO,
    preprocessing: c_uint,
    props: *const AiProperty,
    props_count: size_t,
) -> AiReturn {
    guarded(AiReturn::Failure, || {
        let options = ExportOptions {
            preprocessing: PostProcessSteps::from_bits_truncate(preprocessing),
            file_io: file_io.as_ref(),
            properties: descriptors_from_raw(props, props_count),
        };
        if bridge().export_to_file(scene.as_ref(), opt_cstr(format_id), opt_cstr(path), &options) {
            AiReturn::Success
        } else {
            AiReturn::Failure
        }
    })
}

/// Exports `scene` into a blob chain. Free it with `aiReleaseExportBlob`. Null on failure.
#[no_mangle]
pub unsafe extern "C" fn aiExportSceneToBlobWithPropertiesRust(
    scene: *const AiScene,
    format_id: *const c_char,
    preprocessing: c_uint,
    props: *const AiProperty,
    props_count: size_t,
) -> *const AiExportDataBlob {
    guarded(ptr::null(), || {
        let options = ExportOptions {
            preprocessing: PostProcessSteps::from_bits_truncate(preprocessing),
            file_io: None,
            properties: descriptors_from_raw(props, props_count),
        };
        bridge()
            .export_to_blob(scene.as_ref(), opt_cstr(format_id), &options)
            .map(|blob| blob.into_raw())
            .unwrap_or(ptr::null())
    })
}

/// Last error of the calling thread, or null if its last bridge call succeeded.
///
/// The pointer stays valid until the next bridge call on the same thread.
#[no_mangle]
pub extern "C" fn aiGetLastErrorStringRust() -> *const c_char {
    error::last_error_ptr()
}

#[cfg(test)]
use assimp::sys::aiFreeScene;
#[cfg(all(test, feature = "export"))]
use assimp::sys::aiReleaseExportBlob;
#[cfg(test)]
use libc::c_float;

#[cfg(test)]
const TRIANGLE: &[u8] = b"v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

#[cfg(test)]
unsafe fn import_obj(data: &[u8], progress_cb: AiProgressCallback, progress_user: *mut c_void) -> *const AiScene {
    let hint = b"obj\0";
    aiImportFileFromMemoryWithProgressRust(
        data.as_ptr() as *const c_char,
        data.len() as c_uint,
        PostProcessSteps::TRIANGULATE.bits(),
        hint.as_ptr() as *const c_char,
        ptr::null(),
        0,
        progress_cb,
        progress_user,
    )
}

#[cfg(test)]
unsafe extern "C" fn collect_messages(_: c_float, message: *const c_char, user: *mut c_void) -> bool {
    let messages = &mut *(user as *mut Vec<String>);
    if !message.is_null() {
        messages.push(CStr::from_ptr(message).to_string_lossy().into_owned());
    }
    true
}

#[cfg(test)]
fn last() -> Option<String> {
    let msg = aiGetLastErrorStringRust();
    if msg.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned())
    }
}

#[test]
fn null_path_is_reported_without_importing() {
    let scene = unsafe {
        aiImportFileExWithProgressRust(ptr::null(), 0, ptr::null(), ptr::null(), 0, None, ptr::null_mut())
    };
    assert!(scene.is_null());
    assert_eq!(last(), Some("Path is null".to_owned()));
}

#[test]
fn empty_memory_buffer_is_reported() {
    let data = b"solid";
    let scene = unsafe {
        aiImportFileFromMemoryWithProgressRust(
            data.as_ptr() as *const c_char,
            0,
            0,
            ptr::null(),
            ptr::null(),
            0,
            None,
            ptr::null_mut(),
        )
    };
    assert!(scene.is_null());
    assert_eq!(last(), Some("Memory buffer is empty".to_owned()));
}

#[test]
fn null_scene_export_fails() {
    let format = b"obj\0";
    let path = b"out.obj\0";
    let ret = unsafe {
        aiExportSceneExWithPropertiesRust(
            ptr::null(),
            format.as_ptr() as *const c_char,
            path.as_ptr() as *const c_char,
            ptr::null(),
            0,
            ptr::null(),
            0,
        )
    };
    assert_eq!(ret, AiReturn::Failure);
    if cfg!(feature = "export") {
        assert_eq!(last(), Some("Scene is null".to_owned()));
    } else {
        assert_eq!(last(), Some("Export support is disabled in this build".to_owned()));
    }
}

#[test]
fn memory_import_hands_over_an_owned_scene() {
    let mut messages: Vec<String> = Vec::new();
    let scene = unsafe {
        import_obj(TRIANGLE, Some(collect_messages), &mut messages as *mut Vec<String> as *mut c_void)
    };
    assert!(!scene.is_null(), "{:?}", last());
    assert_eq!(last(), None);
    // the engine reported its own read steps through the callback
    assert!(messages.iter().any(|m| m.starts_with("read ")), "{:?}", messages);
    unsafe { aiFreeScene(scene) };
}

#[cfg(feature = "export")]
#[test]
fn blob_export_round_trips_into_a_new_import() {
    let scene = unsafe { import_obj(TRIANGLE, None, ptr::null_mut()) };
    assert!(!scene.is_null(), "{:?}", last());

    let format = b"obj\0";
    let blob = unsafe {
        aiExportSceneToBlobWithPropertiesRust(scene, format.as_ptr() as *const c_char, 0, ptr::null(), 0)
    };
    assert!(!blob.is_null(), "{:?}", last());
    assert_eq!(last(), None);
    // the source scene is independent of the blob
    unsafe { aiFreeScene(scene) };

    let data = unsafe { (*blob).data().to_vec() };
    assert!(!data.is_empty());
    unsafe { aiReleaseExportBlob(blob) };

    let again = unsafe { import_obj(&data, None, ptr::null_mut()) };
    assert!(!again.is_null(), "{:?}", last());
    unsafe { aiFreeScene(again) };
}

#[cfg(feature = "export")]
#[test]
fn unknown_export_format_reports_the_engine_message() {
    let scene = unsafe { import_obj(TRIANGLE, None, ptr::null_mut()) };
    assert!(!scene.is_null());
    let format = b"no-such-format\0";
    let blob = unsafe {
        aiExportSceneToBlobWithPropertiesRust(scene, format.as_ptr() as *const c_char, 0, ptr::null(), 0)
    };
    assert!(blob.is_null());
    let msg = last().unwrap();
    assert_ne!(msg, "Export failed");
    assert!(msg.contains("no-such-format"), "{:?}", msg);
    unsafe { aiFreeScene(scene) };
}

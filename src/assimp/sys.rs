//! The native calls the backend makes: the C++ object shim (`shim.cpp`) and the slice of the
//! engine's C API that has no per-object state.

use ffi::{AiExportDataBlob, AiFileIO, AiMatrix4x4, AiScene};
use libc::{c_char, c_float, c_int, c_uint, c_void, size_t};

/// Opaque `Assimp::Importer` owned by the shim.
#[repr(C)]
pub struct BridgeImporter {
    _private: [u8; 0],
}

/// Opaque `Assimp::Exporter` plus its `ExportProperties`.
#[repr(C)]
pub struct BridgeExporter {
    _private: [u8; 0],
}

/// Progress callbacks handed to the shim's forwarding handler.
#[repr(C)]
pub struct BridgeProgress {
    pub user: *mut c_void,
    pub update: Option<unsafe extern "C" fn(*mut c_void, c_float) -> bool>,
    pub file_read: Option<unsafe extern "C" fn(*mut c_void, c_int, c_int)>,
    pub post_process: Option<unsafe extern "C" fn(*mut c_void, c_int, c_int)>,
    pub file_write: Option<unsafe extern "C" fn(*mut c_void, c_int, c_int)>,
}

#[repr(C)]
pub struct AiExportFormatDesc {
    pub id: *const c_char,
    pub description: *const c_char,
    pub file_extension: *const c_char,
}

pub type AiLogStreamCallback = Option<unsafe extern "C" fn(*const c_char, *mut c_char)>;

#[repr(C)]
pub struct AiLogStream {
    pub callback: AiLogStreamCallback,
    pub user: *mut c_char,
}

// raw `aiReturn`; mapped with `AiReturn::from_raw`
pub type AiReturnCode = c_int;

extern "C" {
    pub fn bridge_importer_new() -> *mut BridgeImporter;

    pub fn bridge_importer_delete(
        importer: *mut BridgeImporter);

    pub fn bridge_importer_set_integer(
        importer: *mut BridgeImporter,
        name: *const c_char,
        value: c_int);

    pub fn bridge_importer_set_bool(
        importer: *mut BridgeImporter,
        name: *const c_char,
        value: bool);

    pub fn bridge_importer_set_float(
        importer: *mut BridgeImporter,
        name: *const c_char,
        value: c_float);

    pub fn bridge_importer_set_string(
        importer: *mut BridgeImporter,
        name: *const c_char,
        value: *const c_char);

    pub fn bridge_importer_set_matrix(
        importer: *mut BridgeImporter,
        name: *const c_char,
        value: *const AiMatrix4x4);

    pub fn bridge_importer_set_io(
        importer: *mut BridgeImporter,
        table: *mut AiFileIO);

    pub fn bridge_importer_set_progress(
        importer: *mut BridgeImporter,
        progress: *const BridgeProgress);

    pub fn bridge_importer_read_file(
        importer: *mut BridgeImporter,
        path: *const c_char,
        flags: c_uint) -> *const AiScene;

    pub fn bridge_importer_read_memory(
        importer: *mut BridgeImporter,
        buffer: *const c_void,
        length: size_t,
        flags: c_uint,
        hint: *const c_char) -> *const AiScene;

    pub fn bridge_importer_error(
        importer: *const BridgeImporter) -> *const c_char;

    pub fn bridge_exporter_new() -> *mut BridgeExporter;

    pub fn bridge_exporter_delete(
        exporter: *mut BridgeExporter);

    pub fn bridge_exporter_set_integer(
        exporter: *mut BridgeExporter,
        name: *const c_char,
        value: c_int);

    pub fn bridge_exporter_set_bool(
        exporter: *mut BridgeExporter,
        name: *const c_char,
        value: bool);

    pub fn bridge_exporter_set_float(
        exporter: *mut BridgeExporter,
        name: *const c_char,
        value: c_float);

    pub fn bridge_exporter_set_string(
        exporter: *mut BridgeExporter,
        name: *const c_char,
        value: *const c_char);

    pub fn bridge_exporter_set_matrix(
        exporter: *mut BridgeExporter,
        name: *const c_char,
        value: *const AiMatrix4x4);

    pub fn bridge_exporter_set_io(
        exporter: *mut BridgeExporter,
        table: *mut AiFileIO);

    pub fn bridge_exporter_export(
        exporter: *mut BridgeExporter,
        scene: *const AiScene,
        format_id: *const c_char,
        path: *const c_char,
        preprocessing: c_uint) -> AiReturnCode;

    pub fn bridge_exporter_export_to_blob(
        exporter: *mut BridgeExporter,
        scene: *const AiScene,
        format_id: *const c_char,
        preprocessing: c_uint) -> *const AiExportDataBlob;

    pub fn bridge_exporter_orphaned_blob(
        exporter: *mut BridgeExporter) -> *const AiExportDataBlob;

    pub fn bridge_exporter_has_property(
        exporter: *const BridgeExporter,
        name: *const c_char) -> bool;

    pub fn bridge_exporter_error(
        exporter: *const BridgeExporter) -> *const c_char;
}

extern "C" {
    pub fn aiCopyScene(
        input: *const AiScene,
        output: *mut *mut AiScene);

    pub fn aiFreeScene(
        input: *const AiScene);

    pub fn aiReleaseExportBlob(
        data: *const AiExportDataBlob);

    pub fn aiGetExportFormatCount() -> size_t;

    pub fn aiGetExportFormatDescription(
        index: size_t) -> *const AiExportFormatDesc;

    pub fn aiReleaseExportFormatDescription(
        desc: *const AiExportFormatDesc);

    pub fn aiAttachLogStream(
        stream: *const AiLogStream);

    pub fn aiDetachLogStream(
        stream: *const AiLogStream) -> AiReturnCode;

    pub fn aiEnableVerboseLogging(
        enable: c_int);
}

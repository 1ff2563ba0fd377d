//! Native backend: one engine importer or exporter object per bridge call, reached through the
//! C++ shim. Only the scene copy, blob release, format registry and log streams go through the
//! engine's plain C API.

pub mod sys;
mod fileio;

use self::fileio::{contain, IoBridge};
use self::sys::*;
use engine::{Engine, ExportFormat, Exporter, Importer, IoSystem, ProgressHandler, PropertySink};
use ffi::{AiExportDataBlob, AiMatrix4x4, AiReturn, AiScene};
use libc::{c_char, c_float, c_int, c_void};
use logging;
use postprocess::PostProcessSteps;
use std::ffi::CStr;
use std::mem;
use std::ops::Deref;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};

const CANCELLED: &str = "Import cancelled by progress handler";

unsafe fn copy_c_str(s: *const c_char) -> String {
    if s.is_null() {
        String::new()
    } else {
        CStr::from_ptr(s).to_string_lossy().into_owned()
    }
}

//--------------------------------------------------------------------------------------------------
// Owned handles

/// A scene owned by the caller, freed with `aiFreeScene`.
pub struct SceneHandle(*mut AiScene);

impl SceneHandle {
    /// Takes ownership of a scene produced by `aiCopyScene`.
    pub unsafe fn from_raw(scene: *mut AiScene) -> Option<SceneHandle> {
        if scene.is_null() {
            None
        } else {
            Some(SceneHandle(scene))
        }
    }

    /// Gives up ownership; release the pointer with `aiFreeScene`.
    pub fn into_raw(self) -> *const AiScene {
        let raw = self.0;
        mem::forget(self);
        raw
    }
}

impl Deref for SceneHandle {
    type Target = AiScene;
    fn deref(&self) -> &AiScene {
        unsafe { &*self.0 }
    }
}

impl Drop for SceneHandle {
    fn drop(&mut self) {
        unsafe { aiFreeScene(self.0) }
    }
}

/// A blob chain owned by the caller, freed with `aiReleaseExportBlob`.
pub struct ExportBlob(*const AiExportDataBlob);

impl ExportBlob {
    /// Takes ownership of an orphaned blob chain.
    pub unsafe fn from_raw(blob: *const AiExportDataBlob) -> Option<ExportBlob> {
        if blob.is_null() {
            None
        } else {
            Some(ExportBlob(blob))
        }
    }

    /// Gives up ownership; release the pointer with `aiReleaseExportBlob`.
    pub fn into_raw(self) -> *const AiExportDataBlob {
        let raw = self.0;
        mem::forget(self);
        raw
    }
}

impl Deref for ExportBlob {
    type Target = AiExportDataBlob;
    fn deref(&self) -> &AiExportDataBlob {
        unsafe { &*self.0 }
    }
}

impl Drop for ExportBlob {
    fn drop(&mut self) {
        unsafe { aiReleaseExportBlob(self.0) }
    }
}

//--------------------------------------------------------------------------------------------------
// Progress

/// What the engine's progress handler calls back into. Boxed so its address survives moves of
/// the importer.
struct ProgressForward {
    handler: Box<dyn ProgressHandler>,
    cancel_requested: bool,
}

impl ProgressForward {
    fn table(&mut self) -> BridgeProgress {
        BridgeProgress {
            user: self as *mut ProgressForward as *mut c_void,
            update: Some(forward_update),
            file_read: Some(forward_file_read),
            post_process: Some(forward_post_process),
            file_write: Some(forward_file_write),
        }
    }
}

unsafe fn forward<'a>(user: *mut c_void) -> Option<&'a mut ProgressForward> {
    (user as *mut ProgressForward).as_mut()
}

// a panicking handler counts as a cancel request
unsafe extern "C" fn forward_update(user: *mut c_void, percentage: c_float) -> bool {
    let forward = match forward(user) {
        Some(forward) => forward,
        None => return true,
    };
    let keep_going = contain("progress", false, || forward.handler.update(percentage));
    if !keep_going {
        forward.cancel_requested = true;
    }
    keep_going
}

unsafe extern "C" fn forward_file_read(user: *mut c_void, current_step: c_int, number_of_steps: c_int) {
    if let Some(forward) = forward(user) {
        contain("progress", (), || forward.handler.update_file_read(current_step, number_of_steps))
    }
}

unsafe extern "C" fn forward_post_process(user: *mut c_void, current_step: c_int, number_of_steps: c_int) {
    if let Some(forward) = forward(user) {
        contain("progress", (), || forward.handler.update_post_process(current_step, number_of_steps))
    }
}

unsafe extern "C" fn forward_file_write(user: *mut c_void, current_step: c_int, number_of_steps: c_int) {
    if let Some(forward) = forward(user) {
        contain("progress", (), || forward.handler.update_file_write(current_step, number_of_steps))
    }
}

//--------------------------------------------------------------------------------------------------
// Importer

/// An `Assimp::Importer`. Its error string, properties and handlers belong to this object
/// alone.
pub struct AssimpImporter {
    raw: *mut BridgeImporter,
    // both outlive `raw`, which is deleted first
    io: Option<Box<IoBridge>>,
    progress: Option<Box<ProgressForward>>,
    error: String,
}

impl AssimpImporter {
    fn new() -> AssimpImporter {
        AssimpImporter {
            raw: unsafe { bridge_importer_new() },
            io: None,
            progress: None,
            error: String::new(),
        }
    }

    fn before_read(&mut self) {
        self.error.clear();
        if let Some(ref mut progress) = self.progress {
            progress.cancel_requested = false;
        }
    }

    fn after_read(&mut self, scene: *const AiScene) -> Option<&AiScene> {
        if scene.is_null() {
            self.error = unsafe { copy_c_str(bridge_importer_error(self.raw)) };
            let cancelled = self.progress.as_ref().map_or(false, |p| p.cancel_requested);
            if self.error.is_empty() && cancelled {
                self.error = CANCELLED.to_owned();
            }
            return None;
        }
        unsafe { scene.as_ref() }
    }
}

impl Drop for AssimpImporter {
    fn drop(&mut self) {
        // deletes the scene and the engine-side handlers
        unsafe { bridge_importer_delete(self.raw) }
    }
}

impl PropertySink for AssimpImporter {
    fn set_property_integer(&mut self, name: &CStr, value: i32) {
        unsafe { bridge_importer_set_integer(self.raw, name.as_ptr(), value) }
    }

    fn set_property_bool(&mut self, name: &CStr, value: bool) {
        unsafe { bridge_importer_set_bool(self.raw, name.as_ptr(), value) }
    }

    fn set_property_float(&mut self, name: &CStr, value: f32) {
        unsafe { bridge_importer_set_float(self.raw, name.as_ptr(), value) }
    }

    fn set_property_string(&mut self, name: &CStr, value: &CStr) {
        unsafe { bridge_importer_set_string(self.raw, name.as_ptr(), value.as_ptr()) }
    }

    fn set_property_matrix(&mut self, name: &CStr, value: &AiMatrix4x4) {
        unsafe { bridge_importer_set_matrix(self.raw, name.as_ptr(), value) }
    }
}

impl Importer for AssimpImporter {
    type Scene = AiScene;

    fn set_io_handler(&mut self, io: Box<dyn IoSystem>) {
        let mut io = IoBridge::new(io);
        unsafe { bridge_importer_set_io(self.raw, io.table()) };
        self.io = Some(io);
    }

    fn set_progress_handler(&mut self, handler: Box<dyn ProgressHandler>) {
        let mut forward = Box::new(ProgressForward {
            handler,
            cancel_requested: false,
        });
        let table = forward.table();
        // the engine drops its previous handler here, before the old forward goes away
        unsafe { bridge_importer_set_progress(self.raw, &table) };
        self.progress = Some(forward);
    }

    fn read_file(&mut self, path: &CStr, flags: PostProcessSteps) -> Option<&AiScene> {
        self.before_read();
        let scene = unsafe { bridge_importer_read_file(self.raw, path.as_ptr(), flags.bits()) };
        self.after_read(scene)
    }

    fn read_file_from_memory(&mut self, buffer: &[u8], flags: PostProcessSteps, hint: &CStr) -> Option<&AiScene> {
        self.before_read();
        // the engine reads from memory through its own file system
        let scene = unsafe {
            bridge_importer_read_memory(
                self.raw,
                buffer.as_ptr() as *const c_void,
                buffer.len(),
                flags.bits(),
                hint.as_ptr(),
            )
        };
        self.after_read(scene)
    }

    fn error_string(&self) -> String {
        self.error.clone()
    }
}

//--------------------------------------------------------------------------------------------------
// Exporter

/// An `Assimp::Exporter` with its own `ExportProperties`.
pub struct AssimpExporter {
    raw: *mut BridgeExporter,
    io: Option<Box<IoBridge>>,
    error: String,
}

impl AssimpExporter {
    fn new() -> AssimpExporter {
        AssimpExporter {
            raw: unsafe { bridge_exporter_new() },
            io: None,
            error: String::new(),
        }
    }

    /// True if any property of that name was set on this exporter.
    pub fn has_property(&self, name: &CStr) -> bool {
        unsafe { bridge_exporter_has_property(self.raw, name.as_ptr()) }
    }

    fn engine_error(&self) -> String {
        unsafe { copy_c_str(bridge_exporter_error(self.raw)) }
    }
}

impl Drop for AssimpExporter {
    fn drop(&mut self) {
        // also frees a blob nobody orphaned
        unsafe { bridge_exporter_delete(self.raw) }
    }
}

impl PropertySink for AssimpExporter {
    fn set_property_integer(&mut self, name: &CStr, value: i32) {
        unsafe { bridge_exporter_set_integer(self.raw, name.as_ptr(), value) }
    }

    fn set_property_bool(&mut self, name: &CStr, value: bool) {
        unsafe { bridge_exporter_set_bool(self.raw, name.as_ptr(), value) }
    }

    fn set_property_float(&mut self, name: &CStr, value: f32) {
        unsafe { bridge_exporter_set_float(self.raw, name.as_ptr(), value) }
    }

    fn set_property_string(&mut self, name: &CStr, value: &CStr) {
        unsafe { bridge_exporter_set_string(self.raw, name.as_ptr(), value.as_ptr()) }
    }

    fn set_property_matrix(&mut self, name: &CStr, value: &AiMatrix4x4) {
        unsafe { bridge_exporter_set_matrix(self.raw, name.as_ptr(), value) }
    }
}

impl Exporter for AssimpExporter {
    type Scene = AiScene;
    type Blob = ExportBlob;

    fn set_io_handler(&mut self, io: Box<dyn IoSystem>) {
        let mut io = IoBridge::new(io);
        unsafe { bridge_exporter_set_io(self.raw, io.table()) };
        self.io = Some(io);
    }

    fn export(
        &mut self,
        scene: &AiScene,
        format_id: &CStr,
        path: &CStr,
        preprocessing: PostProcessSteps,
    ) -> AiReturn {
        let code = unsafe {
            bridge_exporter_export(self.raw, scene, format_id.as_ptr(), path.as_ptr(), preprocessing.bits())
        };
        let ret = AiReturn::from_raw(code);
        self.error = if ret == AiReturn::Success { String::new() } else { self.engine_error() };
        ret
    }

    fn export_to_blob(&mut self, scene: &AiScene, format_id: &CStr, preprocessing: PostProcessSteps) -> bool {
        let blob = unsafe {
            bridge_exporter_export_to_blob(self.raw, scene, format_id.as_ptr(), preprocessing.bits())
        };
        self.error = if blob.is_null() { self.engine_error() } else { String::new() };
        !blob.is_null()
    }

    fn get_orphaned_blob(&mut self) -> Option<ExportBlob> {
        unsafe { ExportBlob::from_raw(bridge_exporter_orphaned_blob(self.raw)) }
    }

    fn error_string(&self) -> String {
        self.error.clone()
    }
}

//--------------------------------------------------------------------------------------------------
// Engine

// the engine's logger is process-wide
static LOG_ATTACHED: AtomicBool = AtomicBool::new(false);

unsafe extern "C" fn engine_log(message: *const c_char, _user: *mut c_char) {
    if message.is_null() {
        return;
    }
    let line = CStr::from_ptr(message).to_string_lossy();
    contain("log", (), || logging::forward_engine_line(&line))
}

// detaching matches on callback and user pointer
fn log_stream() -> AiLogStream {
    AiLogStream {
        callback: Some(engine_log),
        user: ptr::null_mut(),
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct AssimpEngine;

impl Engine for AssimpEngine {
    type Scene = SceneHandle;
    type Importer = AssimpImporter;
    type Exporter = AssimpExporter;

    fn create_importer(&self) -> AssimpImporter {
        AssimpImporter::new()
    }

    fn create_exporter(&self) -> AssimpExporter {
        AssimpExporter::new()
    }

    fn copy_scene(&self, scene: &AiScene) -> Option<SceneHandle> {
        let mut out: *mut AiScene = ptr::null_mut();
        unsafe {
            aiCopyScene(scene, &mut out);
            SceneHandle::from_raw(out)
        }
    }

    fn export_formats(&self) -> Vec<ExportFormat> {
        let count = unsafe { aiGetExportFormatCount() };
        (0..count)
            .filter_map(|index| unsafe {
                let desc = aiGetExportFormatDescription(index);
                let format = desc.as_ref().map(|d| ExportFormat {
                    id: copy_c_str(d.id),
                    description: copy_c_str(d.description),
                    file_extension: copy_c_str(d.file_extension),
                });
                if !desc.is_null() {
                    aiReleaseExportFormatDescription(desc);
                }
                format
            })
            .collect()
    }

    fn attach_log(&self, verbose: bool) -> bool {
        unsafe { aiEnableVerboseLogging(verbose as c_int) };
        if !LOG_ATTACHED.swap(true, Ordering::SeqCst) {
            debug!("attaching engine log stream");
            unsafe { aiAttachLogStream(&log_stream()) };
        }
        true
    }

    fn detach_log(&self) -> bool {
        if !LOG_ATTACHED.swap(false, Ordering::SeqCst) {
            return false;
        }
        let code = unsafe { aiDetachLogStream(&log_stream()) };
        AiReturn::from_raw(code) == AiReturn::Success
    }
}

#[cfg(test)]
use bridge::{Bridge, ImportOptions};
#[cfg(test)]
use error::last_error;
#[cfg(test)]
use properties::{apply_properties, PropertyList, PropertyValue};
#[cfg(test)]
use std::ffi::CString;
#[cfg(test)]
use std::thread;

#[cfg(test)]
const TRIANGLE: &[u8] = b"v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

#[cfg(test)]
fn import_triangle() -> SceneHandle {
    let hint = CString::new("obj").unwrap();
    Bridge::new(AssimpEngine)
        .try_import_from_memory(TRIANGLE, Some(&hint), &ImportOptions::default())
        .unwrap()
}

#[test]
fn null_handles_are_not_owned() {
    assert!(unsafe { SceneHandle::from_raw(ptr::null_mut()) }.is_none());
    assert!(unsafe { ExportBlob::from_raw(ptr::null()) }.is_none());
}

#[test]
fn scene_handle_survives_a_raw_round_trip() {
    let scene = import_triangle();
    let copy = AssimpEngine.copy_scene(&scene).unwrap();
    let raw = scene.into_raw();
    assert!(!raw.is_null());
    // owned again, freed once on drop
    let scene = unsafe { SceneHandle::from_raw(raw as *mut AiScene) }.unwrap();
    drop(scene);
    // the copy does not share the original's storage
    assert!(AssimpEngine.copy_scene(&copy).is_some());
}

#[test]
fn concurrent_failures_keep_their_own_engine_message() {
    let workers: Vec<_> = (0..8)
        .map(|i| {
            thread::spawn(move || {
                let bridge = Bridge::new(AssimpEngine);
                let name = format!("missing_{}.obj", i);
                let path = CString::new(name.clone()).unwrap();
                for _ in 0..20 {
                    assert!(bridge.import_file(Some(&path), &ImportOptions::default()).is_none());
                    let msg = last_error().unwrap();
                    assert!(msg.contains(&name), "worker {} saw {:?}", i, msg);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
}

#[cfg(test)]
struct Recorder(::std::sync::Arc<::std::sync::Mutex<Vec<String>>>);

#[cfg(test)]
impl ProgressHandler for Recorder {
    fn update(&mut self, percentage: f32) -> bool {
        self.0.lock().unwrap().push(format!("update {}", percentage));
        true
    }
    fn update_file_read(&mut self, current_step: i32, number_of_steps: i32) {
        self.0.lock().unwrap().push(format!("read {}/{}", current_step, number_of_steps));
    }
    fn update_post_process(&mut self, current_step: i32, number_of_steps: i32) {
        self.0.lock().unwrap().push(format!("post {}/{}", current_step, number_of_steps));
    }
}

#[test]
fn engine_drives_the_progress_handler() {
    let events = ::std::sync::Arc::new(::std::sync::Mutex::new(Vec::new()));
    let mut importer = AssimpEngine.create_importer();
    importer.set_progress_handler(Box::new(Recorder(events.clone())));
    let hint = CString::new("obj").unwrap();
    assert!(importer
        .read_file_from_memory(TRIANGLE, PostProcessSteps::TRIANGULATE, &hint)
        .is_some());
    drop(importer);

    let events = events.lock().unwrap();
    assert!(events.iter().any(|e| e.starts_with("read ")), "{:?}", *events);
    assert!(events.iter().any(|e| e.starts_with("post ")), "{:?}", *events);
}

#[test]
fn export_properties_reach_the_engine_exporter() {
    let mut exporter = AssimpEngine.create_exporter();
    let name = CString::new("EXPORT_SCALE").unwrap();
    assert!(!exporter.has_property(&name));

    let mut props = PropertyList::new();
    props.set("EXPORT_SCALE", PropertyValue::Float(2.0)).unwrap();
    apply_properties(&mut exporter, &props.descriptors());
    assert!(exporter.has_property(&name));
}

#[test]
fn exporter_reports_the_engine_message() {
    let scene = import_triangle();
    let mut exporter = AssimpEngine.create_exporter();
    let format = CString::new("no-such-format").unwrap();
    assert!(!exporter.export_to_blob(&scene, &format, PostProcessSteps::empty()));
    assert!(exporter.error_string().contains("no-such-format"), "{:?}", exporter.error_string());
    assert!(exporter.get_orphaned_blob().is_none());
}

#[test]
fn export_formats_come_from_the_engine() {
    let formats = AssimpEngine.export_formats();
    assert!(formats.iter().any(|f| f.id == "obj" && f.file_extension == "obj"), "{:?}", formats);
}

#[test]
fn log_stream_attaches_once() {
    assert!(AssimpEngine.attach_log(false));
    assert!(AssimpEngine.attach_log(false));
    let _ = import_triangle();
    assert!(AssimpEngine.detach_log());
    assert!(!AssimpEngine.detach_log());
}

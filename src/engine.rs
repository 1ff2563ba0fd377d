//! The engine's object model, seen from the bridge.
//!
//! These traits stand for the engine's abstract base types: the importer/exporter objects,
//! their property sinks, the file-system/file-stream pair and the progress handler. The bridge
//! implements the I/O and progress traits with adapters over caller-supplied C tables, and
//! drives whatever implements `Engine`.

use ffi::{AiMatrix4x4, AiOrigin, AiReturn};
use postprocess::PostProcessSteps;
use std::any::Any;
use std::ffi::CStr;

/// Accepts named, typed configuration values before an import or export.
pub trait PropertySink {
    fn set_property_integer(&mut self, name: &CStr, value: i32);
    fn set_property_bool(&mut self, name: &CStr, value: bool);
    fn set_property_float(&mut self, name: &CStr, value: f32);
    fn set_property_string(&mut self, name: &CStr, value: &CStr);
    fn set_property_matrix(&mut self, name: &CStr, value: &AiMatrix4x4);
}

/// An open file, as the engine sees it.
pub trait IoStream: Any {
    /// Reads up to `count` elements of `size` bytes into `buffer`, returns the number of
    /// complete elements read.
    fn read(&mut self, buffer: &mut [u8], size: usize, count: usize) -> usize;
    /// Returns the number of complete elements written.
    fn write(&mut self, buffer: &[u8], size: usize, count: usize) -> usize;
    fn seek(&mut self, offset: usize, origin: AiOrigin) -> AiReturn;
    fn tell(&self) -> usize;
    fn file_size(&self) -> usize;
    fn flush(&mut self);

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// The engine's view of a file system. Streams returned by `open` must be handed back to
/// `close` of the same system.
pub trait IoSystem {
    fn exists(&self, path: &CStr) -> bool;
    fn os_separator(&self) -> char;
    fn open(&mut self, path: &CStr, mode: &CStr) -> Option<Box<dyn IoStream>>;
    fn close(&mut self, stream: Box<dyn IoStream>);
}

/// Progress notifications issued by the engine while it works.
///
/// The phased defaults fold step counters into `update`, the way the engine's base handler
/// does.
pub trait ProgressHandler {
    /// `percentage` is in `[0,1]`, or -1 when indeterminate. Returning false asks the engine to
    /// cancel.
    fn update(&mut self, percentage: f32) -> bool;

    fn update_file_read(&mut self, current_step: i32, number_of_steps: i32) {
        let f = step_fraction(current_step, number_of_steps, 1.0);
        self.update(f * 0.5);
    }

    fn update_post_process(&mut self, current_step: i32, number_of_steps: i32) {
        let f = step_fraction(current_step, number_of_steps, 1.0);
        self.update(f * 0.5 + 0.5);
    }

    fn update_file_write(&mut self, current_step: i32, number_of_steps: i32) {
        let f = step_fraction(current_step, number_of_steps, 1.0);
        self.update(f * 0.5);
    }
}

/// `current / total`, or `if_empty` when there are no steps.
pub fn step_fraction(current_step: i32, number_of_steps: i32, if_empty: f32) -> f32 {
    if number_of_steps == 0 {
        if_empty
    } else {
        current_step as f32 / number_of_steps as f32
    }
}

/// A transient importer. It owns the scene it reads until it is dropped.
pub trait Importer: PropertySink {
    type Scene;

    fn set_io_handler(&mut self, io: Box<dyn IoSystem>);
    fn set_progress_handler(&mut self, handler: Box<dyn ProgressHandler>);

    fn read_file(&mut self, path: &CStr, flags: PostProcessSteps) -> Option<&Self::Scene>;
    fn read_file_from_memory(
        &mut self,
        buffer: &[u8],
        flags: PostProcessSteps,
        hint: &CStr,
    ) -> Option<&Self::Scene>;

    /// Description of the last failure, empty if none.
    fn error_string(&self) -> String;
}

/// A transient exporter with its own property bag.
pub trait Exporter: PropertySink {
    type Scene: ?Sized;
    type Blob;

    fn set_io_handler(&mut self, io: Box<dyn IoSystem>);

    fn export(
        &mut self,
        scene: &Self::Scene,
        format_id: &CStr,
        path: &CStr,
        preprocessing: PostProcessSteps,
    ) -> AiReturn;

    /// Exports into a blob kept by the exporter. Returns false on failure.
    fn export_to_blob(
        &mut self,
        scene: &Self::Scene,
        format_id: &CStr,
        preprocessing: PostProcessSteps,
    ) -> bool;

    /// Releases the exporter's ownership of the last blob.
    fn get_orphaned_blob(&mut self) -> Option<Self::Blob>;

    fn error_string(&self) -> String;
}

/// One output format the engine can export to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExportFormat {
    /// Value to pass as `format_id`.
    pub id: String,
    pub description: String,
    /// Without the leading dot.
    pub file_extension: String,
}

/// Factory for importers and exporters, plus the scene copy utility and the engine-wide log and
/// format registry.
pub trait Engine {
    /// Scene owned by the caller, independent of any importer.
    type Scene;
    type Importer: Importer;
    type Exporter: Exporter;

    fn create_importer(&self) -> Self::Importer;
    fn create_exporter(&self) -> Self::Exporter;

    /// Deep copy of an importer-owned scene. `None` if the copy failed.
    fn copy_scene(&self, scene: &<Self::Importer as Importer>::Scene) -> Option<Self::Scene>;

    fn supports_export(&self) -> bool {
        true
    }

    /// Export formats in the engine's own order.
    fn export_formats(&self) -> Vec<ExportFormat> {
        Vec::new()
    }

    /// Starts forwarding the engine's log lines into the `log` facade. Returns false if the
    /// engine has no log to forward. Attaching twice is harmless.
    fn attach_log(&self, _verbose: bool) -> bool {
        false
    }

    /// Stops forwarding. Returns false if nothing was attached.
    fn detach_log(&self) -> bool {
        false
    }
}

#[cfg(test)]
struct Recorder(Vec<f32>);

#[cfg(test)]
impl ProgressHandler for Recorder {
    fn update(&mut self, percentage: f32) -> bool {
        self.0.push(percentage);
        true
    }
}

#[test]
fn default_phased_updates_fold_into_update() {
    let mut r = Recorder(Vec::new());
    r.update_file_read(1, 2);
    r.update_post_process(1, 4);
    r.update_file_write(2, 2);
    r.update_post_process(0, 0);
    assert_eq!(r.0, vec![0.25, 0.625, 0.5, 1.0]);
}

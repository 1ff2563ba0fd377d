//! Per-call import/export orchestration.
//!
//! Every call builds a fresh importer or exporter, wires the caller's file table, progress
//! callback and properties into it, runs exactly one engine operation and tears everything
//! down again. Nothing survives between calls except the thread's error slot.

use engine::{Engine, ExportFormat, Exporter, Importer};
use error::{self, BridgeError};
use ffi::{AiFileIO, AiProgressCallback, AiProperty, AiReturn};
use io::FileIoSystem;
use libc::c_void;
use postprocess::PostProcessSteps;
use progress::CallbackProgressHandler;
use properties::apply_properties;
use std::ffi::CStr;
use std::ptr;

/// Scene type accepted by an engine's exporter.
pub type ExportSceneOf<E> = <<E as Engine>::Exporter as Exporter>::Scene;
/// Blob type produced by an engine's exporter.
pub type BlobOf<E> = <<E as Engine>::Exporter as Exporter>::Blob;

/// Options for one import call. Everything is borrowed for the duration of the call.
#[derive(Copy, Clone, Debug)]
pub struct ImportOptions<'a> {
    pub flags: PostProcessSteps,
    /// Custom file table. Ignored when importing from memory.
    pub file_io: Option<&'a AiFileIO>,
    pub properties: &'a [AiProperty],
    pub progress: AiProgressCallback,
    /// Passed back to `progress` untouched.
    pub user_data: *mut c_void,
}

impl<'a> Default for ImportOptions<'a> {
    fn default() -> ImportOptions<'a> {
        ImportOptions {
            flags: PostProcessSteps::empty(),
            file_io: None,
            properties: &[],
            progress: None,
            user_data: ptr::null_mut(),
        }
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct ExportOptions<'a> {
    pub preprocessing: PostProcessSteps,
    /// Custom file table. Only used when exporting to a path.
    pub file_io: Option<&'a AiFileIO>,
    pub properties: &'a [AiProperty],
}

enum ImportSource<'a> {
    File(&'a CStr),
    Memory(&'a [u8], &'a CStr),
}

enum ExportTarget<'a> {
    File(&'a CStr),
    Blob,
}

enum Exported<B> {
    File,
    Blob(B),
}

/// Drives an `Engine` through single-shot imports and exports.
pub struct Bridge<E: Engine> {
    engine: E,
}

impl<E: Engine> Bridge<E> {
    pub fn new(engine: E) -> Bridge<E> {
        Bridge { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    //----------------------------------------------------------------------------------------------
    // Import

    /// Reads the file at `path`. The returned scene belongs to the caller.
    pub fn try_import_file(&self, path: Option<&CStr>, options: &ImportOptions) -> Result<E::Scene, BridgeError> {
        let path = path.ok_or(BridgeError::NullPath)?;
        debug!("import file {:?}, flags {:?}", path, options.flags);
        self.run_import(ImportSource::File(path), options)
    }

    /// Reads a scene from `buffer`. `hint` is the format extension, if known.
    pub fn try_import_from_memory(
        &self,
        buffer: &[u8],
        hint: Option<&CStr>,
        options: &ImportOptions,
    ) -> Result<E::Scene, BridgeError> {
        if buffer.is_empty() {
            return Err(BridgeError::EmptyBuffer);
        }
        let hint = hint.unwrap_or_default();
        debug!(
            "import {} bytes from memory, hint {:?}, flags {:?}",
            buffer.len(),
            hint,
            options.flags
        );
        self.run_import(ImportSource::Memory(buffer, hint), options)
    }

    /// Channel form of `try_import_file`: failures go to the thread's error slot.
    pub fn import_file(&self, path: Option<&CStr>, options: &ImportOptions) -> Option<E::Scene> {
        error::clear_error();
        report(self.try_import_file(path, options))
    }

    pub fn import_from_memory(
        &self,
        buffer: &[u8],
        hint: Option<&CStr>,
        options: &ImportOptions,
    ) -> Option<E::Scene> {
        error::clear_error();
        report(self.try_import_from_memory(buffer, hint, options))
    }

    fn run_import(&self, source: ImportSource, options: &ImportOptions) -> Result<E::Scene, BridgeError> {
        let mut importer = self.engine.create_importer();

        match (options.file_io, &source) {
            (Some(table), &ImportSource::File(_)) => {
                debug!("wiring custom file table");
                importer.set_io_handler(Box::new(FileIoSystem::new(table)));
            }
            (Some(_), &ImportSource::Memory(..)) => {
                debug!("custom file table ignored for an in-memory import");
            }
            (None, _) => {}
        }
        if options.progress.is_some() {
            debug!("wiring progress callback");
            importer.set_progress_handler(Box::new(CallbackProgressHandler::new(
                options.progress,
                options.user_data,
            )));
        }
        apply_properties(&mut importer, options.properties);

        // the importer's scene dies with the importer, detach it first
        let copied = match source {
            ImportSource::File(path) => importer.read_file(path, options.flags),
            ImportSource::Memory(buffer, hint) => importer.read_file_from_memory(buffer, options.flags, hint),
        }.map(|scene| self.engine.copy_scene(scene));

        match copied {
            Some(Some(scene)) => {
                debug!("import done");
                Ok(scene)
            }
            Some(None) => {
                warn!("scene copy failed");
                Err(BridgeError::CopyFailed)
            }
            None => {
                let err = BridgeError::import(importer.error_string());
                warn!("import failed: {}", err);
                Err(err)
            }
        }
    }

    //----------------------------------------------------------------------------------------------
    // Export

    /// Writes `scene` to `path` in the format named by `format_id`.
    pub fn try_export_to_file(
        &self,
        scene: Option<&ExportSceneOf<E>>,
        format_id: Option<&CStr>,
        path: Option<&CStr>,
        options: &ExportOptions,
    ) -> Result<(), BridgeError> {
        self.check_export_support()?;
        let scene = scene.ok_or(BridgeError::NullScene)?;
        let format_id = format_id.ok_or(BridgeError::NullFormatId)?;
        let path = path.ok_or(BridgeError::NullPath)?;
        debug!("export {:?} as {:?}", path, format_id);
        self.run_export(scene, format_id, ExportTarget::File(path), options)
            .map(|_| ())
    }

    /// Exports `scene` into a blob chain owned by the caller.
    pub fn try_export_to_blob(
        &self,
        scene: Option<&ExportSceneOf<E>>,
        format_id: Option<&CStr>,
        options: &ExportOptions,
    ) -> Result<BlobOf<E>, BridgeError> {
        self.check_export_support()?;
        let scene = scene.ok_or(BridgeError::NullScene)?;
        let format_id = format_id.ok_or(BridgeError::NullFormatId)?;
        debug!("export blob as {:?}", format_id);
        match self.run_export(scene, format_id, ExportTarget::Blob, options)? {
            Exported::Blob(blob) => Ok(blob),
            Exported::File => Err(BridgeError::export("")),
        }
    }

    pub fn export_to_file(
        &self,
        scene: Option<&ExportSceneOf<E>>,
        format_id: Option<&CStr>,
        path: Option<&CStr>,
        options: &ExportOptions,
    ) -> bool {
        error::clear_error();
        report(self.try_export_to_file(scene, format_id, path, options)).is_some()
    }

    pub fn export_to_blob(
        &self,
        scene: Option<&ExportSceneOf<E>>,
        format_id: Option<&CStr>,
        options: &ExportOptions,
    ) -> Option<BlobOf<E>> {
        error::clear_error();
        report(self.try_export_to_blob(scene, format_id, options))
    }

    /// Formats accepted as `format_id`. Empty when export is unavailable.
    pub fn export_formats(&self) -> Vec<ExportFormat> {
        match self.check_export_support() {
            Ok(()) => self.engine.export_formats(),
            Err(e) => {
                debug!("no export formats: {}", e);
                Vec::new()
            }
        }
    }

    pub fn is_export_format_supported(&self, format_id: &str) -> bool {
        self.export_formats().iter().any(|format| format.id == format_id)
    }

    /// Forwards the engine's log lines to the `log` facade under the `assimp` target.
    pub fn attach_engine_log(&self, verbose: bool) -> bool {
        let attached = self.engine.attach_log(verbose);
        if !attached {
            debug!("engine has no log to forward");
        }
        attached
    }

    pub fn detach_engine_log(&self) -> bool {
        self.engine.detach_log()
    }

    #[cfg(feature = "export")]
    fn check_export_support(&self) -> Result<(), BridgeError> {
        if self.engine.supports_export() {
            Ok(())
        } else {
            Err(BridgeError::ExportDisabled)
        }
    }

    #[cfg(not(feature = "export"))]
    fn check_export_support(&self) -> Result<(), BridgeError> {
        Err(BridgeError::ExportDisabled)
    }

    fn run_export(
        &self,
        scene: &ExportSceneOf<E>,
        format_id: &CStr,
        target: ExportTarget,
        options: &ExportOptions,
    ) -> Result<Exported<BlobOf<E>>, BridgeError> {
        let mut exporter = self.engine.create_exporter();

        match (options.file_io, &target) {
            (Some(table), &ExportTarget::File(_)) => {
                debug!("wiring custom file table");
                exporter.set_io_handler(Box::new(FileIoSystem::new(table)));
            }
            (Some(_), &ExportTarget::Blob) => {
                debug!("custom file table ignored for a blob export");
            }
            (None, _) => {}
        }
        apply_properties(&mut exporter, options.properties);

        let result = match target {
            ExportTarget::File(path) => {
                match exporter.export(scene, format_id, path, options.preprocessing) {
                    AiReturn::Success => Some(Exported::File),
                    code => {
                        debug!("exporter returned {:?}", code);
                        None
                    }
                }
            }
            ExportTarget::Blob => {
                if exporter.export_to_blob(scene, format_id, options.preprocessing) {
                    exporter.get_orphaned_blob().map(Exported::Blob)
                } else {
                    None
                }
            }
        };

        match result {
            Some(exported) => {
                debug!("export done");
                Ok(exported)
            }
            None => {
                let err = BridgeError::export(exporter.error_string());
                warn!("export failed: {}", err);
                Err(err)
            }
        }
    }
}

/// Moves a failure into the error slot.
fn report<T>(result: Result<T, BridgeError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            error::record(&err);
            None
        }
    }
}

#![allow(dead_code)]

extern crate asset_bridge;
extern crate pretty_env_logger;

use self::asset_bridge::logging::forward_engine_line;
use self::asset_bridge::{AiMatrix4x4, AiReturn, Engine, ExportFormat, Exporter, Importer, IoSystem,
                         PostProcessSteps, ProgressHandler, PropertySink};
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub fn init_logger() {
    let _ = pretty_env_logger::try_init();
}

pub fn cs(s: &str) -> CString {
    CString::new(s).unwrap()
}

/// Everything the mock engine was asked to do, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    CreateImporter,
    CreateExporter,
    SetIoHandler,
    SetProgressHandler,
    SetInteger(String, i32),
    SetBool(String, bool),
    SetFloat(String, f32),
    SetString(String, String),
    SetMatrix(String, AiMatrix4x4),
    ReadFile(String, PostProcessSteps),
    ReadMemory(usize, String),
    CopyScene,
    Export(String, String),
    ExportBlob(String),
    DropImporter,
    DropExporter,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MockScene {
    pub source: String,
    pub data: Vec<u8>,
    pub flags: PostProcessSteps,
}

impl MockScene {
    pub fn new(source: &str, data: &[u8]) -> MockScene {
        MockScene {
            source: source.to_owned(),
            data: data.to_vec(),
            flags: PostProcessSteps::empty(),
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct MockBlob {
    pub format: String,
    pub data: Vec<u8>,
}

/// Format id the mock exporter refuses, with a message.
pub const BAD_FORMAT: &str = "bad";
/// Format id the mock exporter refuses, without a message.
pub const SILENT_FORMAT: &str = "silent";

/// Engine double: files live in a shared map, every call is recorded. Once its log is
/// attached it also writes engine-style log lines.
#[derive(Clone, Default)]
pub struct MockEngine {
    pub calls: Arc<Mutex<Vec<Call>>>,
    pub files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    pub formats: Vec<ExportFormat>,
    pub fail_copy: bool,
    pub no_export: bool,
    log_attached: Arc<AtomicBool>,
    log_verbose: Arc<AtomicBool>,
}

impl MockEngine {
    pub fn new() -> MockEngine {
        MockEngine::default()
    }

    pub fn with_file(self, path: &str, data: &[u8]) -> MockEngine {
        self.files.lock().unwrap().insert(path.to_owned(), data.to_vec());
        self
    }

    pub fn with_format(mut self, id: &str, description: &str, extension: &str) -> MockEngine {
        self.formats.push(ExportFormat {
            id: id.to_owned(),
            description: description.to_owned(),
            file_extension: extension.to_owned(),
        });
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }

    fn log(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn engine_log(&self, line: String) {
        if self.log_attached.load(Ordering::SeqCst) {
            forward_engine_line(&line);
        }
    }

    fn engine_debug(&self, line: String) {
        if self.log_verbose.load(Ordering::SeqCst) {
            self.engine_log(line);
        }
    }
}

fn s(c: &CStr) -> String {
    c.to_string_lossy().into_owned()
}

macro_rules! logging_sink {
    ($t:ty) => {
        impl PropertySink for $t {
            fn set_property_integer(&mut self, name: &CStr, value: i32) {
                self.engine.log(Call::SetInteger(s(name), value));
            }
            fn set_property_bool(&mut self, name: &CStr, value: bool) {
                self.engine.log(Call::SetBool(s(name), value));
            }
            fn set_property_float(&mut self, name: &CStr, value: f32) {
                self.engine.log(Call::SetFloat(s(name), value));
            }
            fn set_property_string(&mut self, name: &CStr, value: &CStr) {
                self.engine.log(Call::SetString(s(name), s(value)));
            }
            fn set_property_matrix(&mut self, name: &CStr, value: &AiMatrix4x4) {
                self.engine.log(Call::SetMatrix(s(name), *value));
            }
        }
    };
}

//--------------------------------------------------------------------------------------------------

/// Reads files byte for byte. An empty file fails without a message; a progress handler can
/// cancel before reading.
pub struct MockImporter {
    engine: MockEngine,
    io: Option<Box<dyn IoSystem>>,
    progress: Option<Box<dyn ProgressHandler>>,
    scene: Option<MockScene>,
    error: String,
}

impl MockImporter {
    fn load(&mut self, path: &CStr) -> Option<Vec<u8>> {
        match self.io {
            Some(ref mut io) => {
                if !io.exists(path) {
                    return None;
                }
                let mut stream = io.open(path, &cs("rb"))?;
                let mut data = vec![0u8; stream.file_size()];
                let len = data.len();
                let read = stream.read(&mut data, 1, len);
                data.truncate(read);
                io.close(stream);
                Some(data)
            }
            None => self.engine.file(&s(path)),
        }
    }

    fn finish(&mut self, source: String, data: Option<Vec<u8>>, flags: PostProcessSteps) -> Option<&MockScene> {
        let data = match data {
            Some(data) => data,
            None => {
                self.error = format!("Unable to open file \"{}\".", source);
                self.engine.engine_log(format!("Error, T0: {}\n", self.error));
                return None;
            }
        };
        self.engine.engine_debug(format!("Debug, T0: {} bytes from {}\n", data.len(), source));
        if data.is_empty() {
            self.error.clear();
            return None;
        }
        if let Some(ref mut progress) = self.progress {
            progress.update_file_read(1, 1);
            progress.update_post_process(1, 1);
        }
        self.engine.engine_log(format!("Info,  T0: Load {}\n", source));
        self.scene = Some(MockScene { source, data, flags });
        self.scene.as_ref()
    }

    fn cancelled(&mut self) -> bool {
        let keep_going = match self.progress {
            Some(ref mut progress) => {
                let keep_going = progress.update(0.0);
                progress.update_file_read(0, 1);
                keep_going
            }
            None => true,
        };
        if !keep_going {
            self.error = "Import cancelled by progress handler".to_owned();
        }
        !keep_going
    }
}

logging_sink!(MockImporter);

impl Importer for MockImporter {
    type Scene = MockScene;

    fn set_io_handler(&mut self, io: Box<dyn IoSystem>) {
        self.engine.log(Call::SetIoHandler);
        self.io = Some(io);
    }

    fn set_progress_handler(&mut self, handler: Box<dyn ProgressHandler>) {
        self.engine.log(Call::SetProgressHandler);
        self.progress = Some(handler);
    }

    fn read_file(&mut self, path: &CStr, flags: PostProcessSteps) -> Option<&MockScene> {
        self.engine.log(Call::ReadFile(s(path), flags));
        if self.cancelled() {
            return None;
        }
        let data = self.load(path);
        self.finish(s(path), data, flags)
    }

    fn read_file_from_memory(&mut self, buffer: &[u8], flags: PostProcessSteps, hint: &CStr) -> Option<&MockScene> {
        self.engine.log(Call::ReadMemory(buffer.len(), s(hint)));
        if self.cancelled() {
            return None;
        }
        let source = format!("memory.{}", s(hint));
        self.finish(source, Some(buffer.to_vec()), flags)
    }

    fn error_string(&self) -> String {
        self.error.clone()
    }
}

impl Drop for MockImporter {
    fn drop(&mut self) {
        self.engine.log(Call::DropImporter);
    }
}

//--------------------------------------------------------------------------------------------------

pub struct MockExporter {
    engine: MockEngine,
    io: Option<Box<dyn IoSystem>>,
    blob: Option<MockBlob>,
    error: String,
}

impl MockExporter {
    fn check_format(&mut self, format_id: &CStr) -> bool {
        match format_id.to_str() {
            Ok(BAD_FORMAT) => {
                self.error = "No exporter for format 'bad'".to_owned();
                false
            }
            Ok(SILENT_FORMAT) => {
                self.error.clear();
                false
            }
            _ => true,
        }
    }
}

logging_sink!(MockExporter);

impl Exporter for MockExporter {
    type Scene = MockScene;
    type Blob = MockBlob;

    fn set_io_handler(&mut self, io: Box<dyn IoSystem>) {
        self.engine.log(Call::SetIoHandler);
        self.io = Some(io);
    }

    fn export(&mut self, scene: &MockScene, format_id: &CStr, path: &CStr, _: PostProcessSteps) -> AiReturn {
        self.engine.log(Call::Export(s(format_id), s(path)));
        if !self.check_format(format_id) {
            return AiReturn::Failure;
        }
        match self.io {
            Some(ref mut io) => {
                let mut stream = match io.open(path, &cs("wb")) {
                    Some(stream) => stream,
                    None => {
                        self.error = format!("Unable to open output file {}", s(path));
                        return AiReturn::Failure;
                    }
                };
                stream.write(&scene.data, 1, scene.data.len());
                io.close(stream);
            }
            None => {
                self.engine.files.lock().unwrap().insert(s(path), scene.data.clone());
            }
        }
        AiReturn::Success
    }

    fn export_to_blob(&mut self, scene: &MockScene, format_id: &CStr, _: PostProcessSteps) -> bool {
        self.engine.log(Call::ExportBlob(s(format_id)));
        if !self.check_format(format_id) {
            return false;
        }
        self.blob = Some(MockBlob {
            format: s(format_id),
            data: scene.data.clone(),
        });
        true
    }

    fn get_orphaned_blob(&mut self) -> Option<MockBlob> {
        self.blob.take()
    }

    fn error_string(&self) -> String {
        self.error.clone()
    }
}

impl Drop for MockExporter {
    fn drop(&mut self) {
        self.engine.log(Call::DropExporter);
    }
}

//--------------------------------------------------------------------------------------------------

impl Engine for MockEngine {
    type Scene = MockScene;
    type Importer = MockImporter;
    type Exporter = MockExporter;

    fn create_importer(&self) -> MockImporter {
        self.log(Call::CreateImporter);
        MockImporter {
            engine: self.clone(),
            io: None,
            progress: None,
            scene: None,
            error: String::new(),
        }
    }

    fn create_exporter(&self) -> MockExporter {
        self.log(Call::CreateExporter);
        MockExporter {
            engine: self.clone(),
            io: None,
            blob: None,
            error: String::new(),
        }
    }

    fn copy_scene(&self, scene: &MockScene) -> Option<MockScene> {
        self.log(Call::CopyScene);
        if self.fail_copy {
            None
        } else {
            Some(scene.clone())
        }
    }

    fn supports_export(&self) -> bool {
        !self.no_export
    }

    fn export_formats(&self) -> Vec<ExportFormat> {
        self.formats.clone()
    }

    fn attach_log(&self, verbose: bool) -> bool {
        self.log_verbose.store(verbose, Ordering::SeqCst);
        self.log_attached.store(true, Ordering::SeqCst);
        true
    }

    fn detach_log(&self) -> bool {
        self.log_attached.swap(false, Ordering::SeqCst)
    }
}

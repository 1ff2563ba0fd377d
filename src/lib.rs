extern crate libc;
#[macro_use]
extern crate log;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate bitflags;

pub mod ffi;
pub mod postprocess;
pub mod error;
pub mod engine;
pub mod properties;
pub mod io;
pub mod progress;
pub mod logging;
pub mod bridge;
#[cfg(feature = "assimp")]
pub mod assimp;
#[cfg(feature = "assimp")]
pub mod capi;

pub use bridge::{BlobOf, Bridge, ExportOptions, ExportSceneOf, ImportOptions};
pub use engine::{Engine, ExportFormat, Exporter, Importer, IoStream, IoSystem, ProgressHandler, PropertySink};
pub use error::{last_error, BridgeError};
pub use ffi::{AiExportDataBlob, AiFile, AiFileIO, AiMatrix4x4, AiOrigin, AiProgressCallback, AiProperty, AiReturn, AiScene};
pub use io::{FileIoStream, FileIoSystem, MemoryFileIo};
pub use postprocess::PostProcessSteps;
pub use progress::{CallbackProgressHandler, ProgressClosure};
pub use properties::{PropertyList, PropertyValue};

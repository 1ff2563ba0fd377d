extern crate asset_bridge;

mod common;

use asset_bridge::{last_error, Bridge, BridgeError, ExportOptions};
#[cfg(feature = "export")]
use asset_bridge::{AiMatrix4x4, MemoryFileIo, PostProcessSteps, PropertyList, PropertyValue};
use common::*;

const DISABLED: &str = "Export support is disabled in this build";

fn scene() -> MockScene {
    MockScene::new("cube.obj", b"mesh bytes")
}

#[cfg(feature = "export")]
#[test]
fn null_arguments_fail_before_the_engine_is_touched() {
    init_logger();
    let engine = MockEngine::new();
    let bridge = Bridge::new(engine.clone());
    let scene = scene();
    let (obj, path) = (cs("obj"), cs("out.obj"));
    let options = ExportOptions::default();

    assert!(!bridge.export_to_file(None, Some(&obj), Some(&path), &options));
    assert_eq!(last_error(), Some("Scene is null".to_owned()));

    assert!(!bridge.export_to_file(Some(&scene), None, Some(&path), &options));
    assert_eq!(last_error(), Some("Format id is null".to_owned()));

    assert!(!bridge.export_to_file(Some(&scene), Some(&obj), None, &options));
    assert_eq!(last_error(), Some("Path is null".to_owned()));

    assert!(bridge.export_to_blob(None, Some(&obj), &options).is_none());
    assert_eq!(last_error(), Some("Scene is null".to_owned()));

    assert!(engine.calls().is_empty());
}

#[cfg(feature = "export")]
#[test]
fn export_to_path_goes_through_the_engine() {
    init_logger();
    let engine = MockEngine::new();
    let bridge = Bridge::new(engine.clone());
    let (obj, path) = (cs("obj"), cs("out/cube.obj"));

    assert!(bridge.export_to_file(Some(&scene()), Some(&obj), Some(&path), &ExportOptions::default()));
    assert_eq!(last_error(), None);
    assert_eq!(engine.file("out/cube.obj"), Some(b"mesh bytes".to_vec()));
    assert_eq!(
        engine.calls(),
        vec![
            Call::CreateExporter,
            Call::Export("obj".to_owned(), "out/cube.obj".to_owned()),
            Call::DropExporter,
        ]
    );
}

#[cfg(feature = "export")]
#[test]
fn export_writes_through_a_custom_file_table() {
    init_logger();
    let engine = MockEngine::new();
    let bridge = Bridge::new(engine.clone());
    let mem = MemoryFileIo::new();
    let (obj, path) = (cs("obj"), cs("cube.obj"));
    let options = ExportOptions {
        file_io: Some(mem.table()),
        ..Default::default()
    };

    assert!(bridge.export_to_file(Some(&scene()), Some(&obj), Some(&path), &options));
    assert_eq!(mem.file("cube.obj"), Some(b"mesh bytes".to_vec()));
    assert_eq!(engine.file("cube.obj"), None);
    assert_eq!(mem.open_count(), 1);
    assert_eq!(mem.close_count(), 1);
}

#[cfg(feature = "export")]
#[test]
fn export_properties_are_applied_to_the_exporter() {
    init_logger();
    let engine = MockEngine::new();
    let bridge = Bridge::new(engine.clone());
    let mut props = PropertyList::new();
    props
        .set("EXPORT_TRANSFORM", PropertyValue::Matrix(AiMatrix4x4::identity())).unwrap()
        .set("EXPORT_NAME", PropertyValue::String("cube".to_owned())).unwrap();
    let descriptors = props.descriptors();
    let options = ExportOptions {
        preprocessing: PostProcessSteps::FLIP_UVS,
        properties: &descriptors,
        ..Default::default()
    };
    let obj = cs("obj");

    let blob = bridge.export_to_blob(Some(&scene()), Some(&obj), &options).unwrap();
    assert_eq!(blob, MockBlob { format: "obj".to_owned(), data: b"mesh bytes".to_vec() });
    assert_eq!(
        engine.calls(),
        vec![
            Call::CreateExporter,
            Call::SetMatrix("EXPORT_TRANSFORM".to_owned(), AiMatrix4x4::identity()),
            Call::SetString("EXPORT_NAME".to_owned(), "cube".to_owned()),
            Call::ExportBlob("obj".to_owned()),
            Call::DropExporter,
        ]
    );
}

#[cfg(feature = "export")]
#[test]
fn engine_export_failures_are_reported() {
    init_logger();
    let bridge = Bridge::new(MockEngine::new());
    let (bad, silent, path) = (cs(BAD_FORMAT), cs(SILENT_FORMAT), cs("out.x"));
    let options = ExportOptions::default();

    assert!(!bridge.export_to_file(Some(&scene()), Some(&bad), Some(&path), &options));
    assert_eq!(last_error(), Some("No exporter for format 'bad'".to_owned()));

    assert!(bridge.export_to_blob(Some(&scene()), Some(&silent), &options).is_none());
    assert_eq!(last_error(), Some("Export failed".to_owned()));

    assert_eq!(
        bridge.try_export_to_blob(Some(&scene()), Some(&bad), &options),
        Err(BridgeError::Export("No exporter for format 'bad'".to_owned()))
    );
}

#[cfg(feature = "export")]
#[test]
fn export_formats_come_from_the_engine() {
    init_logger();
    let engine = MockEngine::new()
        .with_format("obj", "Wavefront OBJ format", "obj")
        .with_format("stlb", "Stereolithography (binary)", "stl");
    let bridge = Bridge::new(engine);

    let ids: Vec<String> = bridge.export_formats().into_iter().map(|f| f.id).collect();
    assert_eq!(ids, vec!["obj".to_owned(), "stlb".to_owned()]);
    assert_eq!(bridge.export_formats()[1].file_extension, "stl");
    assert!(bridge.is_export_format_supported("stlb"));
    assert!(!bridge.is_export_format_supported("stl"));
}

#[test]
fn engine_without_export_rejects_every_export() {
    init_logger();
    let mut engine = MockEngine::new().with_format("obj", "Wavefront OBJ format", "obj");
    engine.no_export = true;
    let bridge = Bridge::new(engine.clone());
    let (obj, path) = (cs("obj"), cs("out.obj"));
    let options = ExportOptions::default();

    assert!(!bridge.export_to_file(Some(&scene()), Some(&obj), Some(&path), &options));
    assert_eq!(last_error(), Some(DISABLED.to_owned()));
    assert!(bridge.export_to_blob(Some(&scene()), Some(&obj), &options).is_none());
    assert_eq!(last_error(), Some(DISABLED.to_owned()));
    // even with nothing to export, the capability check comes first
    assert!(!bridge.export_to_file(None, None, None, &options));
    assert_eq!(last_error(), Some(DISABLED.to_owned()));
    assert!(bridge.export_formats().is_empty());
    assert!(!bridge.is_export_format_supported("obj"));

    assert!(engine.calls().is_empty());
}

#[cfg(not(feature = "export"))]
#[test]
fn builds_without_export_reject_every_export() {
    init_logger();
    let engine = MockEngine::new().with_format("obj", "Wavefront OBJ format", "obj");
    let bridge = Bridge::new(engine.clone());
    let (obj, path) = (cs("obj"), cs("out.obj"));

    assert!(bridge.export_formats().is_empty());
    assert_eq!(
        bridge.try_export_to_file(Some(&scene()), Some(&obj), Some(&path), &ExportOptions::default()),
        Err(BridgeError::ExportDisabled)
    );
    assert!(bridge.export_to_blob(Some(&scene()), Some(&obj), &ExportOptions::default()).is_none());
    assert_eq!(last_error(), Some(DISABLED.to_owned()));
    assert!(engine.calls().is_empty());
}

extern crate asset_bridge;

mod common;

use asset_bridge::error::clear_error;
use asset_bridge::properties::keys;
use asset_bridge::{last_error, BridgeError, Bridge, ImportOptions, MemoryFileIo, PostProcessSteps,
                   ProgressClosure, PropertyList, PropertyValue};
use common::*;

#[test]
fn null_path_fails_before_the_engine_is_touched() {
    init_logger();
    let engine = MockEngine::new();
    let bridge = Bridge::new(engine.clone());

    assert!(bridge.import_file(None, &ImportOptions::default()).is_none());
    assert_eq!(last_error(), Some("Path is null".to_owned()));
    assert!(engine.calls().is_empty());

    assert_eq!(
        bridge.try_import_file(None, &ImportOptions::default()),
        Err(BridgeError::NullPath)
    );
}

#[test]
fn imported_scene_outlives_the_importer() {
    init_logger();
    let engine = MockEngine::new().with_file("cube.obj", b"v 0 0 0");
    let bridge = Bridge::new(engine.clone());
    let path = cs("cube.obj");
    let options = ImportOptions {
        flags: PostProcessSteps::TRIANGULATE,
        ..Default::default()
    };

    let scene = bridge.import_file(Some(&path), &options).unwrap();
    assert_eq!(last_error(), None);
    assert_eq!(
        engine.calls(),
        vec![
            Call::CreateImporter,
            Call::ReadFile("cube.obj".to_owned(), PostProcessSteps::TRIANGULATE),
            Call::CopyScene,
            Call::DropImporter,
        ]
    );
    // the importer is gone, the copy is still ours
    assert_eq!(scene.source, "cube.obj");
    assert_eq!(scene.data, b"v 0 0 0".to_vec());
    assert_eq!(scene.flags, PostProcessSteps::TRIANGULATE);
}

#[test]
fn properties_reach_the_importer_in_order_before_reading() {
    init_logger();
    let engine = MockEngine::new().with_file("a.fbx", b"fbx");
    let bridge = Bridge::new(engine.clone());

    let mut props = PropertyList::new();
    props
        .set(keys::GLOBAL_SCALE_FACTOR, PropertyValue::Float(0.01)).unwrap()
        .set(keys::IMPORT_FBX_READ_ANIMATIONS, PropertyValue::Boolean(false)).unwrap()
        .set(keys::PP_SLM_VERTEX_LIMIT, PropertyValue::Integer(65535)).unwrap();
    let descriptors = props.descriptors();
    let options = ImportOptions {
        properties: &descriptors,
        ..Default::default()
    };

    let path = cs("a.fbx");
    assert!(bridge.import_file(Some(&path), &options).is_some());
    assert_eq!(
        &engine.calls()[..4],
        &[
            Call::CreateImporter,
            Call::SetFloat("GLOBAL_SCALE_FACTOR".to_owned(), 0.01),
            Call::SetBool("IMPORT_FBX_READ_ANIMATIONS".to_owned(), false),
            Call::SetInteger("PP_SLM_VERTEX_LIMIT".to_owned(), 65535),
        ]
    );
}

#[test]
fn engine_message_is_passed_through() {
    init_logger();
    let bridge = Bridge::new(MockEngine::new());
    let path = cs("missing.obj");
    assert!(bridge.import_file(Some(&path), &ImportOptions::default()).is_none());
    assert_eq!(last_error(), Some("Unable to open file \"missing.obj\".".to_owned()));
}

#[test]
fn silent_engine_failure_gets_a_generic_message() {
    init_logger();
    let bridge = Bridge::new(MockEngine::new().with_file("empty.obj", b""));
    let path = cs("empty.obj");
    assert!(bridge.import_file(Some(&path), &ImportOptions::default()).is_none());
    assert_eq!(last_error(), Some("Import failed".to_owned()));
}

#[test]
fn copy_failure_is_reported() {
    init_logger();
    let mut engine = MockEngine::new().with_file("a.obj", b"v");
    engine.fail_copy = true;
    let bridge = Bridge::new(engine.clone());
    let path = cs("a.obj");

    assert!(bridge.import_file(Some(&path), &ImportOptions::default()).is_none());
    assert_eq!(last_error(), Some("aiCopyScene returned null".to_owned()));
    // the importer is still torn down
    assert_eq!(engine.calls().last(), Some(&Call::DropImporter));
}

#[test]
fn custom_file_table_is_used_for_reading() {
    init_logger();
    let engine = MockEngine::new();
    let bridge = Bridge::new(engine.clone());
    let mem = MemoryFileIo::new();
    mem.add_file("packed/mesh.ply", b"ply data".to_vec());

    let path = cs("packed/mesh.ply");
    let options = ImportOptions {
        file_io: Some(mem.table()),
        ..Default::default()
    };
    let scene = bridge.import_file(Some(&path), &options).unwrap();

    assert_eq!(scene.data, b"ply data".to_vec());
    assert_eq!(engine.calls()[1], Call::SetIoHandler);
    // one probe for `exists`, one real open; every handle came back
    assert_eq!(mem.open_count(), 2);
    assert_eq!(mem.close_count(), 2);
}

#[test]
fn progress_reports_phases_and_messages() {
    init_logger();
    let bridge = Bridge::new(MockEngine::new().with_file("a.obj", b"v"));
    let mut events = Vec::new();
    {
        let mut record = |p: f32, m: Option<&str>| {
            events.push((p, m.map(|m| m.to_owned())));
            true
        };
        let mut closure = ProgressClosure::new(&mut record);
        let options = ImportOptions {
            progress: closure.callback(),
            user_data: closure.user_data(),
            ..Default::default()
        };
        let path = cs("a.obj");
        assert!(bridge.import_file(Some(&path), &options).is_some());
    }
    assert_eq!(
        events,
        vec![
            (0.0, None),
            (0.0, Some("read 0/1".to_owned())),
            (0.5, Some("read 1/1".to_owned())),
            (1.0, Some("post 1/1".to_owned())),
        ]
    );
}

#[test]
fn progress_callback_can_cancel() {
    init_logger();
    let bridge = Bridge::new(MockEngine::new().with_file("a.obj", b"v"));
    let mut stop = |_: f32, _: Option<&str>| false;
    let mut closure = ProgressClosure::new(&mut stop);
    let options = ImportOptions {
        progress: closure.callback(),
        user_data: closure.user_data(),
        ..Default::default()
    };
    let path = cs("a.obj");
    assert!(bridge.import_file(Some(&path), &options).is_none());
    assert_eq!(last_error(), Some("Import cancelled by progress handler".to_owned()));
}

#[test]
fn empty_memory_buffer_is_rejected() {
    init_logger();
    let engine = MockEngine::new();
    let bridge = Bridge::new(engine.clone());

    assert!(bridge.import_from_memory(&[], None, &ImportOptions::default()).is_none());
    let msg = last_error().unwrap();
    assert!(msg.contains("empty"), "unexpected message {:?}", msg);
    assert!(engine.calls().is_empty());
}

#[test]
fn memory_import_passes_the_hint_and_ignores_the_file_table() {
    init_logger();
    let engine = MockEngine::new();
    let bridge = Bridge::new(engine.clone());
    let mem = MemoryFileIo::new();
    let hint = cs("stl");
    let options = ImportOptions {
        file_io: Some(mem.table()),
        ..Default::default()
    };

    let scene = bridge
        .import_from_memory(b"solid cube", Some(&hint), &options)
        .unwrap();
    assert_eq!(scene.source, "memory.stl");
    assert!(!engine.calls().contains(&Call::SetIoHandler));
    assert_eq!(engine.calls()[1], Call::ReadMemory(10, "stl".to_owned()));
    assert_eq!(mem.open_count(), 0);

    // no hint means an empty one
    assert!(bridge.import_from_memory(b"x", None, &options).is_some());
    assert!(engine.calls().contains(&Call::ReadMemory(1, String::new())));
}

#[test]
fn success_clears_a_previous_error() {
    init_logger();
    let bridge = Bridge::new(MockEngine::new().with_file("a.obj", b"v"));
    assert!(bridge.import_file(None, &ImportOptions::default()).is_none());
    assert!(last_error().is_some());

    let path = cs("a.obj");
    assert!(bridge.import_file(Some(&path), &ImportOptions::default()).is_some());
    assert_eq!(last_error(), None);
    clear_error();
}

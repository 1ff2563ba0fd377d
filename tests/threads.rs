extern crate asset_bridge;

mod common;

use asset_bridge::{last_error, Bridge, ImportOptions, MemoryFileIo};
use common::*;
use std::sync::{Arc, Barrier};
use std::thread;

const THREADS: usize = 8;

#[test]
fn concurrent_imports_only_see_their_own_errors() {
    init_logger();
    let engine = MockEngine::new().with_file("shared.obj", b"v 1 2 3");
    let barrier = Arc::new(Barrier::new(THREADS));

    let workers: Vec<_> = (0..THREADS)
        .map(|i| {
            let bridge = Bridge::new(engine.clone());
            let barrier = barrier.clone();
            thread::spawn(move || {
                // even threads fail on their own missing file, odd ones succeed
                let name = if i % 2 == 0 {
                    format!("missing_{}.obj", i)
                } else {
                    "shared.obj".to_owned()
                };
                let path = cs(&name);
                // half of the workers read through a table of their own
                let mem = MemoryFileIo::new();
                mem.add_file("shared.obj", b"v 1 2 3".to_vec());
                let options = ImportOptions {
                    file_io: if i % 4 < 2 { Some(mem.table()) } else { None },
                    ..Default::default()
                };
                barrier.wait();
                for _ in 0..50 {
                    let scene = bridge.import_file(Some(&path), &options);
                    if i % 2 == 0 {
                        assert!(scene.is_none());
                        assert_eq!(last_error(), Some(format!("Unable to open file \"{}\".", name)));
                    } else {
                        assert!(scene.is_some());
                        assert_eq!(last_error(), None);
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    // nothing leaked into this thread
    assert_eq!(last_error(), None);
}

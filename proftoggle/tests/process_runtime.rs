// SPDX-License-Identifier: Apache-2.0

// The CPU sampler is process-wide, so everything touching it lives in this
// single test.

use proftoggle::{Error, ProfileKind, ProfileManager, ProfileOptions};
use std::{fs, hint::black_box, time::Instant};
use tempfile::TempDir;

fn burn_cpu(ms: u128) -> u64 {
    let start = Instant::now();
    let mut acc = 0u64;
    while start.elapsed().as_millis() < ms {
        for i in 0..10_000u64 {
            acc = black_box(acc.wrapping_mul(31).wrapping_add(i));
        }
    }
    acc
}

#[test]
fn process_runtime_writes_every_profile() {
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = TempDir::new().unwrap();
    let options = ProfileOptions::default()
        .with_path(ProfileKind::Cpu, dir.path().join("cpu.out"))
        .with_path(ProfileKind::Heap, dir.path().join("heap.out"))
        .with_path(ProfileKind::Thread, dir.path().join("thread.out"))
        .with_path(ProfileKind::Block, dir.path().join("block.out"))
        .with_cpu_rate(1000);

    let mut manager = ProfileManager::start(options.clone()).unwrap();
    assert!(manager.runtime().is_sampling());

    // A second session cannot sample at the same time
    let cpu_only = ProfileOptions::default().with_path(ProfileKind::Cpu, dir.path().join("cpu2.out"));
    let err = ProfileManager::start(cpu_only).unwrap_err();
    assert!(matches!(err.error(), Error::Profiling(_)));
    assert!(err.into_manager().active_kinds().is_empty());

    black_box(burn_cpu(200));
    manager.close();
    assert!(!manager.runtime().is_sampling());
    assert!(manager.active_kinds().is_empty());

    for kind in ProfileKind::ALL {
        let path = options.path(kind).unwrap();
        let len = fs::metadata(path).unwrap().len();
        let written = match kind {
            ProfileKind::Cpu => true,
            // Without dhat the heap profile is left empty
            ProfileKind::Heap => cfg!(feature = "dhat-heap"),
            ProfileKind::Thread | ProfileKind::Block => cfg!(target_os = "linux"),
        };
        assert_eq!(len > 0, written, "{} profile has {} bytes", kind, len);
    }

    #[cfg(target_os = "linux")]
    {
        let threads = fs::read_to_string(dir.path().join("thread.out")).unwrap();
        assert!(threads.starts_with("# live threads: "));
        let block = fs::read_to_string(dir.path().join("block.out")).unwrap();
        assert!(block.starts_with("# context switches per thread: "));
    }

    // The sampler is free again once the first session is closed
    let again = ProfileOptions::default().with_path(ProfileKind::Cpu, dir.path().join("cpu3.out"));
    drop(ProfileManager::start(again).unwrap());
    assert!(fs::metadata(dir.path().join("cpu3.out")).unwrap().len() > 0);
}

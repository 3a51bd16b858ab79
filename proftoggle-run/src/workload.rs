// SPDX-License-Identifier: Apache-2.0

//! A small CPU, allocation and lock-heavy workload to profile.

use crate::{Error, Result};
use log::debug;
use std::{
    collections::BTreeMap,
    hint::black_box,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub iterations: u64,
    pub checksum: u64,
}

/// Runs `threads` workers until `duration` elapses or `stop` is set.
///
/// Every worker hashes numbers, allocates short-lived buffers and
/// merges its results into a shared, contended table.
pub fn run(threads: u16, duration: Duration, stop: Arc<AtomicBool>) -> Result<Summary> {
    let table = Arc::new(Mutex::new(BTreeMap::<u64, u64>::new()));
    let deadline = Instant::now() + duration;

    let workers = (0..threads)
        .map(|id| {
            let table = Arc::clone(&table);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name(format!("worker-{}", id))
                .spawn(move || worker(u64::from(id), deadline, &stop, &table))
        })
        .collect::<std::io::Result<Vec<_>>>()?;

    let mut summary = Summary::default();
    for w in workers {
        summary.iterations += w
            .join()
            .map_err(|_| Error::Workload("worker panicked".to_string()))?;
    }

    let table = table
        .lock()
        .map_err(|_| Error::Workload("result table poisoned".to_string()))?;
    summary.checksum = table.values().fold(0u64, |acc, v| acc.wrapping_add(*v));
    Ok(summary)
}

fn worker(id: u64, deadline: Instant, stop: &AtomicBool, table: &Mutex<BTreeMap<u64, u64>>) -> u64 {
    let mut iterations = 0u64;

    while Instant::now() < deadline && !stop.load(Ordering::Relaxed) {
        let buf: Vec<u64> = (0..4096u64).map(|i| mix(id, i + iterations)).collect();
        let local = black_box(buf).iter().fold(0u64, |acc, v| acc ^ v);

        if let Ok(mut table) = table.lock() {
            *table.entry(local % 1024).or_default() += 1;
        }
        iterations += 1;
    }

    debug!("worker-{} finished after {} iterations", id, iterations);
    iterations
}

fn mix(a: u64, b: u64) -> u64 {
    let mut x = a.wrapping_mul(0x9e37_79b9_7f4a_7c15) ^ b;
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51_afd7_ed55_8ccd);
    x ^ (x >> 33)
}

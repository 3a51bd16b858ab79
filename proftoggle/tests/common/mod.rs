// SPDX-License-Identifier: Apache-2.0

use proftoggle::{Error, ProfileKind, Result, Runtime};
use std::{cell::RefCell, io::Write, rc::Rc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    StartCpu(i32),
    StopCpu,
    StartHeap,
    Collect,
    Snapshot(ProfileKind),
}

/// A runtime that records every call and writes a fixed payload.
#[derive(Debug, Default, Clone)]
pub struct Recorder {
    pub calls: Rc<RefCell<Vec<Call>>>,
    pub refuse_cpu: bool,
    pub refuse_heap: bool,
    pub failing_snapshot: Option<ProfileKind>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refusing_cpu(mut self) -> Self {
        self.refuse_cpu = true;
        self
    }

    pub fn refusing_heap(mut self) -> Self {
        self.refuse_heap = true;
        self
    }

    pub fn failing(mut self, kind: ProfileKind) -> Self {
        self.failing_snapshot = Some(kind);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }
}

impl Runtime for Recorder {
    fn start_cpu_profile(&mut self, frequency: i32) -> Result<()> {
        if self.refuse_cpu {
            return Err(Error::Profiling("cpu profiling already in use".to_string()));
        }
        self.calls.borrow_mut().push(Call::StartCpu(frequency));
        Ok(())
    }

    fn stop_cpu_profile(&mut self, out: &mut dyn Write) -> Result<()> {
        self.calls.borrow_mut().push(Call::StopCpu);
        out.write_all(b"cpu samples\n")?;
        Ok(())
    }

    fn start_heap_profile(&mut self) -> Result<()> {
        if self.refuse_heap {
            return Err(Error::Profiling("heap profiling already enabled".to_string()));
        }
        self.calls.borrow_mut().push(Call::StartHeap);
        Ok(())
    }

    fn collect_garbage(&mut self) {
        self.calls.borrow_mut().push(Call::Collect);
    }

    fn write_snapshot(&mut self, kind: ProfileKind, out: &mut dyn Write) -> Result<()> {
        self.calls.borrow_mut().push(Call::Snapshot(kind));
        if self.failing_snapshot == Some(kind) {
            return Err(Error::Unsupported(kind));
        }
        writeln!(out, "{} snapshot", kind)?;
        Ok(())
    }
}

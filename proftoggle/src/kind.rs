// SPDX-License-Identifier: Apache-2.0

use derive_more::Display;

/// The profile kinds a [`ProfileManager`](crate::ProfileManager) can toggle.
///
/// Slots are always processed in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum ProfileKind {
    #[display("CPU")]
    Cpu,
    #[display("heap")]
    Heap,
    #[display("thread-creation")]
    Thread,
    #[display("contention")]
    Block,
}

impl ProfileKind {
    pub const ALL: [ProfileKind; 4] = [
        ProfileKind::Cpu,
        ProfileKind::Heap,
        ProfileKind::Thread,
        ProfileKind::Block,
    ];

    /// Returns the command line option that enables this profile.
    pub fn flag_name(&self) -> &'static str {
        match self {
            ProfileKind::Cpu => "cpuprofile",
            ProfileKind::Heap => "heapprofile",
            ProfileKind::Thread => "threadprofile",
            ProfileKind::Block => "blockprofile",
        }
    }

    /// Returns the kind whose option is called `name`.
    pub fn from_flag_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.flag_name() == name)
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

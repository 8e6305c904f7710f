//! Kernel call table
//!
//! The kernel-call trap instruction carries an index into this table.
//! Entries are registered by mangled symbol name; loaders resolve a
//! guest module's imports against the table by exact string match and
//! patch `kc` instructions carrying the assigned index. Index assignment
//! is dense, in registration order. Registration happens before
//! execution starts; at runtime the table is effectively read-only.

use crate::state::ThreadState;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// A host-implemented guest OS function.
///
/// The callee reads its arguments from the PPC calling convention
/// registers (`r3..r10`, `f1..f13`) and writes its result to `r3`/`f1`.
pub type SyscallFn = fn(&mut ThreadState);

/// One syscall table entry
#[derive(Clone)]
pub struct KernelCall {
    /// Mangled symbol name the loader resolves against
    pub name: String,
    /// False for stub registrations that only reserve the name
    pub implemented: bool,
    pub call: SyscallFn,
}

#[derive(Default)]
struct Inner {
    entries: Vec<KernelCall>,
    by_name: HashMap<String, u32>,
}

/// The process-wide kernel call table
#[derive(Default)]
pub struct SyscallTable {
    inner: RwLock<Inner>,
}

impl SyscallTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name`, returning its index.
    ///
    /// Registration is idempotent: a duplicate name replaces the earlier
    /// binding at the same index.
    pub fn register(&self, name: &str, call: SyscallFn) -> u32 {
        self.register_entry(name, call, true)
    }

    /// Reserve `name` with a stub that only logs; `kci` stays 0 for
    /// imports resolved against it.
    pub fn register_stub(&self, name: &str) -> u32 {
        fn stub(_state: &mut ThreadState) {}
        self.register_entry(name, stub, false)
    }

    fn register_entry(&self, name: &str, call: SyscallFn, implemented: bool) -> u32 {
        let mut inner = self.inner.write();

        if let Some(&index) = inner.by_name.get(name) {
            debug!("replacing kernel function binding {} at index {}", name, index);
            inner.entries[index as usize] = KernelCall {
                name: name.to_string(),
                implemented,
                call,
            };
            return index;
        }

        let index = inner.entries.len() as u32;
        inner.entries.push(KernelCall {
            name: name.to_string(),
            implemented,
            call,
        });
        inner.by_name.insert(name.to_string(), index);
        index
    }

    /// Look up by index
    pub fn get(&self, index: u32) -> Option<KernelCall> {
        self.inner.read().entries.get(index as usize).cloned()
    }

    /// Look up an index by mangled name
    pub fn find(&self, name: &str) -> Option<u32> {
        self.inner.read().by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nop(_state: &mut ThreadState) {}
    fn nop2(_state: &mut ThreadState) {}

    #[test]
    fn test_dense_registration_order() {
        let table = SyscallTable::new();
        assert_eq!(table.register("OSGetTime", nop), 0);
        assert_eq!(table.register("OSGetTick", nop), 1);
        assert_eq!(table.register("DCZeroRange", nop), 2);
        assert_eq!(table.len(), 3);

        assert_eq!(table.find("OSGetTick"), Some(1));
        assert_eq!(table.get(2).unwrap().name, "DCZeroRange");
    }

    #[test]
    fn test_duplicate_name_replaces_binding() {
        let table = SyscallTable::new();
        let first = table.register("OSGetTime", nop);
        let second = table.register("OSGetTime", nop2);
        assert_eq!(first, second);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(first).unwrap().call as usize, nop2 as usize);
    }

    #[test]
    fn test_stub_registration() {
        let table = SyscallTable::new();
        let index = table.register_stub("GXInit");
        let entry = table.get(index).unwrap();
        assert!(!entry.implemented);

        // Upgrading a stub to a real implementation keeps the index
        assert_eq!(table.register("GXInit", nop), index);
        assert!(table.get(index).unwrap().implemented);
    }

    #[test]
    fn test_unknown_lookup() {
        let table = SyscallTable::new();
        assert!(table.get(0).is_none());
        assert!(table.find("nothing").is_none());
    }
}

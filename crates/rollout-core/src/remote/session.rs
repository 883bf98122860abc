//! Session name allocation for executors.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out session names that are unique for the lifetime of the namer.
///
/// Owned by whoever opens connections; there is no process-wide registry.
/// The SSH backend uses the name for its multiplexing control socket.
#[derive(Debug)]
pub struct SessionNamer {
    prefix: String,
    next: AtomicU64,
    issued: Mutex<HashSet<String>>,
}

impl Default for SessionNamer {
    fn default() -> Self {
        Self::new("rollout")
    }
}

impl SessionNamer {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
            issued: Mutex::new(HashSet::new()),
        }
    }

    pub fn next_name(&self) -> String {
        self.next_name_avoiding(|_| false)
    }

    /// Allocate a name, skipping any for which `in_use` returns true
    /// (e.g. a control socket left behind by another process).
    pub fn next_name_avoiding(&self, in_use: impl Fn(&str) -> bool) -> String {
        loop {
            let n = self.next.fetch_add(1, Ordering::Relaxed);
            let name = format!("{}-{}-{}", self.prefix, std::process::id(), n);
            if in_use(&name) {
                continue;
            }
            let mut issued = self.issued.lock().unwrap_or_else(|e| e.into_inner());
            if issued.insert(name.clone()) {
                return name;
            }
        }
    }

    /// Mark an externally chosen name as taken. Returns false if it already was.
    pub fn reserve(&self, name: &str) -> bool {
        let mut issued = self.issued.lock().unwrap_or_else(|e| e.into_inner());
        issued.insert(name.to_string())
    }

    pub fn issued_count(&self) -> usize {
        self.issued.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

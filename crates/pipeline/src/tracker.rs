//! Keyed LIFO tracker for interrupt state.
//!
//! Pops must mirror pushes exactly. A pop whose key does not match the top of
//! the stack means the host's begin/end calls are unbalanced, which would
//! silently corrupt render state, so it is a contract violation.

use std::fmt;

use tracing::error;

#[derive(Debug, Default)]
pub struct StackTracker<K, T> {
    entries: Vec<(K, T)>,
}

impl<K: PartialEq + fmt::Debug, T> StackTracker<K, T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, key: K, state: T) {
        self.entries.push((key, state));
    }

    /// Panics when the stack is empty or `key` is not the topmost entry.
    pub fn pop(&mut self, key: &K) -> T {
        match self.entries.last() {
            None => {
                error!(key = ?key, "pop on an empty state stack");
                panic!("pop with key {key:?} on an empty state stack");
            }
            Some((top, _)) if top != key => {
                let dump = self.dump();
                error!(key = ?key, top = ?top, stack = %dump, "mismatched state stack pop");
                panic!("pop with key {key:?} when {top:?} was on top\n{dump}");
            }
            Some(_) => {}
        }
        self.entries.pop().map(|(_, state)| state).unwrap()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Top-to-bottom key listing for panic messages.
    pub fn dump(&self) -> String {
        let mut out = String::from("stack contents (top to bottom):");
        for (key, _) in self.entries.iter().rev() {
            out.push_str(&format!("\n\t{key:?}"));
        }
        out
    }
}

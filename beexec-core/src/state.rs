//! In-memory key-value model mutated by the replay loop.

use crate::command::{Command, Operation};
use std::collections::HashMap;

/// Approximates the effect of applied commands on a key-value store
///
/// Only SET changes the map; GET and DELETE are accepted but leave it as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockState {
    entries: HashMap<String, Vec<u8>>,
}

impl MockState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, command: &Command) {
        if command.op == Operation::Set {
            self.entries
                .insert(command.key.clone(), command.value.clone());
        }
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

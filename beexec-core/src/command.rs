/*!
Command and trace types replayed by the executor.
*/

use crate::{framing, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Operation carried by a single command
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Set,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Get => write!(f, "GET"),
            Operation::Set => write!(f, "SET"),
            Operation::Delete => write!(f, "DELETE"),
        }
    }
}

/// One recorded key-value operation
///
/// Field order is part of the on-disk payload: the operation tag is encoded
/// first, then the key, then the value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub op: Operation,
    pub key: String,
    pub value: Vec<u8>,
}

impl Command {
    pub fn new<K, V>(op: Operation, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        Self {
            op,
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn get<K: Into<String>>(key: K) -> Self {
        Self::new(Operation::Get, key, Vec::new())
    }

    pub fn set<K: Into<String>, V: Into<Vec<u8>>>(key: K, value: V) -> Self {
        Self::new(Operation::Set, key, value)
    }

    pub fn delete<K: Into<String>>(key: K) -> Self {
        Self::new(Operation::Delete, key, Vec::new())
    }
}

/// Immutable, ordered sequence of commands loaded once before replay
///
/// # Example
/// ```rust
/// use beexec_core::{Command, CommandTrace};
///
/// let trace = CommandTrace::from(vec![Command::set("k1", "v1"), Command::get("k1")]);
/// assert_eq!(trace.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandTrace {
    commands: Vec<Command>,
}

impl CommandTrace {
    /// Load a trace from a log file produced by any file-backed strategy
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }

    /// Decode a trace from any reader holding a framed log
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let commands = framing::read_log(reader)?;
        Ok(Self { commands })
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Command> {
        self.commands.iter()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }
}

impl From<Vec<Command>> for CommandTrace {
    fn from(commands: Vec<Command>) -> Self {
        Self { commands }
    }
}

impl<'a> IntoIterator for &'a CommandTrace {
    type Item = &'a Command;
    type IntoIter = std::slice::Iter<'a, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

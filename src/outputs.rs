//! Persistence for the last deployed stack outputs
//!
//! Deploy overwrites the record, seed and teardown read it back, and a
//! successful teardown removes it. Tests substitute [`MemoryOutputsStore`].

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use trustbucket_config::{parse_stack_outputs, OutputsRecord, StackOutput};

pub trait OutputsStore: Send + Sync {
    /// Read the record; an absent record reads as empty
    fn read(&self) -> Result<OutputsRecord>;

    /// Replace the record with these outputs
    fn write(&self, outputs: &[StackOutput]) -> Result<()>;

    /// Delete the record; deleting an absent record succeeds
    fn remove(&self) -> Result<()>;

    /// Human-readable location for messages
    fn location(&self) -> String;
}

fn encode(outputs: &[StackOutput]) -> Result<String> {
    let mut json = serde_json::to_string_pretty(outputs).map_err(|source| Error::Parse {
        what: "stack outputs",
        source,
    })?;
    json.push('\n');
    Ok(json)
}

fn decode(json: &str) -> Result<OutputsRecord> {
    let outputs = parse_stack_outputs(json).map_err(|source| Error::Parse {
        what: "outputs record",
        source,
    })?;
    Ok(OutputsRecord::from_outputs(&outputs))
}

/// `outputs.json` on disk
#[derive(Debug, Clone)]
pub struct FileOutputsStore {
    path: PathBuf,
}

impl FileOutputsStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputsStore for FileOutputsStore {
    fn read(&self) -> Result<OutputsRecord> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => decode(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(OutputsRecord::default()),
            Err(e) => Err(Error::io("Failed to read", &self.path, e)),
        }
    }

    fn write(&self, outputs: &[StackOutput]) -> Result<()> {
        let json = encode(outputs)?;
        std::fs::write(&self.path, json).map_err(|e| Error::io("Failed to write", &self.path, e))
    }

    fn remove(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io("Failed to remove", &self.path, e)),
        }
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory record holding the same JSON a file would
#[derive(Debug, Default)]
pub struct MemoryOutputsStore {
    contents: Mutex<Option<String>>,
}

impl MemoryOutputsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outputs(outputs: &[StackOutput]) -> Result<Self> {
        let store = Self::new();
        store.write(outputs)?;
        Ok(store)
    }

    /// Raw JSON currently stored, if any
    pub fn contents(&self) -> Option<String> {
        self.contents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set(&self, value: Option<String>) {
        *self
            .contents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = value;
    }
}

impl OutputsStore for MemoryOutputsStore {
    fn read(&self) -> Result<OutputsRecord> {
        match self.contents() {
            Some(json) => decode(&json),
            None => Ok(OutputsRecord::default()),
        }
    }

    fn write(&self, outputs: &[StackOutput]) -> Result<()> {
        self.set(Some(encode(outputs)?));
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        self.set(None);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

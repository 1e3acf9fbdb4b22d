use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use engine_logging::engine_debug;
use purge_core::{decode_cursor, encode_cursor, CursorError, PartitionPlan, RunState};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("cursor directory missing or not writable: {0}")]
    CursorDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("stored cursor is unreadable: {0}")]
    Cursor(#[from] CursorError),
}

/// Where the resume cursor lives between processes.
pub trait CursorStore: Send {
    fn load(&self) -> Result<Option<RunState>, PersistError>;
    fn save(&mut self, state: &RunState) -> Result<(), PersistError>;
    /// Removes the cursor entirely; a later `load` returns `None`.
    fn clear(&mut self) -> Result<(), PersistError>;
}

/// Ensure the directory holding the cursor exists; create if missing.
pub fn ensure_cursor_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::CursorDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::CursorDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::CursorDir(e.to_string()))?;
    }
    Ok(())
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file then renaming.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        ensure_cursor_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// Cursor kept in a single small text file.
pub struct FileCursorStore {
    path: PathBuf,
    plan: PartitionPlan,
}

impl FileCursorStore {
    pub fn new(path: impl Into<PathBuf>, plan: PartitionPlan) -> Self {
        Self {
            path: path.into(),
            plan,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn split_path(&self) -> (PathBuf, String) {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let name = self
            .path
            .file_name()
            .map_or_else(|| "purge.cursor".to_string(), |n| n.to_string_lossy().into_owned());
        (dir, name)
    }
}

impl CursorStore for FileCursorStore {
    fn load(&self) -> Result<Option<RunState>, PersistError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(decode_cursor(&text, &self.plan)?))
    }

    fn save(&mut self, state: &RunState) -> Result<(), PersistError> {
        let (dir, name) = self.split_path();
        let written = AtomicFileWriter::new(dir).write(&name, &encode_cursor(state, &self.plan))?;
        engine_debug!("cursor saved to {:?}", written);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), PersistError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-process cursor. Clones share the same slot, which lets a test play the
/// part of a restarted process reading what the previous one saved.
#[derive(Clone)]
pub struct MemoryCursorStore {
    plan: PartitionPlan,
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryCursorStore {
    pub fn new(plan: PartitionPlan) -> Self {
        Self {
            plan,
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// The encoded cursor as it would appear on disk.
    pub fn raw(&self) -> Option<String> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl CursorStore for MemoryCursorStore {
    fn load(&self) -> Result<Option<RunState>, PersistError> {
        match self.raw() {
            Some(text) => Ok(Some(decode_cursor(&text, &self.plan)?)),
            None => Ok(None),
        }
    }

    fn save(&mut self, state: &RunState) -> Result<(), PersistError> {
        let text = encode_cursor(state, &self.plan);
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(text);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), PersistError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

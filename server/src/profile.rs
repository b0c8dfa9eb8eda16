//! Persistence bridge for a room creator's option preferences
//!
//! When a recognized user creates a room, their saved option values prime the
//! room's cache before the first schema build. When they leave, the cache is
//! written back so the next room they open starts from the same settings.

use crate::error::ProfileError;
use log::debug;
use shared::OptionValue;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

pub type SavedOptions = HashMap<String, OptionValue>;

pub trait ProfileStore: Send + Sync {
    fn load_saved_options(&self, user_id: &str) -> Result<SavedOptions, ProfileError>;

    fn save_options(&mut self, user_id: &str, values: &SavedOptions) -> Result<(), ProfileError>;
}

/// Keeps preferences for the lifetime of the process
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profiles: HashMap<String, SavedOptions>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileStore for MemoryProfileStore {
    fn load_saved_options(&self, user_id: &str) -> Result<SavedOptions, ProfileError> {
        Ok(self.profiles.get(user_id).cloned().unwrap_or_default())
    }

    fn save_options(&mut self, user_id: &str, values: &SavedOptions) -> Result<(), ProfileError> {
        self.profiles.insert(user_id.to_string(), values.clone());
        Ok(())
    }
}

/// Stores one bincode file per user in a directory
#[derive(Debug)]
pub struct FileProfileStore {
    dir: PathBuf,
}

impl FileProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ProfileError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, user_id: &str) -> PathBuf {
        let file_name: String = user_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.bin", file_name))
    }
}

impl ProfileStore for FileProfileStore {
    fn load_saved_options(&self, user_id: &str) -> Result<SavedOptions, ProfileError> {
        let path = self.path_for(user_id);
        match fs::read(&path) {
            Ok(bytes) => Ok(bincode::deserialize(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No saved options for {}", user_id);
                Ok(SavedOptions::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn save_options(&mut self, user_id: &str, values: &SavedOptions) -> Result<(), ProfileError> {
        let bytes = bincode::serialize(values)?;
        let path = self.path_for(user_id);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

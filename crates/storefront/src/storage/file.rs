//! Directory-backed storage namespace.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::{ChangeFeed, ExternalChanges, Storage, StorageError};

/// Stores each key as `<dir>/<key>.json`.
///
/// Writes go to a temporary file that is renamed over the target, so a reader
/// never sees a half-written value. Change events are shared between handles
/// created with [`FileStorage::attach`] in this process only.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
    feed: ChangeFeed,
}

impl FileStorage {
    /// Open (and create if needed) a storage directory.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        tracing::debug!(dir = %dir.display(), "Opened file storage");
        Ok(Self {
            dir,
            feed: ChangeFeed::new(),
        })
    }

    /// Open another handle on the same directory.
    #[must_use]
    pub fn attach(&self) -> Self {
        Self {
            dir: self.dir.clone(),
            feed: self.feed.attach(),
        }
    }

    /// Directory holding the stored keys.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are chosen by the application; keep them inside the directory.
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        self.feed.publish(Some(key));
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => {
                self.feed.publish(Some(key));
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn subscribe(&self) -> ExternalChanges {
        self.feed.subscribe()
    }
}

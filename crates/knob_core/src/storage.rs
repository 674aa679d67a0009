//! String-keyed storage backends

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage key '{0}' is not valid for this backend")]
    InvalidKey(String),

    #[error("storage io failed for key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Blocking key-value text store. A missing key is a normal first-run
/// state, not an error.
pub trait Storage {
    fn read_string(&self, key: &str) -> Option<String>;
    fn write_string(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    /// Deleting a missing key succeeds.
    fn delete_key(&mut self, key: &str) -> Result<(), StorageError>;
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn read_string(&self, key: &str) -> Option<String> {
        (**self).read_string(key)
    }

    fn write_string(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).write_string(key, value)
    }

    fn delete_key(&mut self, key: &str) -> Result<(), StorageError> {
        (**self).delete_key(key)
    }
}

/// In-process storage, lost on exit.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn read_string(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn write_string(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn delete_key(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_delete() {
        let mut storage = MemoryStorage::new();
        assert_eq!(storage.read_string("slot"), None);

        storage.write_string("slot", "{}").unwrap();
        assert_eq!(storage.read_string("slot").as_deref(), Some("{}"));

        storage.delete_key("slot").unwrap();
        storage.delete_key("slot").unwrap();
        assert!(storage.is_empty());
    }
}

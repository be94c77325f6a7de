//! JSON-file persistence for finished transcripts.
//!
//! The store is deliberately outside the pipeline: the orchestrator returns
//! a [`Transcript`] and the caller decides whether to keep it. Entries are
//! ordered newest first and capped so the file stays a reasonable size.

use crate::transcript::Transcript;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

const MAX_ENTRIES: usize = 500;

#[derive(Debug, Serialize, Deserialize, Default)]
struct StoreData {
    transcripts: Vec<Transcript>,
}

/// Manages loading and saving of transcripts.
pub struct TranscriptStore {
    data: RwLock<StoreData>,
    file_path: PathBuf,
}

impl TranscriptStore {
    /// Create a store backed by `transcripts.json` inside `data_dir`.
    pub fn new(data_dir: PathBuf) -> Self {
        let file_path = data_dir.join("transcripts.json");

        if let Some(parent) = file_path.parent() {
            let _ = fs::create_dir_all(parent);
        }

        // Load existing transcripts or start empty.
        let data = Self::load_from_file(&file_path).unwrap_or_default();

        Self {
            data: RwLock::new(data),
            file_path,
        }
    }

    fn load_from_file(file_path: &PathBuf) -> Option<StoreData> {
        let content = fs::read_to_string(file_path).ok()?;
        serde_json::from_str(&content).ok()
    }

    fn save(&self) -> Result<(), String> {
        let data = self
            .data
            .read()
            .map_err(|e| format!("Failed to read transcripts: {}", e))?;

        let content = serde_json::to_string_pretty(&*data)
            .map_err(|e| format!("Failed to serialize transcripts: {}", e))?;

        fs::write(&self.file_path, content)
            .map_err(|e| format!("Failed to write transcript file: {}", e))?;

        Ok(())
    }

    /// Add a transcript (newest first) and persist.
    pub fn add(&self, transcript: Transcript) -> Result<(), String> {
        {
            let mut data = self
                .data
                .write()
                .map_err(|e| format!("Failed to write transcripts: {}", e))?;

            data.transcripts.insert(0, transcript);

            if data.transcripts.len() > MAX_ENTRIES {
                data.transcripts.truncate(MAX_ENTRIES);
            }
        }
        self.save()
    }

    /// Look up a transcript by id.
    pub fn get(&self, id: &str) -> Result<Option<Transcript>, String> {
        let data = self
            .data
            .read()
            .map_err(|e| format!("Failed to read transcripts: {}", e))?;

        Ok(data.transcripts.iter().find(|t| t.id == id).cloned())
    }

    /// Get all transcripts (newest first), optionally limited.
    pub fn get_all(&self, limit: Option<usize>) -> Result<Vec<Transcript>, String> {
        let data = self
            .data
            .read()
            .map_err(|e| format!("Failed to read transcripts: {}", e))?;

        let transcripts = match limit {
            Some(n) => data.transcripts.iter().take(n).cloned().collect(),
            None => data.transcripts.clone(),
        };

        Ok(transcripts)
    }

    /// Delete a transcript by id. Returns whether anything was removed.
    pub fn delete(&self, id: &str) -> Result<bool, String> {
        let deleted = {
            let mut data = self
                .data
                .write()
                .map_err(|e| format!("Failed to write transcripts: {}", e))?;

            let initial_len = data.transcripts.len();
            data.transcripts.retain(|t| t.id != id);
            data.transcripts.len() < initial_len
        };

        if deleted {
            self.save()?;
        }

        Ok(deleted)
    }

    /// Clear all stored transcripts.
    pub fn clear(&self) -> Result<(), String> {
        {
            let mut data = self
                .data
                .write()
                .map_err(|e| format!("Failed to write transcripts: {}", e))?;
            data.transcripts.clear();
        }
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Segment;

    fn sample_transcript(title: &str) -> Transcript {
        Transcript::assemble(
            "https://example.com/v",
            title,
            vec![Segment::new(0.0, 1.5, "a line of dialogue")],
        )
        .unwrap()
    }

    #[test]
    fn test_add_get_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path().to_path_buf());

        let t = sample_transcript("Scene 1");
        let id = t.id.clone();
        store.add(t).unwrap();

        let loaded = store.get(&id).unwrap().unwrap();
        assert_eq!(loaded.title, "Scene 1");

        assert!(store.delete(&id).unwrap());
        assert!(store.get(&id).unwrap().is_none());
        assert!(!store.delete(&id).unwrap());
    }

    #[test]
    fn test_newest_first_and_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path().to_path_buf());

        store.add(sample_transcript("older")).unwrap();
        store.add(sample_transcript("newer")).unwrap();

        let all = store.get_all(None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "newer");

        let limited = store.get_all(Some(1)).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].title, "newer");
    }

    #[test]
    fn test_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = TranscriptStore::new(dir.path().to_path_buf());
            store.add(sample_transcript("kept")).unwrap();
        }

        let reopened = TranscriptStore::new(dir.path().to_path_buf());
        let all = reopened.get_all(None).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "kept");
    }

    #[test]
    fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path().to_path_buf());
        store.add(sample_transcript("gone")).unwrap();
        store.clear().unwrap();
        assert!(store.get_all(None).unwrap().is_empty());
    }
}

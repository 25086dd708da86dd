//! `LocalStore`: passages as files in one directory.
//!
//! ```text
//! <dir>/
//!   ├── 3f1c…e2.json   PassageRecord (pretty JSON)
//!   └── 3f1c…e2.mp3    audio
//! ```
//!
//! Both files are written under a `.tmp` name and renamed into place, audio
//! first, so a record file only ever appears once its audio is complete.
//! If the record cannot be written the audio is removed again.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use crate::storage::record::{PassageRecord, PassageSummary};
use crate::storage::store::{AlignmentStore, StorageError};

pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn audio_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.mp3"))
    }

    async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| io_error(format!("writing {}", tmp.display()), e))?;
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_error(format!("renaming into {}", path.display()), e));
        }
        Ok(())
    }

    /// Read a file belonging to passage `id`, mapping a missing file to
    /// [`StorageError::NotFound`].
    async fn read(&self, id: Uuid, path: &Path) -> Result<Vec<u8>, StorageError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound(id)),
            Err(e) => Err(io_error(format!("reading {}", path.display()), e)),
        }
    }
}

fn io_error(context: String, source: std::io::Error) -> StorageError {
    StorageError::Io { context, source }
}

#[async_trait]
impl AlignmentStore for LocalStore {
    async fn persist(&self, record: &PassageRecord, audio: &[u8]) -> Result<Uuid, StorageError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(format!("creating {}", self.dir.display()), e))?;

        let json = serde_json::to_vec_pretty(record).map_err(|source| StorageError::Json {
            context: format!("serializing passage {}", record.id),
            source,
        })?;

        let audio_path = self.audio_path(record.id);
        Self::write_atomic(&audio_path, audio).await?;
        if let Err(e) = Self::write_atomic(&self.record_path(record.id), &json).await {
            if let Err(cleanup) = tokio::fs::remove_file(&audio_path).await {
                log::warn!(
                    "storage: could not remove orphaned audio {}: {cleanup}",
                    audio_path.display()
                );
            }
            return Err(e);
        }

        log::info!(
            "storage: persisted passage {} ({} audio bytes) in {}",
            record.id,
            audio.len(),
            self.dir.display()
        );
        Ok(record.id)
    }

    async fn retrieve(&self, id: Uuid) -> Result<PassageRecord, StorageError> {
        let bytes = self.read(id, &self.record_path(id)).await?;
        serde_json::from_slice(&bytes).map_err(|source| StorageError::Json {
            context: format!("reading passage {id}"),
            source,
        })
    }

    async fn audio(&self, id: Uuid) -> Result<Vec<u8>, StorageError> {
        self.read(id, &self.audio_path(id)).await
    }

    async fn list(&self) -> Result<Vec<PassageSummary>, StorageError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(format!("listing {}", self.dir.display()), e)),
        };

        let mut summaries = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error(format!("listing {}", self.dir.display()), e))?
        {
            let path = entry.path();
            let Some(id) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(".json"))
                .and_then(|stem| Uuid::parse_str(stem).ok())
            else {
                continue;
            };

            match self.retrieve(id).await {
                Ok(record) => summaries.push(record.summary()),
                Err(e) => log::warn!("storage: skipping unreadable passage {id}: {e}"),
            }
        }

        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::BilingualAlignment;
    use chrono::{Duration, Utc};
    use tempfile::tempdir;

    fn record(text: &str, age_secs: i64) -> PassageRecord {
        PassageRecord {
            id: Uuid::new_v4(),
            passage_text: text.into(),
            vocabulary: Vec::new(),
            alignment: BilingualAlignment::empty(),
            generation_prompt: "prompt".into(),
            analysis_request: serde_json::json!({"indexed_word_segments": []}),
            raw_analysis_response: "{}".into(),
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[tokio::test]
    async fn persist_then_retrieve_and_audio() {
        let dir = tempdir().expect("temp dir");
        let store = LocalStore::new(dir.path().join("passages"));
        let rec = record("Che, ¿qué onda?", 0);

        let id = store.persist(&rec, b"ID3audio").await.unwrap();
        assert_eq!(id, rec.id);

        assert_eq!(store.retrieve(id).await.unwrap(), rec);
        assert_eq!(store.audio(id).await.unwrap(), b"ID3audio");
        assert!(dir.path().join("passages").join(format!("{id}.mp3")).exists());
        assert!(!dir.path().join("passages").join(format!("{id}.json.tmp")).exists());
    }

    #[tokio::test]
    async fn failed_record_write_removes_audio() {
        let dir = tempdir().expect("temp dir");
        let store = LocalStore::new(dir.path());
        let rec = record("sin registro", 0);

        // A directory in the record's place makes the final rename fail.
        let blocker = dir.path().join(format!("{}.json", rec.id));
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("keep"), "x").unwrap();

        let err = store.persist(&rec, b"ID3audio").await.unwrap_err();

        assert!(matches!(err, StorageError::Io { .. }));
        assert!(!dir.path().join(format!("{}.mp3", rec.id)).exists());
        assert!(!dir.path().join(format!("{}.json.tmp", rec.id)).exists());
        assert!(matches!(store.audio(rec.id).await, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let dir = tempdir().expect("temp dir");
        let store = LocalStore::new(dir.path());
        let id = Uuid::new_v4();

        assert!(matches!(store.retrieve(id).await, Err(StorageError::NotFound(x)) if x == id));
        assert!(matches!(store.audio(id).await, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn list_is_newest_first_and_skips_junk() {
        let dir = tempdir().expect("temp dir");
        let store = LocalStore::new(dir.path());

        let old = record("viejo", 120);
        let new = record("nuevo", 0);
        store.persist(&old, b"a").await.unwrap();
        store.persist(&new, b"b").await.unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        std::fs::write(dir.path().join(format!("{}.json", Uuid::new_v4())), "not json").unwrap();

        let listed = store.list().await.unwrap();
        let texts: Vec<&str> = listed.iter().map(|s| s.passage_text.as_str()).collect();
        assert_eq!(texts, vec!["nuevo", "viejo"]);
    }

    #[tokio::test]
    async fn list_of_missing_dir_is_empty() {
        let dir = tempdir().expect("temp dir");
        let store = LocalStore::new(dir.path().join("never-created"));
        assert!(store.list().await.unwrap().is_empty());
    }
}

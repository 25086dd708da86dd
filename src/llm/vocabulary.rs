//! Vocabulary items sent to the analysis model, and the user's phrase book.
//!
//! [`VocabularyItem`]s are what the model matches against the passage.  Ids
//! are opaque: the analysis echoes them back in `vocabulary_id`, and we only
//! ever compare them.
//!
//! [`PhraseBook`] persists the phrases a learner is working on as JSON in
//! the platform-appropriate config directory:
//!
//! | Platform | Path |
//! |----------|------|
//! | Windows  | `%APPDATA%\aligned-reader\phrases.json` |
//! | macOS    | `~/Library/Application Support/aligned-reader/phrases.json` |
//! | Linux    | `~/.config/aligned-reader/phrases.json` |

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::AppPaths;

// ---------------------------------------------------------------------------
// VocabularyId / VocabularyItem
// ---------------------------------------------------------------------------

/// Identifier of a vocabulary entry: an integer or a string on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VocabularyId {
    Number(i64),
    Text(String),
}

impl fmt::Display for VocabularyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VocabularyId::Number(n) => write!(f, "{n}"),
            VocabularyId::Text(s) => f.write_str(s),
        }
    }
}

impl From<usize> for VocabularyId {
    fn from(n: usize) -> Self {
        VocabularyId::Number(n as i64)
    }
}

/// One vocabulary entry as sent to the analysis model (`{"id", "text"}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyItem {
    pub id: VocabularyId,
    #[serde(rename = "text")]
    pub word: String,
}

/// Build vocabulary items from plain words, assigning positional integer ids.
///
/// Entries are trimmed; blank entries are dropped before numbering.
pub fn vocabulary_from_words<S: AsRef<str>>(words: &[S]) -> Vec<VocabularyItem> {
    words
        .iter()
        .map(|w| w.as_ref().trim())
        .filter(|w| !w.is_empty())
        .enumerate()
        .map(|(i, word)| VocabularyItem {
            id: VocabularyId::from(i),
            word: word.to_string(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// PhraseError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PhraseError {
    #[error("phrase book I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("phrase book {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no phrase with id {0}")]
    NotFound(Uuid),

    #[error("phrase text must not be empty")]
    EmptyText,
}

// ---------------------------------------------------------------------------
// PhraseEntry
// ---------------------------------------------------------------------------

/// A phrase the learner wants to practise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseEntry {
    pub id: Uuid,
    pub text: String,
    #[serde(default)]
    pub translation: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update for [`PhraseBook::update`].  `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct PhraseUpdate {
    pub text: Option<String>,
    pub translation: Option<String>,
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// PhraseBook
// ---------------------------------------------------------------------------

/// JSON-backed list of [`PhraseEntry`] values.
///
/// Every mutation is written to disk before it returns, so the file always
/// reflects the last successful call.
pub struct PhraseBook {
    entries: Vec<PhraseEntry>,
    path: PathBuf,
}

impl PhraseBook {
    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Load the phrase book from the platform config directory.
    pub fn load_or_default() -> Result<Self, PhraseError> {
        Self::load_from(AppPaths::new().phrases_file)
    }

    /// Load from an explicit path; a missing file is an empty book.
    pub fn load_from(path: PathBuf) -> Result<Self, PhraseError> {
        let entries = Self::load_entries(&path)?;
        Ok(Self { entries, path })
    }

    fn load_entries(path: &Path) -> Result<Vec<PhraseEntry>, PhraseError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(path).map_err(|source| PhraseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| PhraseError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Add a phrase and persist.
    pub fn add(
        &mut self,
        text: &str,
        translation: Option<String>,
        notes: Option<String>,
    ) -> Result<PhraseEntry, PhraseError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PhraseError::EmptyText);
        }
        let now = Utc::now();
        let entry = PhraseEntry {
            id: Uuid::new_v4(),
            text: text.to_string(),
            translation,
            notes,
            created_at: now,
            updated_at: now,
        };
        self.entries.push(entry.clone());
        self.save()?;
        Ok(entry)
    }

    /// Apply `update` to the phrase with `id` and persist.
    pub fn update(&mut self, id: Uuid, update: PhraseUpdate) -> Result<PhraseEntry, PhraseError> {
        if update.text.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(PhraseError::EmptyText);
        }
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(PhraseError::NotFound(id))?;

        if let Some(text) = update.text {
            entry.text = text.trim().to_string();
        }
        if update.translation.is_some() {
            entry.translation = update.translation;
        }
        if update.notes.is_some() {
            entry.notes = update.notes;
        }
        entry.updated_at = Utc::now();

        let updated = entry.clone();
        self.save()?;
        Ok(updated)
    }

    /// Remove the phrase with `id` and persist.
    pub fn remove(&mut self, id: Uuid) -> Result<(), PhraseError> {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        if self.entries.len() == before {
            return Err(PhraseError::NotFound(id));
        }
        self.save()
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// All phrases, newest first.
    pub fn list(&self) -> Vec<PhraseEntry> {
        let mut sorted = self.entries.clone();
        sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sorted
    }

    /// Phrase texts in insertion order, ready for [`vocabulary_from_words`].
    pub fn words(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.text.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    fn save(&self) -> Result<(), PhraseError> {
        let io_err = |source| PhraseError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let data = serde_json::to_string_pretty(&self.entries).map_err(|source| PhraseError::Json {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, data).map_err(io_err)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Whole-document access to the json files of the data directory.
//!
//! Every file name is derived from a [`Document`], which is either one of the two
//! configured documents or a bounds checked [`SplitIndex`]. Nothing read from a
//! request ever becomes part of a path.

use std::io;
use std::path::{Path, PathBuf};

use json_depot_api::api::{item_count, InvalidSplitIndex, SplitIndex};
use serde_json::Value;

use crate::config::Config;

/// The logical names of all documents the store knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Document {
    Primary,
    Secondary,
    Split(SplitIndex),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    InvalidSplit(#[from] InvalidSplitIndex),
    #[error("Split count must be between 1 and 20, got {0}")]
    InvalidSplitCount(usize),
    #[error("Failed to read {file}: file not found")]
    NotFound { file: String },
    #[error("Failed to read {file}: {source}")]
    Read { file: String, source: io::Error },
    #[error("Failed to parse {file}: {source}")]
    Parse {
        file: String,
        source: serde_json::Error,
    },
    #[error("Failed to write {file}: {source}")]
    Write { file: String, source: io::Error },
    #[error("Failed to serialize {file}: {source}")]
    Serialize {
        file: String,
        source: serde_json::Error,
    },
    #[error("Failed to list {}: {source}", .dir.display())]
    List { dir: PathBuf, source: io::Error },
    #[error("Cannot split {file}: document is neither an array nor an object")]
    NotSplittable { file: String },
}

/// A split document written by [`FileStore::split`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSummary {
    pub index: SplitIndex,
    pub file: String,
    pub items: usize,
}

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    primary: String,
    secondary: String,
    split_base: String,
}

impl FileStore {
    pub fn new(
        dir: impl Into<PathBuf>,
        primary: impl Into<String>,
        secondary: impl Into<String>,
        split_base: impl Into<String>,
    ) -> Self {
        FileStore {
            dir: dir.into(),
            primary: primary.into(),
            secondary: secondary.into(),
            split_base: split_base.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.data_dir,
            &config.primary_file,
            &config.secondary_file,
            &config.split_base,
        )
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(&self, document: Document) -> String {
        match document {
            Document::Primary => self.primary.clone(),
            Document::Secondary => self.secondary.clone(),
            Document::Split(index) => split_file_name(&self.split_base, index),
        }
    }

    /// The name `split` uses for part `index` of `source`, based on the source file's stem.
    ///
    /// With the default names, the primary document's parts are the ones served as
    /// [`Document::Split`].
    pub fn split_output_name(&self, source: Document, index: SplitIndex) -> String {
        let file = self.file_name(source);
        let stem = Path::new(&file)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(file.as_str());
        split_file_name(stem, index)
    }

    /// Human readable form of the split file names, e.g. `riot-output_split_<n>.json`.
    pub fn split_pattern(&self) -> String {
        format!("{}_split_<n>.json", self.split_base)
    }

    /// Inverse of [`FileStore::file_name`] for split documents.
    pub fn split_index_of(&self, file_name: &str) -> Option<SplitIndex> {
        let number = file_name
            .strip_prefix(self.split_base.as_str())?
            .strip_prefix("_split_")?
            .strip_suffix(".json")?;
        // Reject signs and leading zeros, they would not round-trip through `file_name`.
        if number.starts_with(['+', '-', '0']) {
            return None;
        }
        SplitIndex::new(number.parse().ok()?)
    }

    pub async fn read(&self, document: Document) -> Result<Value, StoreError> {
        self.read_file(self.file_name(document)).await
    }

    async fn read_file(&self, file: String) -> Result<Value, StoreError> {
        log::debug!(file:display = file; "reading document");
        let contents = match tokio::fs::read(self.dir.join(&file)).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound { file })
            }
            Err(source) => return Err(StoreError::Read { file, source }),
        };
        serde_json::from_slice(&contents).map_err(|source| StoreError::Parse { file, source })
    }

    /// Replaces the document with the pretty printed `value`.
    pub async fn write(&self, document: Document, value: &Value) -> Result<(), StoreError> {
        self.write_file(self.file_name(document), value).await
    }

    async fn write_file(&self, file: String, value: &Value) -> Result<(), StoreError> {
        let contents = match serde_json::to_vec_pretty(value) {
            Ok(contents) => contents,
            Err(source) => return Err(StoreError::Serialize { file, source }),
        };
        log::debug!(file:display = file, bytes = contents.len(); "writing document");
        tokio::fs::write(self.dir.join(&file), contents)
            .await
            .map_err(|source| StoreError::Write { file, source })
    }

    /// Validates `index` before any filesystem access, then reads the split document.
    pub async fn read_split(&self, index: i64) -> Result<(SplitIndex, Value), StoreError> {
        let index = SplitIndex::try_from(index)?;
        let data = self.read(Document::Split(index)).await?;
        Ok((index, data))
    }

    /// Names of all `.json` files directly inside the data directory, sorted.
    pub async fn list_json_files(&self) -> Result<Vec<String>, StoreError> {
        let list_err = |source: io::Error| StoreError::List {
            dir: self.dir.clone(),
            source,
        };
        let mut files = Vec::new();
        let mut rd = tokio::fs::read_dir(&self.dir).await.map_err(list_err)?;
        while let Some(entry) = rd.next_entry().await.map_err(list_err)? {
            if entry.file_type().await.map_err(list_err)?.is_dir() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                log::trace!(path:debug = entry.path(); "skipping non utf-8 file name");
                continue;
            };
            if name.ends_with(".json") {
                files.push(name);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Partitions `source` into `count` split documents of (nearly) equal size.
    ///
    /// Parts are named after the source file, see [`FileStore::split_output_name`],
    /// so splitting one document never overwrites the splits of the other.
    ///
    /// Arrays are cut into consecutive runs of items, objects into consecutive
    /// runs of keys in document order. Trailing splits which would be empty are
    /// not written, so fewer than `count` summaries may be returned.
    pub async fn split(
        &self,
        source: Document,
        count: usize,
    ) -> Result<Vec<SplitSummary>, StoreError> {
        if !(usize::from(SplitIndex::MIN)..=usize::from(SplitIndex::MAX)).contains(&count) {
            return Err(StoreError::InvalidSplitCount(count));
        }
        let parts: Vec<Value> = match self.read(source).await? {
            Value::Array(items) => {
                let size = items.len().div_ceil(count).max(1);
                items
                    .chunks(size)
                    .map(|chunk| Value::Array(chunk.to_vec()))
                    .collect()
            }
            Value::Object(map) => {
                let entries: Vec<(String, Value)> = map.into_iter().collect();
                let size = entries.len().div_ceil(count).max(1);
                entries
                    .chunks(size)
                    .map(|chunk| Value::Object(chunk.iter().cloned().collect()))
                    .collect()
            }
            _ => {
                return Err(StoreError::NotSplittable {
                    file: self.file_name(source),
                })
            }
        };

        let mut summaries = Vec::with_capacity(parts.len());
        for (index, part) in SplitIndex::all().zip(parts) {
            let file = self.split_output_name(source, index);
            self.write_file(file.clone(), &part).await?;
            let summary = SplitSummary {
                index,
                file,
                items: item_count(&part),
            };
            log::info!(file:display = summary.file, items = summary.items; "wrote split");
            summaries.push(summary);
        }
        Ok(summaries)
    }
}

fn split_file_name(base: &str, index: SplitIndex) -> String {
    format!("{base}_split_{index}.json")
}

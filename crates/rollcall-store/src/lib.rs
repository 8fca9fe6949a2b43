//! rollcall-store — File persistence for the enrolled gallery.
//!
//! A store directory holds three files:
//! - `gallery.json`: every enrolled person with their photos, embeddings and
//!   quality reports, replaced atomically on each save;
//! - `audit.jsonl`: one [`AuditRecord`] per assessed enrollment photo;
//! - `failures.jsonl`: one [`FailedRegistration`] per rejected photo.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rollcall_core::{Gallery, GateDecision, PersonRecord, QualityReport};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

const GALLERY_FILE: &str = "gallery.json";
const AUDIT_FILE: &str = "audit.jsonl";
const FAILURES_FILE: &str = "failures.jsonl";
const STORE_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("corrupt store file {path}: {message}")]
    Corrupt { path: PathBuf, message: String },
}

/// Persistence of the enrolled population.
pub trait GalleryStore {
    fn load(&self) -> Result<Gallery, StoreError>;
    fn save(&self, gallery: &Gallery) -> Result<(), StoreError>;
}

/// Quality audit of one assessed enrollment photo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub person_id: String,
    pub photo_path: String,
    pub overall_quality: f64,
    pub details: QualityReport,
    pub decision: GateDecision,
    /// Rendered text report.
    pub report: String,
    pub created_at: DateTime<Utc>,
}

/// A photo that could not be enrolled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedRegistration {
    pub person_id: String,
    pub name: String,
    pub photo_path: String,
    pub overall_quality: f64,
    pub reason: String,
    pub report: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct GalleryFileRef<'a> {
    version: u32,
    people: Vec<&'a PersonRecord>,
}

#[derive(Deserialize)]
struct GalleryFile {
    version: u32,
    people: Vec<PersonRecord>,
}

/// Store directory resolved from `XDG_DATA_HOME` (or `~/.local/share`).
pub fn default_store_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("rollcall")
}

/// JSON files under one directory.
#[derive(Debug, Clone)]
pub struct JsonGalleryStore {
    dir: PathBuf,
}

impl JsonGalleryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn gallery_path(&self) -> PathBuf {
        self.dir.join(GALLERY_FILE)
    }

    pub fn audit_path(&self) -> PathBuf {
        self.dir.join(AUDIT_FILE)
    }

    pub fn failures_path(&self) -> PathBuf {
        self.dir.join(FAILURES_FILE)
    }

    pub fn append_audit(&self, record: &AuditRecord) -> Result<(), StoreError> {
        append_line(&self.audit_path(), record)
    }

    /// Audit records in the order they were appended.
    pub fn audit_records(&self) -> Result<Vec<AuditRecord>, StoreError> {
        read_lines(&self.audit_path())
    }

    pub fn append_failure(&self, failure: &FailedRegistration) -> Result<(), StoreError> {
        append_line(&self.failures_path(), failure)
    }

    pub fn failures(&self) -> Result<Vec<FailedRegistration>, StoreError> {
        read_lines(&self.failures_path())
    }
}

impl GalleryStore for JsonGalleryStore {
    /// A missing gallery file is an empty gallery.
    fn load(&self) -> Result<Gallery, StoreError> {
        let path = self.gallery_path();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no gallery file, starting empty");
            return Ok(Gallery::new());
        }

        let data = fs::read(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        let file: GalleryFile = serde_json::from_slice(&data).map_err(|err| StoreError::Corrupt {
            path: path.clone(),
            message: format!("invalid gallery contents: {err}"),
        })?;
        if file.version != STORE_VERSION {
            return Err(StoreError::Corrupt {
                path,
                message: format!("unsupported store version {}", file.version),
            });
        }

        let gallery = Gallery::from_records(file.people).map_err(|err| StoreError::Corrupt {
            path: path.clone(),
            message: err.to_string(),
        })?;
        tracing::debug!(path = %path.display(), people = gallery.len(), "gallery loaded");
        Ok(gallery)
    }

    fn save(&self, gallery: &Gallery) -> Result<(), StoreError> {
        let path = self.gallery_path();
        let file = GalleryFileRef {
            version: STORE_VERSION,
            people: gallery.records(),
        };
        let bytes = serde_json::to_vec_pretty(&file).map_err(|source| StoreError::Serialize {
            path: path.clone(),
            source,
        })?;
        write_atomically(&path, &bytes)?;
        tracing::info!(path = %path.display(), people = gallery.len(), "gallery saved");
        Ok(())
    }
}

fn ensure_parent(path: &Path) -> Result<&Path, StoreError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|source| StoreError::Io {
        path: parent.to_path_buf(),
        source,
    })?;
    Ok(parent)
}

/// Write through a temp file in the same directory, then rename over `path`.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let parent = ensure_parent(path)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|err| io_err(err.error))?;
    Ok(())
}

fn append_line<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    ensure_parent(path)?;
    let mut line = serde_json::to_string(value).map_err(|source| StoreError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    line.push('\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    file.write_all(line.as_bytes()).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).map_err(|err| StoreError::Corrupt {
                path: path.to_path_buf(),
                message: format!("line {}: {err}", n + 1),
            })
        })
        .collect()
}

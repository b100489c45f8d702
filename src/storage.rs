//! Persistence of finished documents to user-visible storage.
//!
//! Two strategies exist and exactly one is chosen per [`Config`]:
//!
//! - [`ScopedStorage`] registers the file with a [`DocumentIndex`] as a
//!   pending entry, writes through the index, then publishes the entry.
//! - [`DirectStorage`] copies the file straight into a public directory,
//!   overwriting any file with the same name.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::config::{Config, SCOPED_STORAGE_MIN_VERSION};
use crate::PDF_MIME_TYPE;

/// Name of the manifest kept at the root of a [`DirectoryIndex`].
pub const INDEX_MANIFEST: &str = ".surfacepdf-index.json";

/// Errors that can occur while persisting a document.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("Failed to create folder: {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to register {display_name}: {reason}")]
    Register { display_name: String, reason: String },

    #[error("Unknown index entry: {0}")]
    UnknownEntry(u64),

    #[error("Corrupt index manifest {path}: {reason}")]
    CorruptIndex { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Which persistence strategy is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Scoped,
    Direct,
}

impl StorageKind {
    /// Platforms at or above [`SCOPED_STORAGE_MIN_VERSION`] use scoped storage.
    pub fn for_platform_version(version: u32) -> Self {
        if version >= SCOPED_STORAGE_MIN_VERSION {
            StorageKind::Scoped
        } else {
            StorageKind::Direct
        }
    }
}

/// Places a copy of a serialized document at a user-discoverable location.
pub trait StorageStrategy {
    fn kind(&self) -> StorageKind;

    /// Copies `source` into storage under `display_name` and returns the
    /// location of the stored file. Attempted once, never retried.
    fn persist(&self, source: &Path, display_name: &str) -> Result<PathBuf, PersistError>;
}

/// Builds the strategy matching `config.platform_version`.
pub fn select(config: &Config) -> Box<dyn StorageStrategy> {
    match StorageKind::for_platform_version(config.platform_version) {
        StorageKind::Scoped => Box::new(ScopedStorage::new(
            DirectoryIndex::new(&config.public_dir),
            config.relative_path(),
        )),
        StorageKind::Direct => Box::new(DirectStorage::new(
            config.public_dir.join(config.relative_path()),
        )),
    }
}

/// Writes directly into a public directory.
#[derive(Debug, Clone)]
pub struct DirectStorage {
    dir: PathBuf,
}

impl DirectStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirectStorage { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl StorageStrategy for DirectStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::Direct
    }

    fn persist(&self, source: &Path, display_name: &str) -> Result<PathBuf, PersistError> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).map_err(|source| PersistError::CreateDir {
                path: self.dir.clone(),
                source,
            })?;
        }

        // Staged in the target folder so the rename below replaces the old
        // file in one step. The source may itself be the target.
        let mut input = File::open(source)?;
        let mut staged = tempfile::Builder::new()
            .prefix(".surfacepdf-")
            .suffix(".partial")
            .tempfile_in(&self.dir)?;
        io::copy(&mut input, staged.as_file_mut())?;
        staged.as_file().sync_all()?;

        let target = self.dir.join(display_name);
        staged.persist(&target).map_err(|e| e.error)?;

        log::info!("Saved {} to {}", display_name, target.display());
        Ok(target)
    }
}

/// Identifier of an entry registered with a [`DocumentIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub u64);

/// Metadata submitted when registering a new file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub display_name: String,
    pub mime_type: String,
    pub relative_path: String,
}

/// A file known to the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: EntryId,
    pub display_name: String,
    pub mime_type: String,
    pub relative_path: String,
    /// Still being written; not visible to other applications.
    pub pending: bool,
    /// Actual file name on disk once published.
    pub stored_name: String,
}

/// A system-managed index of user-visible files.
pub trait DocumentIndex {
    /// Registers a new pending entry.
    fn insert(&self, entry: NewEntry) -> Result<EntryId, PersistError>;

    /// Opens a writable channel for a pending entry.
    fn open_write(&self, id: EntryId) -> Result<Box<dyn Write>, PersistError>;

    /// Clears the pending flag, making the entry visible. Returns the
    /// location of the published file.
    fn publish(&self, id: EntryId) -> Result<PathBuf, PersistError>;

    /// Drops an entry and any bytes written for it.
    fn remove(&self, id: EntryId) -> Result<(), PersistError>;
}

/// Registers documents with a [`DocumentIndex`] before writing them.
pub struct ScopedStorage<I: DocumentIndex> {
    index: I,
    relative_path: String,
}

impl<I: DocumentIndex> ScopedStorage<I> {
    pub fn new(index: I, relative_path: impl Into<String>) -> Self {
        ScopedStorage {
            index,
            relative_path: relative_path.into(),
        }
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    fn write_entry(&self, id: EntryId, source: &Path) -> Result<PathBuf, PersistError> {
        let mut input = File::open(source)?;
        {
            let mut output = self.index.open_write(id)?;
            io::copy(&mut input, &mut output)?;
            output.flush()?;
        }
        self.index.publish(id)
    }
}

impl<I: DocumentIndex> StorageStrategy for ScopedStorage<I> {
    fn kind(&self) -> StorageKind {
        StorageKind::Scoped
    }

    fn persist(&self, source: &Path, display_name: &str) -> Result<PathBuf, PersistError> {
        let id = self.index.insert(NewEntry {
            display_name: display_name.to_string(),
            mime_type: PDF_MIME_TYPE.to_string(),
            relative_path: self.relative_path.clone(),
        })?;

        match self.write_entry(id, source) {
            Ok(location) => {
                log::info!("Published {} as {}", display_name, location.display());
                Ok(location)
            }
            Err(err) => {
                log::error!("Error saving file: {err}");
                if let Err(cleanup) = self.index.remove(id) {
                    log::warn!("Failed to drop pending entry {}: {cleanup}", id.0);
                }
                Err(err)
            }
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    next_id: u64,
    entries: Vec<IndexEntry>,
}

/// A [`DocumentIndex`] kept in a directory, with a JSON manifest at its root.
///
/// Pending entries live in hidden `.pending-<id>-<name>` files and are renamed
/// to their visible name when published. Every insert creates a distinct
/// entry; name clashes get a ` (n)` suffix on disk.
#[derive(Debug, Clone)]
pub struct DirectoryIndex {
    root: PathBuf,
}

impl DirectoryIndex {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryIndex { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All entries, pending or not, in registration order.
    pub fn entries(&self) -> Result<Vec<IndexEntry>, PersistError> {
        Ok(self.load()?.entries)
    }

    /// Entries visible to other applications.
    pub fn visible(&self) -> Result<Vec<IndexEntry>, PersistError> {
        Ok(self
            .load()?
            .entries
            .into_iter()
            .filter(|e| !e.pending)
            .collect())
    }

    /// Location of a published entry.
    pub fn location(&self, entry: &IndexEntry) -> PathBuf {
        self.root.join(&entry.relative_path).join(&entry.stored_name)
    }

    fn pending_location(&self, entry: &IndexEntry) -> PathBuf {
        self.root
            .join(&entry.relative_path)
            .join(format!(".pending-{}-{}", entry.id.0, entry.stored_name))
    }

    fn manifest_path(&self) -> PathBuf {
        self.root.join(INDEX_MANIFEST)
    }

    fn load(&self) -> Result<Manifest, PersistError> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(Manifest::default());
        }

        let data = fs::read(&path)?;
        serde_json::from_slice(&data).map_err(|e| PersistError::CorruptIndex {
            path,
            reason: e.to_string(),
        })
    }

    fn store(&self, manifest: &Manifest) -> Result<(), PersistError> {
        let data = serde_json::to_vec_pretty(manifest).map_err(|e| PersistError::CorruptIndex {
            path: self.manifest_path(),
            reason: e.to_string(),
        })?;
        fs::write(self.manifest_path(), data)?;
        Ok(())
    }

    fn find(manifest: &Manifest, id: EntryId) -> Result<&IndexEntry, PersistError> {
        manifest
            .entries
            .iter()
            .find(|e| e.id == id)
            .ok_or(PersistError::UnknownEntry(id.0))
    }

    /// Picks a file name in `relative_path` not used by any other entry or
    /// existing file.
    fn unique_name(&self, manifest: &Manifest, relative_path: &str, display_name: &str) -> String {
        let dir = self.root.join(relative_path);
        let taken = |name: &str| {
            dir.join(name).exists()
                || manifest
                    .entries
                    .iter()
                    .any(|e| e.relative_path == relative_path && e.stored_name == name)
        };

        if !taken(display_name) {
            return display_name.to_string();
        }

        let (stem, ext) = match display_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
            _ => (display_name, String::new()),
        };

        (1..)
            .map(|n| format!("{stem} ({n}){ext}"))
            .find(|candidate| !taken(candidate.as_str()))
            .unwrap_or_else(|| display_name.to_string())
    }
}

impl DocumentIndex for DirectoryIndex {
    fn insert(&self, entry: NewEntry) -> Result<EntryId, PersistError> {
        let dir = self.root.join(&entry.relative_path);
        fs::create_dir_all(&dir).map_err(|source| PersistError::CreateDir { path: dir, source })?;

        let mut manifest = self.load()?;
        let id = EntryId(manifest.next_id);
        manifest.next_id += 1;

        let stored_name = self.unique_name(&manifest, &entry.relative_path, &entry.display_name);
        manifest.entries.push(IndexEntry {
            id,
            display_name: entry.display_name,
            mime_type: entry.mime_type,
            relative_path: entry.relative_path,
            pending: true,
            stored_name,
        });
        self.store(&manifest)?;

        log::debug!("Registered pending entry {}", id.0);
        Ok(id)
    }

    fn open_write(&self, id: EntryId) -> Result<Box<dyn Write>, PersistError> {
        let manifest = self.load()?;
        let entry = Self::find(&manifest, id)?;
        if !entry.pending {
            return Err(PersistError::Register {
                display_name: entry.display_name.clone(),
                reason: "entry is already published".to_string(),
            });
        }

        let file = File::create(self.pending_location(entry))?;
        Ok(Box::new(io::BufWriter::new(file)))
    }

    fn publish(&self, id: EntryId) -> Result<PathBuf, PersistError> {
        let mut manifest = self.load()?;
        let entry = Self::find(&manifest, id)?.clone();

        let location = self.location(&entry);
        if entry.pending {
            fs::rename(self.pending_location(&entry), &location)?;
        }

        if let Some(stored) = manifest.entries.iter_mut().find(|e| e.id == id) {
            stored.pending = false;
        }
        self.store(&manifest)?;

        Ok(location)
    }

    fn remove(&self, id: EntryId) -> Result<(), PersistError> {
        let mut manifest = self.load()?;
        let entry = Self::find(&manifest, id)?.clone();

        // A publish that renamed the file but failed to record it leaves the
        // entry pending with its bytes at the visible location.
        for file in [self.pending_location(&entry), self.location(&entry)] {
            if file.exists() {
                fs::remove_file(file)?;
            }
        }

        manifest.entries.retain(|e| e.id != id);
        self.store(&manifest)
    }
}

use std::collections::HashSet;
use std::fs;
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::entities::Entity;

#[remain::sorted]
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("an entity named `{0}` is already stored")]
    DuplicateName(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to persist catalog: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("entity store lock poisoned")]
    Poisoned,

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence contract for the catalog. Entity names are unique.
pub trait EntityStore: Send + Sync {
    /// Entities in insertion order. `search` is a case-insensitive substring of the name or
    /// description and `tag` an exact tag the entity must carry; empty values do not filter.
    fn find_all(&self, search: &str, tag: &str) -> StoreResult<Vec<Entity>>;

    /// Insert a new entity. A name already present is rejected with
    /// [`StoreError::DuplicateName`].
    fn save(&self, entity: &Entity) -> StoreResult<()>;

    fn delete_all(&self) -> StoreResult<()>;

    /// Replace the whole collection. Implementations that can should make the swap atomic; the
    /// default falls back to deleting then saving each entity.
    fn replace_all(&self, entities: Vec<Entity>) -> StoreResult<()> {
        ensure_unique_names(&entities)?;
        self.delete_all()?;
        for entity in &entities {
            self.save(entity)?;
        }
        Ok(())
    }
}

pub(crate) fn matches_filters(entity: &Entity, search: &str, tag: &str) -> bool {
    if !tag.is_empty() && !entity.metadata.has_tag(tag) {
        return false;
    }

    if search.is_empty() {
        return true;
    }

    let search = search.to_lowercase();
    entity.metadata.name.to_lowercase().contains(&search)
        || entity.metadata.description.to_lowercase().contains(&search)
}

fn ensure_unique_names(entities: &[Entity]) -> StoreResult<()> {
    let mut names = HashSet::new();
    for entity in entities {
        if !names.insert(entity.name()) {
            return Err(StoreError::DuplicateName(entity.name().to_string()));
        }
    }
    Ok(())
}

fn insert(entities: &mut Vec<Entity>, entity: &Entity) -> StoreResult<()> {
    if entities.iter().any(|e| e.name() == entity.name()) {
        return Err(StoreError::DuplicateName(entity.name().to_string()));
    }
    entities.push(entity.clone());
    Ok(())
}

#[derive(Debug, Default)]
pub struct InMemoryEntityStore {
    entities: RwLock<Vec<Entity>>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EntityStore for InMemoryEntityStore {
    fn find_all(&self, search: &str, tag: &str) -> StoreResult<Vec<Entity>> {
        let entities = self.entities.read().map_err(|_| StoreError::Poisoned)?;
        Ok(entities
            .iter()
            .filter(|e| matches_filters(e, search, tag))
            .cloned()
            .collect())
    }

    fn save(&self, entity: &Entity) -> StoreResult<()> {
        let mut entities = self.entities.write().map_err(|_| StoreError::Poisoned)?;
        insert(&mut entities, entity)
    }

    fn delete_all(&self) -> StoreResult<()> {
        self.entities
            .write()
            .map_err(|_| StoreError::Poisoned)?
            .clear();
        Ok(())
    }

    fn replace_all(&self, replacement: Vec<Entity>) -> StoreResult<()> {
        ensure_unique_names(&replacement)?;
        *self.entities.write().map_err(|_| StoreError::Poisoned)? = replacement;
        Ok(())
    }
}

/// Catalog kept as a JSON array in a single file. Every write lands in a temporary file next to
/// the catalog which is then renamed over it, so readers see either the old or the new catalog.
#[derive(Debug)]
pub struct FileEntityStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileEntityStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> StoreResult<Vec<Entity>> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("catalog file {} does not exist yet", self.path.display());
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, entities: &[Entity]) -> StoreResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let temp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            serde_json::to_writer_pretty(&mut writer, entities)?;
            writer.flush()?;
        }
        temp.persist(&self.path)?;
        Ok(())
    }
}

impl EntityStore for FileEntityStore {
    fn find_all(&self, search: &str, tag: &str) -> StoreResult<Vec<Entity>> {
        let _guard = self.lock.read().map_err(|_| StoreError::Poisoned)?;
        Ok(self
            .read()?
            .into_iter()
            .filter(|e| matches_filters(e, search, tag))
            .collect())
    }

    fn save(&self, entity: &Entity) -> StoreResult<()> {
        let _guard = self.lock.write().map_err(|_| StoreError::Poisoned)?;
        let mut entities = self.read()?;
        insert(&mut entities, entity)?;
        self.write(&entities)
    }

    fn delete_all(&self) -> StoreResult<()> {
        let _guard = self.lock.write().map_err(|_| StoreError::Poisoned)?;
        self.write(&[])
    }

    fn replace_all(&self, entities: Vec<Entity>) -> StoreResult<()> {
        ensure_unique_names(&entities)?;
        let _guard = self.lock.write().map_err(|_| StoreError::Poisoned)?;
        self.write(&entities)
    }
}

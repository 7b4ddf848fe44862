use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;

/// A persisted document with an id, server-managed timestamps and an
/// optional unique key (serial number for assets, email for users).
pub trait Entity: Clone + Send + Sync + 'static {
    fn id(&self) -> Uuid;
    /// Normalized unique-key value, if the entity declares one.
    fn unique_key(&self) -> Option<String>;
    /// Display name of the unique field, used in conflict messages.
    fn unique_field() -> &'static str;
    /// Refresh `updated_at` after a successful mutation.
    fn touch(&mut self, now: OffsetDateTime);
}

pub type Predicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;
pub type Patch<T> = Box<dyn FnOnce(&mut T) + Send>;

/// Repository contract over a single entity type. Every operation is atomic
/// at single-entity granularity; there are no cross-entity transactions.
#[async_trait]
pub trait RecordStore<T: Entity>: Send + Sync {
    /// Persist a new entity. Fails with `Conflict` when another entity
    /// already holds the same unique key.
    async fn insert(&self, entity: T) -> Result<T, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<T>, AppError>;

    async fn find_one(&self, pred: Predicate<T>) -> Result<Option<T>, AppError>;

    /// All entities, unordered; callers sort as needed.
    async fn list(&self) -> Result<Vec<T>, AppError>;

    /// Apply `patch` to the stored entity, re-validate the unique key
    /// against all other entities and refresh `updated_at`. Nothing is
    /// written when the unique check fails. `Ok(None)` when `id` is absent.
    async fn update_by_id(&self, id: Uuid, patch: Patch<T>) -> Result<Option<T>, AppError>;

    /// Remove and return the entity, `Ok(None)` when absent.
    async fn delete_by_id(&self, id: Uuid) -> Result<Option<T>, AppError>;
}

/// In-process adapter backed by a `RwLock`ed map. The lock scope is the
/// whole operation, which gives the per-entity atomicity the services
/// rely on for uniqueness checks; it is never held across an await. A
/// poisoned lock (a panic inside a critical section) surfaces as
/// `Persistence`.
pub struct MemRecordStore<T> {
    items: RwLock<HashMap<Uuid, T>>,
}

impl<T> MemRecordStore<T> {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> Default for MemRecordStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn conflict<T: Entity>() -> AppError {
    AppError::Conflict(format!("{} already exists", T::unique_field()))
}

fn poisoned() -> AppError {
    AppError::Persistence("record store lock poisoned".into())
}

#[async_trait]
impl<T: Entity> RecordStore<T> for MemRecordStore<T> {
    async fn insert(&self, entity: T) -> Result<T, AppError> {
        let mut items = self.items.write().map_err(|_| poisoned())?;
        if let Some(key) = entity.unique_key() {
            if items.values().any(|other| other.unique_key() == Some(key.clone())) {
                return Err(conflict::<T>());
            }
        }
        items.insert(entity.id(), entity.clone());
        Ok(entity)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<T>, AppError> {
        let items = self.items.read().map_err(|_| poisoned())?;
        Ok(items.get(&id).cloned())
    }

    async fn find_one(&self, pred: Predicate<T>) -> Result<Option<T>, AppError> {
        let items = self.items.read().map_err(|_| poisoned())?;
        Ok(items.values().find(|e| pred(e)).cloned())
    }

    async fn list(&self) -> Result<Vec<T>, AppError> {
        let items = self.items.read().map_err(|_| poisoned())?;
        Ok(items.values().cloned().collect())
    }

    async fn update_by_id(&self, id: Uuid, patch: Patch<T>) -> Result<Option<T>, AppError> {
        let mut items = self.items.write().map_err(|_| poisoned())?;
        let Some(current) = items.get(&id) else {
            return Ok(None);
        };

        let mut updated = current.clone();
        patch(&mut updated);

        if let Some(key) = updated.unique_key() {
            let taken = items
                .values()
                .any(|other| other.id() != id && other.unique_key() == Some(key.clone()));
            if taken {
                return Err(conflict::<T>());
            }
        }

        updated.touch(OffsetDateTime::now_utc());
        items.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<Option<T>, AppError> {
        let mut items = self.items.write().map_err(|_| poisoned())?;
        Ok(items.remove(&id))
    }
}

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use bytes::Bytes;
use uuid::Uuid;

/// Assembled media held in memory until released.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredClip {
    pub data: Bytes,
    pub mime_type: String,
}

/// Process-local registry handing out opaque references to generated clips.
#[derive(Debug, Default)]
pub struct ClipStore {
    clips: Mutex<HashMap<Uuid, StoredClip>>,
}

pub fn media_url(id: &Uuid) -> String {
    format!("/media/{id}")
}

impl ClipStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, StoredClip>> {
        self.clips.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, clip: StoredClip) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().insert(id, clip);
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<StoredClip> {
        self.lock().get(id).cloned()
    }

    /// Drop the clip. Returns `false` if `id` was unknown or already released.
    pub fn release(&self, id: &Uuid) -> bool {
        self.lock().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

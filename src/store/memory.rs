// src/store/memory.rs
//! In-process store for tests and throwaway runs.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use super::{PostStore, SourceStore};
use crate::error::StoreError;
use crate::post::{NewPost, Post, PostAttributes, PostStatus};
use crate::source::{NewSource, Source, SourceStatus};

#[derive(Debug, Default)]
struct Inner {
    posts: Vec<Post>,
    keys: HashMap<(String, String), usize>,
    sources: Vec<Source>,
    next_post_id: i64,
    next_source_id: i64,
}

impl Inner {
    fn post_mut(&mut self, id: i64) -> Result<&mut Post, StoreError> {
        self.posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::NotFound(id))
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("memory store mutex poisoned".into()))
    }
}

impl PostStore for MemoryStore {
    fn find_by_source_and_external_id(
        &self,
        source: &str,
        external_id: &str,
    ) -> Result<Option<Post>, StoreError> {
        let g = self.lock()?;
        let key = (source.to_string(), external_id.to_string());
        Ok(g.keys.get(&key).map(|&i| g.posts[i].clone()))
    }

    fn create(&self, new: NewPost<'_>) -> Result<Post, StoreError> {
        let mut g = self.lock()?;
        let key = (new.source.to_string(), new.external_id.to_string());
        if g.keys.contains_key(&key) {
            return Err(StoreError::UniqueViolation {
                source_name: key.0,
                external_id: key.1,
            });
        }
        g.next_post_id += 1;
        let a = new.attrs;
        let post = Post {
            id: g.next_post_id,
            source: key.0.clone(),
            external_id: key.1.clone(),
            title: a.title.clone(),
            url: a.url.clone(),
            author: a.author.clone(),
            posted_at: a.posted_at,
            summary: a.summary.clone(),
            tags: a.tags.clone(),
            status: new.status,
            priority_score: a.priority_score,
            created_at: new.at,
            updated_at: new.at,
        };
        let idx = g.posts.len();
        g.posts.push(post.clone());
        g.keys.insert(key, idx);
        Ok(post)
    }

    fn update(
        &self,
        id: i64,
        attrs: &PostAttributes,
        at: DateTime<Utc>,
    ) -> Result<Post, StoreError> {
        let mut g = self.lock()?;
        let post = g.post_mut(id)?;
        post.apply(attrs, at);
        Ok(post.clone())
    }

    fn set_status(&self, id: i64, status: PostStatus) -> Result<(), StoreError> {
        let mut g = self.lock()?;
        g.post_mut(id)?.status = status;
        Ok(())
    }

    fn get(&self, id: i64) -> Result<Option<Post>, StoreError> {
        let g = self.lock()?;
        Ok(g.posts.iter().find(|p| p.id == id).cloned())
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.posts.len())
    }

    fn list_by_source(&self, source: &str) -> Result<Vec<Post>, StoreError> {
        let g = self.lock()?;
        Ok(g.posts.iter().filter(|p| p.source == source).cloned().collect())
    }
}

impl SourceStore for MemoryStore {
    fn list_sources(&self) -> Result<Vec<Source>, StoreError> {
        Ok(self.lock()?.sources.clone())
    }

    fn get_source(&self, id: i64) -> Result<Option<Source>, StoreError> {
        let g = self.lock()?;
        Ok(g.sources.iter().find(|s| s.id == id).cloned())
    }

    fn upsert_source(&self, new: &NewSource) -> Result<Source, StoreError> {
        let mut g = self.lock()?;
        if let Some(existing) = g.sources.iter_mut().find(|s| s.name == new.name) {
            existing.source_type = new.source_type;
            existing.url = new.url.clone();
            existing.config = new.config.clone();
            existing.active = new.active;
            existing.auto_fetch_enabled = new.auto_fetch_enabled;
            return Ok(existing.clone());
        }
        g.next_source_id += 1;
        let source = Source {
            id: g.next_source_id,
            name: new.name.clone(),
            source_type: new.source_type,
            url: new.url.clone(),
            config: new.config.clone(),
            active: new.active,
            auto_fetch_enabled: new.auto_fetch_enabled,
            last_fetched_at: None,
            status: None,
        };
        g.sources.push(source.clone());
        Ok(source)
    }

    fn record_status(
        &self,
        id: i64,
        status: &SourceStatus,
        fetched_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut g = self.lock()?;
        let source = g
            .sources
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::NotFound(id))?;
        source.status = Some(status.to_string());
        if fetched_at.is_some() {
            source.last_fetched_at = fetched_at;
        }
        Ok(())
    }
}

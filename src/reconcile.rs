// src/reconcile.rs
//! Find-or-update policy for re-fetched items.
//!
//! | stored status      | on re-ingest                                         |
//! |--------------------|------------------------------------------------------|
//! | absent             | create as `unread`                                   |
//! | `ignored`          | never touched                                        |
//! | `unread`           | attributes always overwritten                        |
//! | `read`/`responded` | attributes overwritten if [`should_refresh`], status kept |

use chrono::{DateTime, Duration, Utc};

use crate::error::StoreError;
use crate::post::{NewPost, Post, PostAttributes, PostStatus};
use crate::store::PostStore;

/// Minimum score increase that counts as a new signal on a triaged post.
pub const SCORE_DELTA_THRESHOLD: f64 = 2.0;

/// Triaged posts older than this are refreshed even without a new signal.
pub const STALE_AFTER_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    Created,
    Updated,
    /// Existing row left as is (ignored post, or triaged post without new signal).
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct Reconciled {
    pub action: ReconcileAction,
    pub post: Post,
}

impl Reconciled {
    pub fn created(&self) -> bool {
        self.action == ReconcileAction::Created
    }

    pub fn updated(&self) -> bool {
        self.action == ReconcileAction::Updated
    }
}

/// Whether a `read`/`responded` post should take the candidate's attributes.
pub fn should_refresh(existing: &Post, candidate: &PostAttributes, now: DateTime<Utc>) -> bool {
    candidate.posted_at != existing.posted_at
        || candidate.priority_score - existing.priority_score > SCORE_DELTA_THRESHOLD
        || candidate.summary != existing.summary
        || existing.updated_at < now - Duration::hours(STALE_AFTER_HOURS)
}

pub struct PostReconciler<'a, S: PostStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: PostStore + ?Sized> PostReconciler<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn reconcile(
        &self,
        source: &str,
        external_id: &str,
        candidate: &PostAttributes,
    ) -> Result<Reconciled, StoreError> {
        self.reconcile_at(source, external_id, candidate, Utc::now())
    }

    pub fn reconcile_at(
        &self,
        source: &str,
        external_id: &str,
        candidate: &PostAttributes,
        now: DateTime<Utc>,
    ) -> Result<Reconciled, StoreError> {
        if let Some(existing) = self
            .store
            .find_by_source_and_external_id(source, external_id)?
        {
            return self.merge(existing, candidate, now);
        }

        let created = self.store.create(NewPost {
            source,
            external_id,
            attrs: candidate,
            status: PostStatus::Unread,
            at: now,
        });
        match created {
            Ok(post) => Ok(Reconciled {
                action: ReconcileAction::Created,
                post,
            }),
            Err(StoreError::UniqueViolation { .. }) => {
                // Lost a create race; the winner's row goes through the normal policy.
                tracing::debug!(target: "ingest", source, external_id, "create raced, retrying as update");
                let existing = self
                    .store
                    .find_by_source_and_external_id(source, external_id)?
                    .ok_or_else(|| {
                        StoreError::Backend(format!(
                            "post {source}/{external_id} vanished after unique violation"
                        ))
                    })?;
                self.merge(existing, candidate, now)
            }
            Err(e) => Err(e),
        }
    }

    fn merge(
        &self,
        existing: Post,
        candidate: &PostAttributes,
        now: DateTime<Utc>,
    ) -> Result<Reconciled, StoreError> {
        let refresh = match existing.status {
            PostStatus::Ignored => false,
            PostStatus::Unread => true,
            PostStatus::Read | PostStatus::Responded => should_refresh(&existing, candidate, now),
        };
        if !refresh {
            return Ok(Reconciled {
                action: ReconcileAction::Unchanged,
                post: existing,
            });
        }
        let post = self.store.update(existing.id, candidate, now)?;
        Ok(Reconciled {
            action: ReconcileAction::Updated,
            post,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn post(status: PostStatus, updated_at: DateTime<Utc>) -> Post {
        Post {
            id: 1,
            source: "github".into(),
            external_id: "1".into(),
            title: "t".into(),
            url: "https://example.test".into(),
            author: String::new(),
            posted_at: Some(Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap()),
            summary: "s".into(),
            tags: vec![],
            status,
            priority_score: 10.0,
            created_at: updated_at,
            updated_at,
        }
    }

    #[test]
    fn refresh_predicate_clauses() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        let p = post(PostStatus::Read, now - Duration::hours(1));
        let same = p.attributes();
        assert!(!should_refresh(&p, &same, now));

        let mut c = same.clone();
        c.priority_score = 12.0;
        assert!(!should_refresh(&p, &c, now), "delta of exactly 2.0 is not enough");
        c.priority_score = 12.01;
        assert!(should_refresh(&p, &c, now));

        let mut c = same.clone();
        c.priority_score = 1.0;
        assert!(!should_refresh(&p, &c, now), "score drops never trigger");

        let mut c = same.clone();
        c.summary = "new reply".into();
        assert!(should_refresh(&p, &c, now));

        let mut c = same.clone();
        c.posted_at = None;
        assert!(should_refresh(&p, &c, now));

        let stale = post(PostStatus::Read, now - Duration::hours(25));
        assert!(should_refresh(&stale, &stale.attributes(), now));
    }
}

// tests/reconcile_policy.rs
use chrono::{DateTime, Duration, TimeZone, Utc};
use sourcewatch::error::StoreError;
use sourcewatch::post::NewPost;
use sourcewatch::store::{MemoryStore, PostStore, SqliteStore};
use sourcewatch::{Post, PostAttributes, PostReconciler, PostStatus, ReconcileAction};
use std::sync::atomic::{AtomicBool, Ordering};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 18, 8, 0, 0).unwrap()
}

fn attrs(title: &str, score: f64) -> PostAttributes {
    PostAttributes {
        title: title.into(),
        url: "https://example.test/item".into(),
        author: "someone".into(),
        posted_at: Some(t0() - Duration::hours(1)),
        summary: "first summary".into(),
        tags: vec!["a".into()],
        priority_score: score,
    }
}

fn exercise_policy(store: &dyn PostStore) {
    let r = PostReconciler::new(store);

    // absent -> created unread
    let first = r.reconcile_at("blog", "42", &attrs("Hello", 1.0), t0()).unwrap();
    assert_eq!(first.action, ReconcileAction::Created);
    assert_eq!(first.post.status, PostStatus::Unread);

    // idempotent: same input twice leaves one row with the same attributes
    let again = r.reconcile_at("blog", "42", &attrs("Hello", 1.0), t0()).unwrap();
    assert_eq!(again.action, ReconcileAction::Updated);
    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(again.post.attributes(), first.post.attributes());

    // same external id under another source is another post
    let other = r.reconcile_at("forum", "42", &attrs("Hello", 1.0), t0()).unwrap();
    assert!(other.created());
    assert_ne!(other.post.id, first.post.id);
    assert_eq!(store.count().unwrap(), 2);

    // responded: small score bump is not a signal
    store.set_status(first.post.id, PostStatus::Responded).unwrap();
    let later = t0() + Duration::hours(2);
    let r2 = r.reconcile_at("blog", "42", &attrs("Hello again", 2.5), later).unwrap();
    assert_eq!(r2.action, ReconcileAction::Unchanged);
    assert_eq!(r2.post.title, "Hello");

    // ...a bump above 2.0 is, and status survives the overwrite
    let r3 = r.reconcile_at("blog", "42", &attrs("Hello again", 3.5), later).unwrap();
    assert_eq!(r3.action, ReconcileAction::Updated);
    assert_eq!(r3.post.title, "Hello again");
    assert_eq!(r3.post.status, PostStatus::Responded);
    assert_eq!(r3.post.updated_at, later);

    // summary change on a read post
    store.set_status(first.post.id, PostStatus::Read).unwrap();
    let mut changed = attrs("Hello again", 3.5);
    changed.summary = "edited upstream".into();
    let r4 = r.reconcile_at("blog", "42", &changed, later).unwrap();
    assert!(r4.updated());
    assert_eq!(r4.post.status, PostStatus::Read);

    // stale rows refresh after 24h without any other signal
    let stale = later + Duration::hours(25);
    let r5 = r.reconcile_at("blog", "42", &changed, stale).unwrap();
    assert!(r5.updated());
    assert_eq!(r5.post.updated_at, stale);

    // ignored is permanent
    store.set_status(first.post.id, PostStatus::Ignored).unwrap();
    let mut loud = attrs("Totally new", 99.0);
    loud.posted_at = Some(stale);
    let r6 = r.reconcile_at("blog", "42", &loud, stale + Duration::days(30)).unwrap();
    assert!(!r6.created() && !r6.updated());
    let kept = store.get(first.post.id).unwrap().unwrap();
    assert_eq!(kept.title, "Hello again");
    assert_eq!(kept.status, PostStatus::Ignored);
}

#[test]
fn policy_on_memory_store() {
    exercise_policy(&MemoryStore::new());
}

#[test]
fn policy_on_sqlite_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("posts.db")).unwrap();
    exercise_policy(&store);
}

#[test]
fn discourse_activity_refreshes_read_post() {
    let store = MemoryStore::new();
    let r = PostReconciler::new(&store);
    let mut a = attrs("How do I pin memory?", 4.0);
    let created = r.reconcile_at("PyTorch Forums", "9001", &a, t0()).unwrap();
    store.set_status(created.post.id, PostStatus::Read).unwrap();

    let newer = t0() + Duration::hours(3);
    a.posted_at = Some(newer);
    let res = r.reconcile_at("PyTorch Forums", "9001", &a, t0() + Duration::hours(4)).unwrap();
    assert!(res.updated());
    assert_eq!(res.post.posted_at, Some(newer));
    assert_eq!(res.post.status, PostStatus::Read);
}

/// Reports "not found" once, as if another worker inserted the row between
/// the lookup and the insert.
struct RacingStore {
    inner: MemoryStore,
    hide_once: AtomicBool,
}

impl PostStore for RacingStore {
    fn find_by_source_and_external_id(&self, source: &str, external_id: &str) -> Result<Option<Post>, StoreError> {
        if self.hide_once.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.find_by_source_and_external_id(source, external_id)
    }
    fn create(&self, new: NewPost<'_>) -> Result<Post, StoreError> {
        self.inner.create(new)
    }
    fn update(&self, id: i64, attrs: &PostAttributes, at: DateTime<Utc>) -> Result<Post, StoreError> {
        self.inner.update(id, attrs, at)
    }
    fn set_status(&self, id: i64, status: PostStatus) -> Result<(), StoreError> {
        self.inner.set_status(id, status)
    }
    fn get(&self, id: i64) -> Result<Option<Post>, StoreError> {
        self.inner.get(id)
    }
    fn count(&self) -> Result<usize, StoreError> {
        self.inner.count()
    }
    fn list_by_source(&self, source: &str) -> Result<Vec<Post>, StoreError> {
        self.inner.list_by_source(source)
    }
}

#[test]
fn lost_create_race_is_applied_as_update() {
    let store = RacingStore {
        inner: MemoryStore::new(),
        hide_once: AtomicBool::new(false),
    };
    let r = PostReconciler::new(&store);
    r.reconcile_at("blog", "7", &attrs("v1", 1.0), t0()).unwrap();

    store.hide_once.store(true, Ordering::SeqCst);
    let res = r.reconcile_at("blog", "7", &attrs("v2", 1.0), t0()).unwrap();
    assert_eq!(res.action, ReconcileAction::Updated);
    assert_eq!(res.post.title, "v2");
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn raced_create_respects_ignore() {
    let store = RacingStore {
        inner: MemoryStore::new(),
        hide_once: AtomicBool::new(false),
    };
    let r = PostReconciler::new(&store);
    let first = r.reconcile_at("blog", "8", &attrs("v1", 1.0), t0()).unwrap();
    store.set_status(first.post.id, PostStatus::Ignored).unwrap();

    store.hide_once.store(true, Ordering::SeqCst);
    let res = r.reconcile_at("blog", "8", &attrs("v2", 50.0), t0()).unwrap();
    assert_eq!(res.action, ReconcileAction::Unchanged);
    assert_eq!(store.get(first.post.id).unwrap().unwrap().title, "v1");
}

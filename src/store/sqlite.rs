// src/store/sqlite.rs
//! SQLite-backed store. The unique index on `posts(source, external_id)` is
//! the backstop for concurrent ingestion of the same item.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{PostStore, SourceStore};
use crate::error::StoreError;
use crate::post::{NewPost, Post, PostAttributes, PostStatus};
use crate::source::{NewSource, Source, SourceStatus, SourceType};

const SCHEMA: &str = r#"
create table if not exists sources (
    id integer primary key autoincrement,
    name text not null unique,
    source_type text not null,
    url text,
    config text not null default '{}',
    active integer not null default 1,
    auto_fetch_enabled integer not null default 1,
    last_fetched_at text,
    status text
);
create table if not exists posts (
    id integer primary key autoincrement,
    source text not null,
    external_id text not null,
    title text not null,
    url text not null,
    author text not null default '',
    posted_at text,
    summary text not null default '',
    tags text not null default '[]',
    status text not null default 'unread',
    priority_score real not null default 0,
    created_at text not null,
    updated_at text not null
);
create unique index if not exists posts_source_external_id on posts(source, external_id);
"#;

const POST_COLUMNS: &str = "id, source, external_id, title, url, author, posted_at, summary, tags, status, priority_score, created_at, updated_at";
const SOURCE_COLUMNS: &str =
    "id, name, source_type, url, config, active, auto_fetch_enabled, last_fetched_at, status";

pub struct SqliteStore {
    connection: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file. `":memory:"` gives a private in-memory database.
    pub fn open<P: AsRef<Path>>(location: P) -> Result<Self, StoreError> {
        let connection = Connection::open(location)?;
        connection.execute_batch(SCHEMA)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::open(":memory:")
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.connection
            .lock()
            .map_err(|_| StoreError::Backend("sqlite connection mutex poisoned".into()))
    }
}

fn ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    let posted_at: Option<String> = row.get(6)?;
    let tags_raw: String = row.get(8)?;
    let status_raw: String = row.get(9)?;
    let created_raw: String = row.get(11)?;
    let updated_raw: String = row.get(12)?;
    Ok(Post {
        id: row.get(0)?,
        source: row.get(1)?,
        external_id: row.get(2)?,
        title: row.get(3)?,
        url: row.get(4)?,
        author: row.get(5)?,
        posted_at: posted_at.as_deref().map(|s| parse_ts(6, s)).transpose()?,
        summary: row.get(7)?,
        tags: serde_json::from_str(&tags_raw)
            .map_err(|e| conversion_error(8, e.to_string()))?,
        status: PostStatus::parse(&status_raw)
            .ok_or_else(|| conversion_error(9, format!("unknown post status {status_raw:?}")))?,
        priority_score: row.get(10)?,
        created_at: parse_ts(11, &created_raw)?,
        updated_at: parse_ts(12, &updated_raw)?,
    })
}

fn source_from_row(row: &Row<'_>) -> rusqlite::Result<Source> {
    let type_raw: String = row.get(2)?;
    let fetched: Option<String> = row.get(7)?;
    Ok(Source {
        id: row.get(0)?,
        name: row.get(1)?,
        source_type: SourceType::parse(&type_raw)
            .ok_or_else(|| conversion_error(2, format!("unknown source type {type_raw:?}")))?,
        url: row.get(3)?,
        config: row.get(4)?,
        active: row.get(5)?,
        auto_fetch_enabled: row.get(6)?,
        last_fetched_at: fetched.as_deref().map(|s| parse_ts(7, s)).transpose()?,
        status: row.get(8)?,
    })
}

fn tags_json(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _) if f.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn load_post(conn: &Connection, id: i64) -> Result<Option<Post>, StoreError> {
    let sql = format!("select {POST_COLUMNS} from posts where id = ?1");
    Ok(conn.query_row(&sql, [id], post_from_row).optional()?)
}

fn load_source(conn: &Connection, id: i64) -> Result<Option<Source>, StoreError> {
    let sql = format!("select {SOURCE_COLUMNS} from sources where id = ?1");
    Ok(conn.query_row(&sql, [id], source_from_row).optional()?)
}

impl PostStore for SqliteStore {
    fn find_by_source_and_external_id(
        &self,
        source: &str,
        external_id: &str,
    ) -> Result<Option<Post>, StoreError> {
        let conn = self.conn()?;
        let sql = format!("select {POST_COLUMNS} from posts where source = ?1 and external_id = ?2");
        Ok(conn
            .query_row(&sql, params![source, external_id], post_from_row)
            .optional()?)
    }

    fn create(&self, new: NewPost<'_>) -> Result<Post, StoreError> {
        let conn = self.conn()?;
        let a = new.attrs;
        let res = conn.execute(
            "insert into posts (source, external_id, title, url, author, posted_at, summary, tags, status, priority_score, created_at, updated_at)
             values (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
            params![
                new.source,
                new.external_id,
                a.title,
                a.url,
                a.author,
                a.posted_at.map(ts),
                a.summary,
                tags_json(&a.tags),
                new.status.as_str(),
                a.priority_score,
                ts(new.at),
            ],
        );
        match res {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(StoreError::UniqueViolation {
                    source_name: new.source.to_string(),
                    external_id: new.external_id.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        }
        let id = conn.last_insert_rowid();
        load_post(&conn, id)?.ok_or(StoreError::NotFound(id))
    }

    fn update(
        &self,
        id: i64,
        attrs: &PostAttributes,
        at: DateTime<Utc>,
    ) -> Result<Post, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "update posts set title = ?2, url = ?3, author = ?4, posted_at = ?5, summary = ?6,
                 tags = ?7, priority_score = ?8, updated_at = ?9
             where id = ?1",
            params![
                id,
                attrs.title,
                attrs.url,
                attrs.author,
                attrs.posted_at.map(ts),
                attrs.summary,
                tags_json(&attrs.tags),
                attrs.priority_score,
                ts(at),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        load_post(&conn, id)?.ok_or(StoreError::NotFound(id))
    }

    fn set_status(&self, id: i64, status: PostStatus) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "update posts set status = ?2 where id = ?1",
            params![id, status.as_str()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    fn get(&self, id: i64) -> Result<Option<Post>, StoreError> {
        load_post(&*self.conn()?, id)
    }

    fn count(&self) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row("select count(*) from posts", [], |r| r.get(0))?;
        Ok(n.max(0) as usize)
    }

    fn list_by_source(&self, source: &str) -> Result<Vec<Post>, StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "select {POST_COLUMNS} from posts where source = ?1 order by priority_score desc, id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([source], post_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

impl SourceStore for SqliteStore {
    fn list_sources(&self) -> Result<Vec<Source>, StoreError> {
        let conn = self.conn()?;
        let sql = format!("select {SOURCE_COLUMNS} from sources order by id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], source_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn get_source(&self, id: i64) -> Result<Option<Source>, StoreError> {
        load_source(&*self.conn()?, id)
    }

    fn upsert_source(&self, new: &NewSource) -> Result<Source, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "insert into sources (name, source_type, url, config, active, auto_fetch_enabled)
             values (?1, ?2, ?3, ?4, ?5, ?6)
             on conflict(name) do update set
                 source_type = excluded.source_type,
                 url = excluded.url,
                 config = excluded.config,
                 active = excluded.active,
                 auto_fetch_enabled = excluded.auto_fetch_enabled",
            params![
                new.name,
                new.source_type.as_str(),
                new.url,
                new.config,
                new.active,
                new.auto_fetch_enabled,
            ],
        )?;
        let sql = format!("select {SOURCE_COLUMNS} from sources where name = ?1");
        Ok(conn.query_row(&sql, [&new.name], source_from_row)?)
    }

    fn record_status(
        &self,
        id: i64,
        status: &SourceStatus,
        fetched_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "update sources set status = ?2, last_fetched_at = coalesce(?3, last_fetched_at) where id = ?1",
            params![id, status.to_string(), fetched_at.map(ts)],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn attrs(title: &str) -> PostAttributes {
        PostAttributes {
            title: title.into(),
            url: "https://example.test/1".into(),
            author: "octocat".into(),
            posted_at: Some(Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap()),
            summary: "body".into(),
            tags: vec!["bug".into(), "help wanted".into()],
            priority_score: 4.25,
        }
    }

    #[test]
    fn create_find_and_update_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        let a = attrs("Bug A");
        let created = store
            .create(NewPost {
                source: "github",
                external_id: "123",
                attrs: &a,
                status: PostStatus::Unread,
                at,
            })
            .unwrap();
        let found = store
            .find_by_source_and_external_id("github", "123")
            .unwrap()
            .unwrap();
        assert_eq!(found, created);
        assert_eq!(found.tags, vec!["bug".to_string(), "help wanted".to_string()]);

        let later = at + chrono::Duration::hours(1);
        let updated = store.update(created.id, &attrs("Bug A v2"), later).unwrap();
        assert_eq!(updated.title, "Bug A v2");
        assert_eq!(updated.updated_at, later);
        assert_eq!(updated.created_at, at);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn duplicate_key_is_reported_as_unique_violation() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = attrs("Bug A");
        let new = NewPost {
            source: "github",
            external_id: "123",
            attrs: &a,
            status: PostStatus::Unread,
            at: Utc::now(),
        };
        store.create(new.clone()).unwrap();
        let err = store.create(new).unwrap_err();
        assert!(matches!(&err, StoreError::UniqueViolation { source_name, .. } if source_name == "github"));
        assert_eq!(err.to_string(), "post github/123 already exists");
    }

    #[test]
    fn source_upsert_and_status() {
        let store = SqliteStore::open_in_memory().unwrap();
        let s = store
            .upsert_source(&NewSource::new("Rust", SourceType::Github, Some("https://github.com/rust-lang/rust")))
            .unwrap();
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        store
            .record_status(s.id, &SourceStatus::Ok { new_count: 2 }, Some(at))
            .unwrap();
        store
            .record_status(s.id, &SourceStatus::Refreshing, None)
            .unwrap();
        let got = store.get_source(s.id).unwrap().unwrap();
        assert_eq!(got.status.as_deref(), Some("refreshing..."));
        assert_eq!(got.last_fetched_at, Some(at));

        let again = store
            .upsert_source(
                &NewSource::new("Rust", SourceType::Github, Some("https://github.com/rust-lang/cargo"))
                    .with_config(r#"{"labels":["E-easy"]}"#),
            )
            .unwrap();
        assert_eq!(again.id, s.id);
        assert_eq!(again.url_str(), "https://github.com/rust-lang/cargo");
        assert_eq!(store.list_sources().unwrap().len(), 1);
    }
}

//! Index - SQLite query cache
//!
//! Every pearl is mirrored into one row of `pearls`. List-valued fields are
//! stored as JSON arrays and matched element-wise with `json_each`.
//!
//! # Key Points
//! - Rebuildable from the log at any time (`clear` + `insert`)
//! - Internal integer `pk` keys the vector table (see [`super::vector`]);
//!   foreign keys are on so deleting a row cascades to its vector
//! - WAL + busy timeout so concurrent CLI invocations wait instead of failing

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{ffi, params, params_from_iter, Connection, ErrorCode, OpenFlags, Row};
use serde::de::DeserializeOwned;

use super::error::{Error, Result};
use super::pearl::{self, Pearl, PearlType, Status};

/// Search results when the caller passes a zero limit
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Column list shared by insert and select
const COLUMNS: &str = "id, name, namespace, type, tags, globs, scopes, description, \
     content_path, content_hash, refs, parent, connection, required, priority, \
     created_at, updated_at, created_by, status";

/// Filters for [`IndexStore::list`]; `None` means "any"
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Namespace prefix: matches `ns` itself and anything below `ns.`
    pub namespace: Option<String>,
    pub pearl_type: Option<PearlType>,
    pub status: Option<Status>,
    pub tag: Option<String>,
    pub scope: Option<String>,
    pub required: Option<bool>,
    pub limit: Option<usize>,
}

/// SQLite-backed index
pub struct IndexStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl IndexStore {
    /// Open or create the index database
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;

        let index = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        index.init_schema()?;

        Ok(index)
    }

    /// Open an in-memory index (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let index = Self { conn, path: None };
        index.init_schema()?;
        Ok(index)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS pearls (
                pk INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                namespace TEXT NOT NULL DEFAULT '',
                type TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '[]',      -- JSON array
                globs TEXT NOT NULL DEFAULT '[]',     -- JSON array
                scopes TEXT NOT NULL DEFAULT '[]',    -- JSON array
                description TEXT NOT NULL DEFAULT '',
                content_path TEXT NOT NULL DEFAULT '',
                content_hash TEXT NOT NULL DEFAULT '',
                refs TEXT NOT NULL DEFAULT '[]',      -- JSON array
                parent TEXT,
                connection TEXT,                      -- JSON object
                required INTEGER NOT NULL DEFAULT 0,
                priority INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                created_by TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'active'
            );

            CREATE INDEX IF NOT EXISTS idx_pearls_namespace ON pearls(namespace);
            CREATE INDEX IF NOT EXISTS idx_pearls_type ON pearls(type);
            CREATE INDEX IF NOT EXISTS idx_pearls_status ON pearls(status);
            CREATE INDEX IF NOT EXISTS idx_pearls_required ON pearls(required, priority);

            -- One vector per pearl row, f32 little-endian
            CREATE TABLE IF NOT EXISTS pearl_embeddings (
                pearl_pk INTEGER PRIMARY KEY REFERENCES pearls(pk) ON DELETE CASCADE,
                dim INTEGER NOT NULL,
                embedding BLOB NOT NULL
            );
            "#,
        )?;

        Ok(())
    }

    /// Insert a new pearl; fails with `AlreadyExists` on a colliding ID
    pub fn insert(&self, pearl: &Pearl) -> Result<()> {
        let values = encode(pearl)?;
        let sql = format!(
            "INSERT INTO pearls ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, \
             ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
            COLUMNS
        );

        self.conn
            .execute(&sql, params_from_iter(values))
            .map_err(|e| unique_violation(e, &pearl.id))?;

        tracing::debug!(id = %pearl.id, "indexed pearl");
        Ok(())
    }

    /// Overwrite every field of an existing pearl; `NotFound` if absent
    pub fn update(&self, pearl: &Pearl) -> Result<()> {
        let values = encode(pearl)?;
        let changed = self.conn.execute(
            r#"
            UPDATE pearls SET
                name = ?2, namespace = ?3, type = ?4, tags = ?5, globs = ?6,
                scopes = ?7, description = ?8, content_path = ?9, content_hash = ?10,
                refs = ?11, parent = ?12, connection = ?13, required = ?14,
                priority = ?15, created_at = ?16, updated_at = ?17, created_by = ?18,
                status = ?19
            WHERE id = ?1
            "#,
            params_from_iter(values),
        )?;

        if changed == 0 {
            return Err(Error::NotFound(format!("pearl {}", pearl.id)));
        }

        tracing::debug!(id = %pearl.id, "reindexed pearl");
        Ok(())
    }

    /// Remove a pearl (and, by cascade, its vector); `NotFound` if absent
    pub fn delete(&self, id: &str) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM pearls WHERE id = ?1", params![id])?;

        if changed == 0 {
            return Err(Error::NotFound(format!("pearl {}", id)));
        }

        tracing::debug!(id, "removed pearl from index");
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<Pearl>> {
        let sql = format!("SELECT {} FROM pearls WHERE id = ?1", COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;

        match stmt.query_row([id], row_to_pearl) {
            Ok(p) => Ok(Some(p)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn exists(&self, id: &str) -> Result<bool> {
        let found: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pearls WHERE id = ?1",
            [id],
            |row| row.get(0),
        )?;
        Ok(found > 0)
    }

    /// Filtered listing, ordered by priority (high first) then namespace, name
    pub fn list(&self, filter: &ListFilter) -> Result<Vec<Pearl>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(ns) = filter.namespace.as_deref().filter(|s| !s.is_empty()) {
            clauses.push("(namespace = ? OR namespace LIKE ? ESCAPE '\\')");
            values.push(Value::from(ns.to_string()));
            values.push(Value::from(format!("{}.%", escape_like(ns))));
        }
        if let Some(t) = &filter.pearl_type {
            clauses.push("type = ?");
            values.push(Value::from(t.as_str().to_string()));
        }
        if let Some(s) = filter.status {
            clauses.push("status = ?");
            values.push(Value::from(s.as_str().to_string()));
        }
        if let Some(tag) = &filter.tag {
            clauses.push("EXISTS (SELECT 1 FROM json_each(pearls.tags) WHERE value = ?)");
            values.push(Value::from(tag.clone()));
        }
        if let Some(scope) = &filter.scope {
            clauses.push("EXISTS (SELECT 1 FROM json_each(pearls.scopes) WHERE value = ?)");
            values.push(Value::from(scope.clone()));
        }
        if let Some(required) = filter.required {
            clauses.push("required = ?");
            values.push(Value::from(required));
        }

        let mut sql = format!("SELECT {} FROM pearls", COLUMNS);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY priority DESC, namespace, name");
        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            values.push(Value::from(limit as i64));
        }

        self.query(&sql, values)
    }

    /// Every pearl in insertion order
    pub fn all(&self) -> Result<Vec<Pearl>> {
        let sql = format!("SELECT {} FROM pearls ORDER BY pk", COLUMNS);
        self.query(&sql, Vec::new())
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pearls", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Case-insensitive substring match over id, name, namespace,
    /// description and tags. A zero limit means [`DEFAULT_SEARCH_LIMIT`].
    pub fn search(&self, keyword: &str, limit: usize) -> Result<Vec<Pearl>> {
        let limit = if limit == 0 { DEFAULT_SEARCH_LIMIT } else { limit };
        let pattern = format!("%{}%", escape_like(keyword));

        let sql = format!(
            r#"
            SELECT {} FROM pearls
            WHERE id LIKE ?1 ESCAPE '\'
               OR name LIKE ?1 ESCAPE '\'
               OR namespace LIKE ?1 ESCAPE '\'
               OR description LIKE ?1 ESCAPE '\'
               OR EXISTS (
                   SELECT 1 FROM json_each(pearls.tags)
                   WHERE json_each.value LIKE ?1 ESCAPE '\'
               )
            ORDER BY namespace, name
            LIMIT ?2
            "#,
            COLUMNS
        );

        self.query(&sql, vec![Value::from(pattern), Value::from(limit as i64)])
    }

    /// Pearls with at least one glob matching `path`
    pub fn find_by_glob(&self, path: &str) -> Result<Vec<Pearl>> {
        let sql = format!(
            "SELECT {} FROM pearls WHERE globs != '[]' ORDER BY namespace, name",
            COLUMNS
        );
        let candidates = self.query(&sql, Vec::new())?;

        Ok(candidates
            .into_iter()
            .filter(|p| pearl::matches_path(path, &p.globs))
            .collect())
    }

    /// Pearls whose scopes contain exactly `scope`
    pub fn find_by_scope(&self, scope: &str) -> Result<Vec<Pearl>> {
        let sql = format!(
            "SELECT {} FROM pearls \
             WHERE EXISTS (SELECT 1 FROM json_each(pearls.scopes) WHERE value = ?1) \
             ORDER BY namespace, name",
            COLUMNS
        );
        self.query(&sql, vec![Value::from(scope.to_string())])
    }

    /// Reverse edges: pearls whose references contain `id`
    pub fn find_referencing(&self, id: &str) -> Result<Vec<Pearl>> {
        let sql = format!(
            "SELECT {} FROM pearls \
             WHERE EXISTS (SELECT 1 FROM json_each(pearls.refs) WHERE value = ?1) \
             ORDER BY namespace, name",
            COLUMNS
        );
        self.query(&sql, vec![Value::from(id.to_string())])
    }

    /// Drop every row (vectors included)
    pub fn clear(&self) -> Result<()> {
        self.conn.execute_batch("DELETE FROM pearl_embeddings; DELETE FROM pearls;")?;
        tracing::debug!("cleared index");
        Ok(())
    }

    /// Internal row key for an ID
    pub(crate) fn pk_of(&self, id: &str) -> Result<Option<i64>> {
        match self
            .conn
            .query_row("SELECT pk FROM pearls WHERE id = ?1", [id], |row| row.get(0))
        {
            Ok(pk) => Ok(Some(pk)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn query(&self, sql: &str, values: Vec<Value>) -> Result<Vec<Pearl>> {
        let mut stmt = self.conn.prepare(sql)?;
        let pearls = stmt
            .query_map(params_from_iter(values), row_to_pearl)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pearls)
    }
}

/// Bind values in `COLUMNS` order
fn encode(p: &Pearl) -> Result<Vec<Value>> {
    let connection = match &p.connection {
        Some(c) => Some(serde_json::to_string(c)?),
        None => None,
    };

    Ok(vec![
        Value::from(p.id.clone()),
        Value::from(p.name.clone()),
        Value::from(p.namespace.clone()),
        Value::from(p.pearl_type.as_str().to_string()),
        Value::from(serde_json::to_string(&p.tags)?),
        Value::from(serde_json::to_string(&p.globs)?),
        Value::from(serde_json::to_string(&p.scopes)?),
        Value::from(p.description.clone()),
        Value::from(p.content_path.clone()),
        Value::from(p.content_hash.clone()),
        Value::from(serde_json::to_string(&p.references)?),
        Value::from(p.parent.clone()),
        Value::from(connection),
        Value::from(p.required),
        Value::from(p.priority),
        Value::from(p.created_at.to_rfc3339()),
        Value::from(p.updated_at.to_rfc3339()),
        Value::from(p.created_by.clone()),
        Value::from(p.status.as_str().to_string()),
    ])
}

fn row_to_pearl(row: &Row) -> rusqlite::Result<Pearl> {
    let connection: Option<String> = row.get("connection")?;
    let connection = match connection {
        Some(json) => Some(
            serde_json::from_str(&json).map_err(|e| conversion_error(row, "connection", e))?,
        ),
        None => None,
    };

    let type_str: String = row.get("type")?;
    let status_str: String = row.get("status")?;

    Ok(Pearl {
        id: row.get("id")?,
        name: row.get("name")?,
        namespace: row.get("namespace")?,
        pearl_type: PearlType::new(type_str).map_err(|e| conversion_error(row, "type", e))?,
        tags: json_column(row, "tags")?,
        globs: json_column(row, "globs")?,
        scopes: json_column(row, "scopes")?,
        description: row.get("description")?,
        content_path: row.get("content_path")?,
        content_hash: row.get("content_hash")?,
        references: json_column(row, "refs")?,
        parent: row.get("parent")?,
        connection,
        required: row.get("required")?,
        priority: row.get("priority")?,
        created_at: time_column(row, "created_at")?,
        updated_at: time_column(row, "updated_at")?,
        created_by: row.get("created_by")?,
        status: status_str
            .parse()
            .map_err(|e| conversion_error(row, "status", e))?,
    })
}

fn json_column<T: DeserializeOwned>(row: &Row, name: &str) -> rusqlite::Result<T> {
    let raw: String = row.get(name)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(row, name, e))
}

fn time_column(row: &Row, name: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(name)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(row, name, e))
}

fn conversion_error<E>(row: &Row, name: &str, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    let idx = row.as_ref().column_index(name).unwrap_or(0);
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

/// Map a UNIQUE / PRIMARY KEY violation to `AlreadyExists`
pub(crate) fn unique_violation(e: rusqlite::Error, id: &str) -> Error {
    if let rusqlite::Error::SqliteFailure(ref f, _) = e {
        if f.code == ErrorCode::ConstraintViolation
            && (f.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                || f.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        {
            return Error::AlreadyExists(id.to_string());
        }
    }
    Error::Database(e)
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

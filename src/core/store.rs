//! Store - Orchestrates content files, the index and the log
//!
//! The only entry point callers use. Mutations touch the layers in a
//! fixed order so a partial failure never leaves the index pointing at
//! content that does not exist:
//!
//! ```text
//! create: content -> index (rollback content on failure) -> log append -> vector
//! update: content -> index -> full log rewrite -> vector (content changes only)
//! delete: vector -> index -> content (best effort) -> full log rewrite
//! ```
//!
//! The log always wins: [`Store::sync_from_log`] rebuilds the index from it,
//! [`Store::sync_to_log`] repairs a log that fell behind.
//!
//! Embedding failures are logged and absorbed so vector search being
//! unavailable never blocks CRUD.

use std::path::Path;

use chrono::Utc;
use serde::Serialize;

use super::content::{self, ContentStore};
use super::embedding::Embedder;
use super::error::{Error, Result, ResultExt};
use super::index::{IndexStore, ListFilter};
use super::log::LogStore;
use super::pearl::Pearl;

/// Outcome of [`Store::rebuild_vector_index`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub total: usize,
    pub indexed: usize,
    pub failed: usize,
}

pub struct Store {
    index: IndexStore,
    log: LogStore,
    content: ContentStore,
    embedder: Option<Box<dyn Embedder>>,
}

impl Store {
    pub fn new(index: IndexStore, log: LogStore, content: ContentStore) -> Self {
        Self {
            index,
            log,
            content,
            embedder: None,
        }
    }

    /// Open the three layers at their on-disk locations
    pub fn open(db: &Path, log: &Path, content_dir: &Path) -> Result<Self> {
        let index = IndexStore::open(db).with_context(|| format!("open index {}", db.display()))?;
        Ok(Self::new(
            index,
            LogStore::new(log),
            ContentStore::new(content_dir),
        ))
    }

    pub fn set_embedder(&mut self, embedder: Box<dyn Embedder>) {
        self.embedder = Some(embedder);
    }

    pub fn has_embedder(&self) -> bool {
        self.embedder.is_some()
    }

    pub fn index(&self) -> &IndexStore {
        &self.index
    }

    pub fn log(&self) -> &LogStore {
        &self.log
    }

    pub fn content(&self) -> &ContentStore {
        &self.content
    }

    // ---- mutations -------------------------------------------------------

    /// Create a pearl with an optional markdown body (empty = none).
    ///
    /// Fails with `AlreadyExists` before touching any layer if the ID is
    /// taken. If the index insert fails the freshly written content file is
    /// removed. A failed log append is reported but not rolled back.
    pub fn create(&self, mut pearl: Pearl, body: &str) -> Result<Pearl> {
        let id = pearl.id.clone();
        pearl
            .validate()
            .with_context(|| format!("create pearl {}", id))?;

        if self.index.exists(&id)? {
            return Err(Error::AlreadyExists(id.clone()).context(format!("create pearl {}", id)));
        }

        if pearl.content_path.is_empty() {
            pearl.content_path = ContentStore::path_for(&pearl.namespace, &pearl.name);
        }

        let wrote_content = !body.is_empty();
        if wrote_content {
            self.content
                .write(&pearl.content_path, body)
                .with_context(|| format!("write content for {}", id))?;
            pearl.content_hash = content::hash_str(body);
        }

        if let Err(e) = self.index.insert(&pearl) {
            if wrote_content {
                tracing::warn!(id = %id, path = %pearl.content_path, "index insert failed, removing content file");
                if let Err(cleanup) = self.content.delete(&pearl.content_path) {
                    tracing::warn!(id = %id, error = %cleanup, "content rollback failed");
                }
            }
            return Err(e.context(format!("insert pearl {}", id)));
        }

        self.log
            .append(&pearl)
            .with_context(|| format!("append pearl {} to log", id))?;

        if self.embedder.is_some() {
            self.embed_pearl(&pearl, body, false);
        }

        tracing::info!(id = %id, "created pearl");
        Ok(pearl)
    }

    /// Persist edited metadata and, when `body` is `Some`, a new content body.
    /// The vector is regenerated only when the body changes.
    pub fn update(&self, mut pearl: Pearl, body: Option<&str>) -> Result<Pearl> {
        let id = pearl.id.clone();
        pearl
            .validate()
            .with_context(|| format!("update pearl {}", id))?;

        // Content is written before the index row, so check first
        if !self.index.exists(&id)? {
            return Err(Error::NotFound(format!("pearl {}", id))
                .context(format!("update pearl {}", id)));
        }

        if let Some(body) = body {
            if pearl.content_path.is_empty() {
                pearl.content_path = ContentStore::path_for(&pearl.namespace, &pearl.name);
            }
            self.content
                .write(&pearl.content_path, body)
                .with_context(|| format!("write content for {}", id))?;
            pearl.content_hash = content::hash_str(body);
        }

        pearl.updated_at = Utc::now();

        self.index
            .update(&pearl)
            .with_context(|| format!("update pearl {}", id))?;

        self.sync_to_log()
            .with_context(|| format!("rewrite log after updating {}", id))?;

        if let (Some(body), true) = (body, self.embedder.is_some()) {
            self.embed_pearl(&pearl, body, true);
        }

        tracing::info!(id = %id, "updated pearl");
        Ok(pearl)
    }

    /// Hard delete from every layer; returns the removed pearl
    pub fn delete(&self, id: &str) -> Result<Pearl> {
        let pearl = self
            .index
            .get(id)?
            .ok_or_else(|| Error::NotFound(format!("pearl {}", id)))
            .with_context(|| format!("delete pearl {}", id))?;

        // The row delete cascades too; explicit so the order is obvious
        self.index
            .delete_vector(id)
            .with_context(|| format!("delete vector for {}", id))?;

        self.index
            .delete(id)
            .with_context(|| format!("delete pearl {}", id))?;

        if !pearl.content_path.is_empty() {
            if let Err(e) = self.content.delete(&pearl.content_path) {
                tracing::warn!(id, error = %e, "could not remove content file");
            }
        }

        self.sync_to_log()
            .with_context(|| format!("rewrite log after deleting {}", id))?;

        tracing::info!(id, "deleted pearl");
        Ok(pearl)
    }

    // ---- retrieval -------------------------------------------------------

    pub fn get(&self, id: &str) -> Result<Option<Pearl>> {
        self.index.get(id)
    }

    /// Fetch a pearl or fail with `NotFound`
    pub fn require(&self, id: &str) -> Result<Pearl> {
        self.index
            .get(id)?
            .ok_or_else(|| Error::NotFound(format!("pearl {}", id)))
    }

    /// Markdown body; empty when the pearl has no content path
    pub fn get_content(&self, pearl: &Pearl) -> Result<String> {
        if pearl.content_path.is_empty() {
            return Ok(String::new());
        }
        self.content
            .read(&pearl.content_path)
            .with_context(|| format!("read content for {}", pearl.id))
    }

    pub fn list(&self, filter: &ListFilter) -> Result<Vec<Pearl>> {
        self.index.list(filter)
    }

    pub fn search(&self, keyword: &str, limit: usize) -> Result<Vec<Pearl>> {
        self.index.search(keyword, limit)
    }

    pub fn find_by_glob(&self, path: &str) -> Result<Vec<Pearl>> {
        self.index.find_by_glob(path)
    }

    pub fn find_by_scope(&self, scope: &str) -> Result<Vec<Pearl>> {
        self.index.find_by_scope(scope)
    }

    pub fn find_referencing(&self, id: &str) -> Result<Vec<Pearl>> {
        self.index.find_referencing(id)
    }

    /// Nearest pearls to `query` with their L2 distance
    pub fn search_semantic(&self, query: &str, k: usize) -> Result<Vec<(Pearl, f32)>> {
        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| Error::validation("semantic search: no embedder configured"))?;

        let vector = embedder.embed(query)?;
        let hits = self.index.search_nearest(&vector, k)?;

        let mut results = Vec::with_capacity(hits.len());
        for (id, distance) in hits {
            if let Some(p) = self.index.get(&id)? {
                results.push((p, distance));
            }
        }
        Ok(results)
    }

    // ---- repair ----------------------------------------------------------

    /// Destructive rebuild of the index from the log. Returns the pearl count.
    pub fn sync_from_log(&self) -> Result<usize> {
        let pearls = self.log.read_all().with_context(|| "read log".to_string())?;

        self.index.clear().with_context(|| "clear index".to_string())?;
        for p in &pearls {
            self.index
                .insert(p)
                .with_context(|| format!("insert pearl {}", p.id))?;
        }

        tracing::info!(count = pearls.len(), "rebuilt index from log");
        Ok(pearls.len())
    }

    /// Rewrite the log from the index. Returns the pearl count.
    pub fn sync_to_log(&self) -> Result<usize> {
        let pearls = self.index.all().with_context(|| "read index".to_string())?;
        self.log.write_all(&pearls)?;
        tracing::debug!(count = pearls.len(), "exported index to log");
        Ok(pearls.len())
    }

    /// Recompute content hashes from disk; missing files are skipped.
    /// Returns how many pearls changed.
    pub fn refresh_content_hashes(&self) -> Result<usize> {
        let mut changed = 0;

        for mut p in self.index.all()? {
            if p.content_path.is_empty() {
                continue;
            }
            let hash = match self.content.hash(&p.content_path) {
                Ok(h) => h,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e.context(format!("hash content for {}", p.id))),
            };
            if hash != p.content_hash {
                tracing::debug!(id = %p.id, "content hash changed");
                p.content_hash = hash;
                self.index
                    .update(&p)
                    .with_context(|| format!("update pearl {}", p.id))?;
                changed += 1;
            }
        }

        if changed > 0 {
            self.sync_to_log()?;
        }
        tracing::info!(changed, "refreshed content hashes");
        Ok(changed)
    }

    /// Drop every vector and re-embed every pearl
    pub fn rebuild_vector_index(&self) -> Result<IndexReport> {
        if self.embedder.is_none() {
            return Err(Error::validation("vector index: no embedder configured"));
        }

        self.index.clear_vectors()?;

        let pearls = self.index.all()?;
        let mut report = IndexReport {
            total: pearls.len(),
            ..Default::default()
        };

        for p in &pearls {
            let body = match self.get_content(p) {
                Ok(b) => b,
                Err(e) if e.is_not_found() => String::new(),
                Err(e) => return Err(e),
            };
            if self.embed_pearl(p, &body, false) {
                report.indexed += 1;
            } else {
                report.failed += 1;
            }
        }

        tracing::info!(
            total = report.total,
            indexed = report.indexed,
            failed = report.failed,
            "rebuilt vector index"
        );
        Ok(report)
    }

    /// Embed and store one pearl's vector. Failures are logged, never raised.
    fn embed_pearl(&self, pearl: &Pearl, body: &str, replace: bool) -> bool {
        let Some(embedder) = self.embedder.as_ref() else {
            return false;
        };

        let text = embedding_text(pearl, body);
        let stored = embedder
            .embed(&text)
            .map_err(Error::from)
            .and_then(|vector| {
                if replace {
                    self.index.replace_vector(&pearl.id, &vector)
                } else {
                    self.index.insert_vector(&pearl.id, &vector)
                }
            });

        match stored {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(id = %pearl.id, error = %e, "embedding skipped");
                false
            }
        }
    }
}

/// Text the embedder sees for a pearl
pub fn embedding_text(pearl: &Pearl, body: &str) -> String {
    format!("{}\n\n{}", pearl.description, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::embedding::{EmbedError, HashingEmbedder};
    use crate::core::pearl::{PearlType, Status};
    use anyhow::Result;
    use tempfile::{tempdir, TempDir};

    fn store(dir: &TempDir) -> Result<Store> {
        let root = dir.path();
        Ok(Store::open(
            &root.join("pearls.db"),
            &root.join("pearls.jsonl"),
            &root.join("content"),
        )?)
    }

    fn pearl(id: &str) -> Pearl {
        Pearl::new(id, PearlType::new("table").unwrap()).unwrap()
    }

    fn snapshot(store: &Store) -> Result<Vec<Pearl>> {
        Ok(store.index().all()?)
    }

    #[test]
    fn test_round_trip_content() -> Result<()> {
        let dir = tempdir()?;
        let store = store(&dir)?;
        let body = "# users\n\nAccounts table.\n";

        store.create(pearl("db.postgres.users"), body)?;

        let got = store.get("db.postgres.users")?.expect("created");
        assert_eq!(store.get_content(&got)?, body);
        assert_eq!(got.content_hash, content::hash_str(body));
        assert_eq!(store.log().read_all()?, vec![got]);
        Ok(())
    }

    #[test]
    fn test_create_duplicate_leaves_layers_untouched() -> Result<()> {
        let dir = tempdir()?;
        let store = store(&dir)?;
        store.create(pearl("db.users"), "original\n")?;

        let index_before = snapshot(&store)?;
        let log_before = std::fs::read(store.log().path())?;
        let files_before = store.content().list_all_files()?;

        let err = store.create(pearl("db.users"), "clobber\n").unwrap_err();
        assert!(err.is_already_exists());

        assert_eq!(snapshot(&store)?, index_before);
        assert_eq!(std::fs::read(store.log().path())?, log_before);
        assert_eq!(store.content().list_all_files()?, files_before);
        assert_eq!(store.content().read("db/users.md")?, "original\n");
        Ok(())
    }

    #[test]
    fn test_create_rolls_back_content_when_index_insert_fails() -> Result<()> {
        let dir = tempdir()?;
        let store = store(&dir)?;
        store.index().conn().execute_batch(
            "CREATE TRIGGER reject_inserts BEFORE INSERT ON pearls \
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )?;

        let err = store.create(pearl("db.orders"), "# orders\n").unwrap_err();
        assert!(!err.is_already_exists());
        assert!(!store.content().exists("db/orders.md"));
        assert!(store.log().read_all()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_create_validates() -> Result<()> {
        let dir = tempdir()?;
        let store = store(&dir)?;
        let bad = pearl("db.users").with_scopes(vec!["Not A Scope".into()]);
        assert!(store.create(bad, "").unwrap_err().is_validation());
        assert_eq!(store.index().count()?, 0);
        Ok(())
    }

    #[test]
    fn test_users_lifecycle() -> Result<()> {
        let dir = tempdir()?;
        let store = store(&dir)?;

        let created = store.create(pearl("db.postgres.users"), "")?;
        assert_eq!(created.content_path, "db/postgres/users.md");
        assert!(created.content_hash.is_empty());

        let updated = store.update(created, Some("# users\n"))?;
        assert_eq!(updated.content_hash, content::hash_str("# users\n"));
        assert_eq!(
            store.get("db.postgres.users")?.unwrap().content_hash,
            content::hash_str("# users\n")
        );

        store.delete("db.postgres.users")?;
        assert!(store.get("db.postgres.users")?.is_none());
        assert!(!store.content().exists("db/postgres/users.md"));
        assert!(store.log().read_all()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_update_rewrites_log_without_duplicates() -> Result<()> {
        let dir = tempdir()?;
        let store = store(&dir)?;
        let p = store.create(pearl("db.users"), "")?;
        store.create(pearl("db.orders"), "")?;

        let before = p.updated_at;
        let edited = store.update(p.with_description("accounts"), None)?;
        assert!(edited.updated_at >= before);

        let log = store.log().read_all()?;
        assert_eq!(log.len(), 2);
        assert_eq!(log.iter().filter(|p| p.id == "db.users").count(), 1);
        assert_eq!(
            log.iter().find(|p| p.id == "db.users").unwrap().description,
            "accounts"
        );
        Ok(())
    }

    #[test]
    fn test_update_and_delete_missing() -> Result<()> {
        let dir = tempdir()?;
        let store = store(&dir)?;
        assert!(store.update(pearl("ghost"), None).unwrap_err().is_not_found());
        assert!(store.delete("ghost").unwrap_err().is_not_found());
        Ok(())
    }

    #[test]
    fn test_update_missing_with_body_leaves_no_file() -> Result<()> {
        let dir = tempdir()?;
        let store = store(&dir)?;
        let err = store.update(pearl("db.ghost"), Some("# Ghost\n")).unwrap_err();
        assert!(err.is_not_found());
        assert!(!store.content().exists("db/ghost.md"));
        assert!(store.log().read_all()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_archive_keeps_all_layers() -> Result<()> {
        let dir = tempdir()?;
        let store = store(&dir)?;
        let mut p = store.create(pearl("db.legacy"), "old\n")?;

        p.status = Status::Archived;
        store.update(p, None)?;

        let got = store.require("db.legacy")?;
        assert_eq!(got.status, Status::Archived);
        assert!(store.content().exists("db/legacy.md"));
        assert_eq!(store.log().read_all()?[0].status, Status::Archived);
        Ok(())
    }

    #[test]
    fn test_rebuild_is_idempotent() -> Result<()> {
        let dir = tempdir()?;
        let store = store(&dir)?;

        let a = store.create(
            pearl("db.users")
                .with_tags(vec!["core".into()])
                .with_globs(vec!["src/**/*.rs".into()])
                .with_required(3),
            "# users\n",
        )?;
        store.create(pearl("db.orders").with_references(vec!["db.users".into()]), "")?;
        store.create(pearl("db.tmp"), "x")?;
        store.update(a.with_description("accounts"), Some("# users v2\n"))?;
        store.delete("db.tmp")?;

        let before = snapshot(&store)?;
        store.sync_to_log()?;
        let n = store.sync_from_log()?;
        assert_eq!(n, 2);
        assert_eq!(snapshot(&store)?, before);
        Ok(())
    }

    #[test]
    fn test_sync_from_log_wins() -> Result<()> {
        let dir = tempdir()?;
        let store = store(&dir)?;
        store.create(pearl("db.users"), "")?;

        // Index drifts ahead of the log
        store.index().insert(&pearl("db.stray"))?;
        store.sync_from_log()?;
        assert!(store.get("db.stray")?.is_none());
        assert_eq!(store.index().count()?, 1);
        Ok(())
    }

    #[test]
    fn test_sync_to_log_repairs_missing_append() -> Result<()> {
        let dir = tempdir()?;
        let store = store(&dir)?;
        store.create(pearl("db.users"), "")?;
        store.index().insert(&pearl("db.orders"))?;
        assert_eq!(store.log().read_all()?.len(), 1);

        assert_eq!(store.sync_to_log()?, 2);
        assert_eq!(store.log().read_all()?.len(), 2);
        Ok(())
    }

    #[test]
    fn test_refresh_content_hashes() -> Result<()> {
        let dir = tempdir()?;
        let store = store(&dir)?;
        store.create(pearl("db.users"), "v1\n")?;
        store.create(pearl("db.orders"), "")?;

        store.content().write("db/users.md", "v2 edited by hand\n")?;
        assert_eq!(store.refresh_content_hashes()?, 1);

        let got = store.require("db.users")?;
        assert_eq!(got.content_hash, content::hash_str("v2 edited by hand\n"));
        assert_eq!(
            store.log().read_all()?[0].content_hash,
            content::hash_str("v2 edited by hand\n")
        );
        assert_eq!(store.refresh_content_hashes()?, 0);
        Ok(())
    }

    #[test]
    fn test_reference_symmetry_survives_updates() -> Result<()> {
        let dir = tempdir()?;
        let store = store(&dir)?;
        store.create(pearl("db.users"), "")?;
        let orders =
            store.create(pearl("db.orders").with_references(vec!["db.users".into()]), "")?;
        let other = store.create(pearl("db.other"), "")?;

        store.update(other.with_description("unrelated"), Some("body"))?;
        store.update(orders.with_tags(vec!["billing".into()]), None)?;

        let incoming = store.find_referencing("db.users")?;
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].id, "db.orders");
        Ok(())
    }

    #[test]
    fn test_semantic_search_requires_embedder() -> Result<()> {
        let dir = tempdir()?;
        let store = store(&dir)?;
        assert!(store.search_semantic("users", 5).unwrap_err().is_validation());
        assert!(store.rebuild_vector_index().unwrap_err().is_validation());
        Ok(())
    }

    #[test]
    fn test_embedder_keeps_vectors_current() -> Result<()> {
        let dir = tempdir()?;
        let mut store = store(&dir)?;
        store.set_embedder(Box::new(HashingEmbedder::default()));

        store.create(
            pearl("db.users").with_description("user accounts login"),
            "email password",
        )?;
        store.create(
            pearl("api.stripe").with_description("payments invoices"),
            "charges refunds",
        )?;
        assert_eq!(store.index().vector_count()?, 2);

        let hits = store.search_semantic("login email", 1)?;
        assert_eq!(hits[0].0.id, "db.users");

        store.delete("db.users")?;
        assert_eq!(store.index().vector_count()?, 1);
        assert!(!store.index().has_vector("db.users")?);
        Ok(())
    }

    #[test]
    fn test_metadata_update_leaves_vector_alone() -> Result<()> {
        let dir = tempdir()?;
        let mut store = store(&dir)?;
        store.set_embedder(Box::new(HashingEmbedder::new(16)));

        let p = store.create(pearl("db.users").with_description("accounts"), "")?;
        let query = HashingEmbedder::new(16).embed("accounts")?;
        let before = store.index().search_nearest(&query, 1)?;

        store.update(p.with_description("something else entirely"), None)?;
        let after = store.index().search_nearest(&query, 1)?;
        assert_eq!(before, after);
        Ok(())
    }

    struct FailingEmbedder;

    impl Embedder for FailingEmbedder {
        fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, EmbedError> {
            Err(EmbedError::Runtime("model offline".into()))
        }

        fn dimension(&self) -> usize {
            8
        }
    }

    #[test]
    fn test_embed_failure_does_not_block_create() -> Result<()> {
        let dir = tempdir()?;
        let mut store = store(&dir)?;
        store.set_embedder(Box::new(FailingEmbedder));

        store.create(pearl("db.users").with_description("accounts"), "body")?;
        assert!(store.get("db.users")?.is_some());
        assert_eq!(store.index().vector_count()?, 0);

        let report = store.rebuild_vector_index()?;
        assert_eq!(
            report,
            IndexReport {
                total: 1,
                indexed: 0,
                failed: 1
            }
        );
        Ok(())
    }

    #[test]
    fn test_rebuild_vector_index() -> Result<()> {
        let dir = tempdir()?;
        let mut store = store(&dir)?;
        store.create(pearl("db.users").with_description("accounts"), "")?;
        store.create(pearl("db.empty"), "")?;

        store.set_embedder(Box::new(HashingEmbedder::default()));
        let report = store.rebuild_vector_index()?;
        assert_eq!(report.total, 2);
        assert_eq!(report.indexed, 1);
        assert_eq!(report.failed, 1);
        assert!(store.index().has_vector("db.users")?);
        Ok(())
    }
}

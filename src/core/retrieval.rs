//! Retrieval - Push lookup and agent context rendering
//!
//! Push retrieval collects pearls by file path (glob match) and topical
//! scope, merges the hits, and renders them as one markdown document.
//! Merged results keep first-seen order and never repeat a pearl.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::error::Result;
use super::index::ListFilter;
use super::pearl::Pearl;
use super::store::Store;

/// Separator between pearls in rendered context
pub const SEPARATOR: &str = "\n---\n\n";

/// Merge result lists, keeping the first occurrence of each ID
pub fn union_dedup<I>(lists: I) -> Vec<Pearl>
where
    I: IntoIterator<Item = Vec<Pearl>>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for list in lists {
        for p in list {
            if seen.insert(p.id.clone()) {
                out.push(p);
            }
        }
    }
    out
}

/// Pearls matching any of `paths` by glob or any of `scopes` exactly
pub fn push_retrieve(store: &Store, paths: &[String], scopes: &[String]) -> Result<Vec<Pearl>> {
    let mut lists = Vec::with_capacity(paths.len() + scopes.len());
    for path in paths {
        lists.push(store.find_by_glob(path)?);
    }
    for scope in scopes {
        lists.push(store.find_by_scope(scope)?);
    }
    Ok(union_dedup(lists))
}

/// Resolve requested IDs (optionally followed by their outgoing references)
/// into pearls. Unknown IDs are returned separately instead of failing.
pub fn resolve_ids(
    store: &Store,
    ids: &[String],
    with_refs: bool,
) -> Result<(Vec<Pearl>, Vec<String>)> {
    let mut wanted: Vec<String> = Vec::new();
    let mut seen = HashSet::new();
    for id in ids {
        if seen.insert(id.clone()) {
            wanted.push(id.clone());
        }
    }

    if with_refs {
        for id in ids {
            if let Some(p) = store.get(id)? {
                for r in p.references {
                    if seen.insert(r.clone()) {
                        wanted.push(r);
                    }
                }
            }
        }
    }

    let mut found = Vec::new();
    let mut missing = Vec::new();
    for id in wanted {
        match store.get(&id)? {
            Some(p) => found.push(p),
            None => missing.push(id),
        }
    }
    Ok((found, missing))
}

/// Required pearls, highest priority first
pub fn required_bundle(store: &Store) -> Result<Vec<Pearl>> {
    store.list(&ListFilter {
        required: Some(true),
        ..Default::default()
    })
}

/// Metadata-only block for one pearl
pub fn render_brief(p: &Pearl) -> String {
    let mut out = format!("## {}\n\n", p.id);
    out.push_str(&format!("- **Type:** {}\n", p.pearl_type));
    out.push_str(&format!("- **Status:** {}\n", p.status));
    if !p.description.is_empty() {
        out.push_str(&format!("- **Description:** {}\n", p.description));
    }
    if !p.tags.is_empty() {
        out.push_str(&format!("- **Tags:** {}\n", p.tags.join(", ")));
    }
    if let Some(conn) = &p.connection {
        out.push_str(&format!("- **Connection:** {}", conn.kind));
        if !conn.host.is_empty() {
            out.push_str(&format!(" @ {}", conn.host));
        }
        if !conn.database.is_empty() {
            out.push_str(&format!("/{}", conn.database));
        }
        out.push('\n');
    }
    out.push('\n');
    out
}

/// Concatenate pearls as markdown. In full mode a pearl whose content
/// cannot be read falls back to its heading and description.
pub fn render_context(store: &Store, pearls: &[Pearl], brief: bool) -> String {
    let mut out = String::new();

    for (i, p) in pearls.iter().enumerate() {
        if i > 0 {
            out.push_str(SEPARATOR);
        }

        if brief {
            out.push_str(&render_brief(p));
            continue;
        }

        match store.get_content(p) {
            Ok(body) if !body.is_empty() => {
                out.push_str(&body);
                if !body.ends_with('\n') {
                    out.push('\n');
                }
            }
            Ok(_) => {
                out.push_str(&format!("## {}\n\n{}\n\n", p.id, p.description));
            }
            Err(e) => {
                tracing::warn!(id = %p.id, error = %e, "could not read content");
                out.push_str(&format!("## {}\n\n{}\n\n", p.id, p.description));
            }
        }
    }

    out
}

/// `"3 table, 2 api, 1 convention"`: count descending, then type name
pub fn type_summary(pearls: &[Pearl]) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for p in pearls {
        *counts.entry(p.pearl_type.as_str()).or_default() += 1;
    }

    let mut sorted: Vec<(&str, usize)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    sorted
        .iter()
        .map(|(name, count)| format!("{} {}", count, name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Distinct scopes, sorted
pub fn scope_summary(pearls: &[Pearl]) -> Vec<String> {
    pearls
        .iter()
        .flat_map(|p| p.scopes.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pearl::{ConnectionInfo, PearlType};
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

    fn pearl(id: &str, ty: &str) -> Pearl {
        Pearl::new(id, PearlType::new(ty).unwrap()).unwrap()
    }

    #[test]
    fn test_glob_scope_union_dedup() -> Result<()> {
        let dir = tempdir()?;
        let store = store(&dir)?;

        // X matches the glob and also carries the scope
        store.create(
            pearl("db.users", "table")
                .with_globs(vec!["src/models/**/*.go".into()])
                .with_scopes(vec!["backend".into()]),
            "",
        )?;
        store.create(pearl("guide", "convention").with_scopes(vec!["backend".into()]), "")?;
        store.create(pearl("api.stripe", "api"), "")?;

        let hits = push_retrieve(
            &store,
            &["src/models/user.go".to_string()],
            &["backend".to_string()],
        )?;
        let ids: Vec<&str> = hits.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["db.users", "guide"]);
        Ok(())
    }

    #[test]
    fn test_union_dedup_keeps_first() {
        let a = pearl("a", "table");
        let b = pearl("b", "table");
        let merged = union_dedup(vec![vec![a.clone(), b.clone()], vec![b, a]]);
        let ids: Vec<&str> = merged.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_resolve_ids_with_refs() -> Result<()> {
        let dir = tempdir()?;
        let store = store(&dir)?;
        store.create(pearl("db.users", "table"), "")?;
        store.create(
            pearl("db.orders", "table").with_references(vec!["db.users".into(), "db.gone".into()]),
            "",
        )?;

        let (found, missing) = resolve_ids(&store, &["db.orders".into()], false)?;
        assert_eq!(found.len(), 1);
        assert!(missing.is_empty());

        let (found, missing) =
            resolve_ids(&store, &["db.orders".into(), "db.orders".into()], true)?;
        let ids: Vec<&str> = found.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["db.orders", "db.users"]);
        assert_eq!(missing, vec!["db.gone".to_string()]);
        Ok(())
    }

    #[test]
    fn test_required_bundle_order() -> Result<()> {
        let dir = tempdir()?;
        let store = store(&dir)?;
        store.create(pearl("low", "convention").with_required(1), "")?;
        store.create(pearl("high", "convention").with_required(9), "")?;
        store.create(pearl("optional", "convention"), "")?;

        let ids: Vec<String> = required_bundle(&store)?.into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["high", "low"]);
        Ok(())
    }

    #[test]
    fn test_render_context_full_and_brief() -> Result<()> {
        let dir = tempdir()?;
        let store = store(&dir)?;
        let users = store.create(pearl("db.users", "table"), "# users\nbody")?;
        let mut orders = pearl("db.orders", "table").with_description("Orders");
        orders.connection = Some(ConnectionInfo {
            kind: "postgres".into(),
            host: "${DB_HOST}".into(),
            database: "shop".into(),
            ..Default::default()
        });
        let orders = store.create(orders, "")?;

        let full = render_context(&store, &[users.clone(), orders.clone()], false);
        assert_eq!(full, "# users\nbody\n\n---\n\n## db.orders\n\nOrders\n\n");

        let brief = render_context(&store, &[orders], true);
        assert!(brief.starts_with("## db.orders\n\n- **Type:** table\n- **Status:** active\n"));
        assert!(brief.contains("- **Connection:** postgres @ ${DB_HOST}/shop\n"));
        Ok(())
    }

    #[test]
    fn test_summaries() {
        let pearls = vec![
            pearl("a", "table"),
            pearl("b", "table"),
            pearl("c", "api").with_scopes(vec!["payments".into()]),
            pearl("d", "convention").with_scopes(vec!["backend".into(), "payments".into()]),
        ];
        assert_eq!(type_summary(&pearls), "2 table, 1 api, 1 convention");
        assert_eq!(scope_summary(&pearls), vec!["backend", "payments"]);
        assert_eq!(type_summary(&[]), "");
    }
}

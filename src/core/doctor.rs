//! Doctor - Read-only consistency audit
//!
//! Compares the log, the index and the content tree. Each check reports
//! pass/fail with human-readable issues; nothing is ever repaired here.

use std::collections::HashSet;
use std::fmt::Display;

use serde::Serialize;

use super::store::Store;

/// Result of one health check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
}

impl CheckResult {
    fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            issues: Vec::new(),
        }
    }

    fn fail(name: impl Into<String>, issues: Vec<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            issues,
        }
    }
}

/// Run all five checks. `config` is the outcome of loading the config file.
pub fn run_all<E: Display>(store: &Store, config: Result<(), E>) -> Vec<CheckResult> {
    vec![
        check_log_sync(store),
        check_orphaned_content(store),
        check_missing_content(store),
        check_broken_references(store),
        check_config(config),
    ]
}

pub fn all_passed(checks: &[CheckResult]) -> bool {
    checks.iter().all(|c| c.passed)
}

/// Log and index hold the same set of IDs
pub fn check_log_sync(store: &Store) -> CheckResult {
    let name = "JSONL/SQLite in sync";

    let logged = match store.log().read_all() {
        Ok(p) => p,
        Err(e) => return CheckResult::fail(name, vec![format!("read log: {}", e)]),
    };
    let indexed = match store.index().all() {
        Ok(p) => p,
        Err(e) => return CheckResult::fail(name, vec![format!("list index: {}", e)]),
    };

    if logged.len() != indexed.len() {
        return CheckResult::fail(
            name,
            vec![format!(
                "count mismatch: JSONL={}, SQLite={}",
                logged.len(),
                indexed.len()
            )],
        );
    }

    let logged_ids: HashSet<&str> = logged.iter().map(|p| p.id.as_str()).collect();
    let missing: Vec<&str> = indexed
        .iter()
        .map(|p| p.id.as_str())
        .filter(|id| !logged_ids.contains(id))
        .collect();

    if !missing.is_empty() {
        return CheckResult::fail(
            name,
            vec![format!("in SQLite but not JSONL: {:?}", missing)],
        );
    }

    CheckResult::pass(format!("{} ({} pearls)", name, indexed.len()))
}

/// Every content file belongs to some pearl
pub fn check_orphaned_content(store: &Store) -> CheckResult {
    let name = "No orphaned content files";

    let files = match store.content().list_all_files() {
        Ok(f) => f,
        Err(e) => return CheckResult::fail(name, vec![format!("list files: {}", e)]),
    };
    let pearls = match store.index().all() {
        Ok(p) => p,
        Err(e) => return CheckResult::fail(name, vec![format!("list pearls: {}", e)]),
    };

    let claimed: HashSet<&str> = pearls
        .iter()
        .filter(|p| !p.content_path.is_empty())
        .map(|p| p.content_path.as_str())
        .collect();

    let orphans: Vec<String> = files
        .into_iter()
        .filter(|f| !claimed.contains(f.as_str()))
        .collect();

    if orphans.is_empty() {
        CheckResult::pass(name)
    } else {
        CheckResult::fail(name, orphans)
    }
}

/// Every pearl with a content path has a file behind it
pub fn check_missing_content(store: &Store) -> CheckResult {
    let name = "No missing content files";

    let pearls = match store.index().all() {
        Ok(p) => p,
        Err(e) => return CheckResult::fail(name, vec![format!("list pearls: {}", e)]),
    };

    let missing: Vec<&str> = pearls
        .iter()
        .filter(|p| !p.content_path.is_empty() && !store.content().exists(&p.content_path))
        .map(|p| p.id.as_str())
        .collect();

    if missing.is_empty() {
        CheckResult::pass(name)
    } else {
        CheckResult::fail(
            name,
            vec![format!("{} pearls missing content: {:?}", missing.len(), missing)],
        )
    }
}

/// Every reference points at an existing pearl
pub fn check_broken_references(store: &Store) -> CheckResult {
    let name = "All references valid";

    let pearls = match store.index().all() {
        Ok(p) => p,
        Err(e) => return CheckResult::fail(name, vec![format!("list pearls: {}", e)]),
    };

    let ids: HashSet<&str> = pearls.iter().map(|p| p.id.as_str()).collect();
    let broken: Vec<String> = pearls
        .iter()
        .flat_map(|p| {
            p.references
                .iter()
                .filter(|r| !ids.contains(r.as_str()))
                .map(move |r| format!("{} -> {}", p.id, r))
        })
        .collect();

    if broken.is_empty() {
        CheckResult::pass(name)
    } else {
        CheckResult::fail(name, broken)
    }
}

pub fn check_config<E: Display>(loaded: Result<(), E>) -> CheckResult {
    let name = "Config valid";
    match loaded {
        Ok(()) => CheckResult::pass(name),
        Err(e) => CheckResult::fail(name, vec![e.to_string()]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pearl::{Pearl, PearlType};
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

    fn failed(checks: &[CheckResult]) -> Vec<&CheckResult> {
        checks.iter().filter(|c| !c.passed).collect()
    }

    #[test]
    fn test_healthy_catalog() -> Result<()> {
        let dir = tempdir()?;
        let store = store(&dir)?;
        store.create(pearl("db.users"), "# users\n")?;
        store.create(pearl("db.orders").with_references(vec!["db.users".into()]), "# orders\n")?;

        let checks = run_all(&store, Ok::<(), String>(()));
        assert_eq!(checks.len(), 5);
        assert!(all_passed(&checks), "{:?}", checks);
        assert_eq!(checks[0].name, "JSONL/SQLite in sync (2 pearls)");
        Ok(())
    }

    #[test]
    fn test_single_missing_content_file() -> Result<()> {
        let dir = tempdir()?;
        let store = store(&dir)?;
        let mut p = pearl("notes");
        p.content_path = "missing.md".into();
        store.create(p, "")?;

        let checks = run_all(&store, Ok::<(), String>(()));
        let failed = failed(&checks);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].name, "No missing content files");
        assert_eq!(failed[0].issues, vec![r#"1 pearls missing content: ["notes"]"#.to_string()]);
        Ok(())
    }

    #[test]
    fn test_drift_is_reported() -> Result<()> {
        let dir = tempdir()?;
        let store = store(&dir)?;
        store.create(pearl("db.users").with_references(vec!["db.gone".into()]), "# users\n")?;
        store.content().write("stray/file.md", "orphan")?;
        store.index().insert(&pearl("db.unlogged"))?;

        let checks = run_all(&store, Err("expected `=` at line 1"));
        assert_eq!(failed(&checks).len(), 4);

        assert_eq!(checks[0].issues, vec!["count mismatch: JSONL=1, SQLite=2".to_string()]);
        assert_eq!(checks[1].issues, vec!["stray/file.md".to_string()]);
        assert!(checks[2].passed);
        assert_eq!(checks[3].issues, vec!["db.users -> db.gone".to_string()]);
        assert_eq!(checks[4].issues, vec!["expected `=` at line 1".to_string()]);
        Ok(())
    }

    #[test]
    fn test_same_count_different_ids() -> Result<()> {
        let dir = tempdir()?;
        let store = store(&dir)?;
        store.create(pearl("a"), "")?;
        store.index().delete("a")?;
        store.index().insert(&pearl("b"))?;

        let check = check_log_sync(&store);
        assert!(!check.passed);
        assert_eq!(check.issues, vec![r#"in SQLite but not JSONL: ["b"]"#.to_string()]);
        Ok(())
    }

    #[test]
    fn test_json_omits_empty_issues() -> Result<()> {
        let json = serde_json::to_string(&CheckResult::pass("Config valid"))?;
        assert_eq!(json, r#"{"name":"Config valid","passed":true}"#);
        Ok(())
    }
}

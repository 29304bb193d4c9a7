//! Pearl - Core data structure
//!
//! A pearl is the unit of storage: metadata about a data asset or piece of
//! project knowledge plus an optional markdown body kept in a content file.
//!
//! # Key Properties
//! - **id**: dot-separated namespace path (e.g. `db.postgres.users`), unique
//! - **type**: open set, validated as `[a-z][a-z0-9-]*`
//! - **globs / scopes**: push-retrieval keys (file paths / topical labels)
//! - **content_hash**: SHA-256 of the content file

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use globset::{GlobBuilder, GlobMatcher};
use serde::{Deserialize, Serialize};

use super::error::{Error, Result};
use super::namespace::{self, Namespace};

/// Free-form record type (`table`, `api`, `convention`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PearlType(String);

impl PearlType {
    pub const TABLE: &'static str = "table";
    pub const SCHEMA: &'static str = "schema";
    pub const DATABASE: &'static str = "database";
    pub const API: &'static str = "api";
    pub const ENDPOINT: &'static str = "endpoint";

    pub fn new(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        if !is_label(&s) {
            return Err(Error::validation(format!(
                "type {:?}: must be lowercase alphanumeric + hyphens, starting with a letter",
                s
            )));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PearlType {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        PearlType::new(s)
    }
}

impl From<PearlType> for String {
    fn from(t: PearlType) -> Self {
        t.0
    }
}

impl FromStr for PearlType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        PearlType::new(s)
    }
}

impl fmt::Display for PearlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Active,
    Deprecated,
    /// Soft-deleted: kept in every layer
    Archived,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Deprecated => "deprecated",
            Status::Archived => "archived",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(Status::Active),
            "deprecated" => Ok(Status::Deprecated),
            "archived" => Ok(Status::Archived),
            _ => Err(Error::validation(format!(
                "status {:?}: must be active, deprecated, or archived",
                s
            ))),
        }
    }
}

/// External resource descriptor, passed through untouched
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// postgres, mysql, sqlite, s3, ...
    #[serde(rename = "type", default)]
    pub kind: String,

    /// May be an env var reference like `${DB_HOST}`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub database: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub schema: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, String>,
}

/// A pearl - one catalog record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pearl {
    pub id: String,

    /// Last ID segment
    pub name: String,

    /// All preceding ID segments, empty for top-level pearls
    #[serde(default)]
    pub namespace: String,

    #[serde(rename = "type")]
    pub pearl_type: PearlType,

    #[serde(default)]
    pub tags: Vec<String>,

    /// File-path patterns (`src/models/**/*.go`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub globs: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,

    #[serde(default)]
    pub description: String,

    /// Relative to the content root
    #[serde(default)]
    pub content_path: String,

    /// Hex SHA-256 of the content file, empty when there is no content
    #[serde(default)]
    pub content_hash: String,

    /// IDs of other pearls (directed, may be cyclic)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionInfo>,

    /// Included unconditionally in the required-context bundle
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,

    /// Higher first
    #[serde(default, skip_serializing_if = "is_zero")]
    pub priority: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub created_by: String,

    #[serde(default)]
    pub status: Status,
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn is_zero(n: &i64) -> bool {
    *n == 0
}

impl Pearl {
    /// Create a pearl with `name`/`namespace` derived from `id`
    pub fn new(id: &str, pearl_type: PearlType) -> Result<Self> {
        Namespace::parse(id).map_err(|e| e.context(format!("invalid ID {:?}", id)))?;

        let now = Utc::now();
        Ok(Self {
            id: id.to_string(),
            name: namespace::last_segment(id),
            namespace: namespace::parent_of(id),
            pearl_type,
            tags: Vec::new(),
            globs: Vec::new(),
            scopes: Vec::new(),
            description: String::new(),
            content_path: String::new(),
            content_hash: String::new(),
            references: Vec::new(),
            parent: None,
            connection: None,
            required: false,
            priority: 0,
            created_at: now,
            updated_at: now,
            created_by: String::new(),
            status: Status::default(),
        })
    }

    /// `namespace.name`, or `name` for top-level pearls
    pub fn full_id(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Check every write-time invariant
    pub fn validate(&self) -> Result<()> {
        Namespace::parse(&self.id).map_err(|e| e.context(format!("invalid ID {:?}", self.id)))?;
        if self.full_id() != self.id {
            return Err(Error::validation(format!(
                "identity: namespace {:?} + name {:?} does not form ID {:?}",
                self.namespace, self.name, self.id
            )));
        }
        validate_globs(&self.globs)?;
        validate_scopes(&self.scopes)?;
        Ok(())
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_globs(mut self, globs: Vec<String>) -> Self {
        self.globs = globs;
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_references(mut self, references: Vec<String>) -> Self {
        self.references = references;
        self
    }

    pub fn with_required(mut self, priority: i64) -> Self {
        self.required = true;
        self.priority = priority;
        self
    }

    pub fn with_created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = created_by.into();
        self
    }

    /// True if any of this pearl's globs matches `path`
    pub fn matches_path(&self, path: &str) -> bool {
        matches_path(path, &self.globs)
    }
}

impl fmt::Display for Pearl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.pearl_type, self.id, self.status)
    }
}

fn is_label(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Scopes follow the same pattern as types
pub fn validate_scopes(scopes: &[String]) -> Result<()> {
    for s in scopes {
        if !is_label(s) {
            return Err(Error::validation(format!(
                "scope {:?}: must be lowercase alphanumeric + hyphens, starting with a letter",
                s
            )));
        }
    }
    Ok(())
}

pub fn validate_globs(globs: &[String]) -> Result<()> {
    for g in globs {
        if g.is_empty() {
            return Err(Error::validation("glob: pattern cannot be empty"));
        }
        compile_glob(g).map_err(|e| Error::validation(format!("glob {:?}: {}", g, e)))?;
    }
    Ok(())
}

/// `*` never crosses `/`; `**` as a whole segment spans any depth and
/// anywhere else behaves like `*`. `{a,b}` alternatives are supported.
fn compile_glob(g: &str) -> std::result::Result<GlobMatcher, globset::Error> {
    Ok(GlobBuilder::new(g)
        .literal_separator(true)
        .build()?
        .compile_matcher())
}

/// Doublestar matching of a repository-relative path against any glob
pub fn matches_path(path: &str, globs: &[String]) -> bool {
    if path.is_empty() {
        return false;
    }
    globs
        .iter()
        .any(|g| compile_glob(g).map(|m| m.is_match(path)).unwrap_or(false))
}

/// Split a comma-separated flag value, dropping empty pieces
pub fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(id: &str) -> Pearl {
        Pearl::new(id, PearlType::new("table").unwrap()).unwrap()
    }

    #[test]
    fn test_new_derives_identity() {
        let p = table("db.postgres.users");
        assert_eq!(p.name, "users");
        assert_eq!(p.namespace, "db.postgres");
        assert_eq!(p.full_id(), "db.postgres.users");
        assert_eq!(p.status, Status::Active);
        assert_eq!(p.created_at, p.updated_at);
    }

    #[test]
    fn test_new_top_level() {
        let p = table("conventions");
        assert_eq!(p.name, "conventions");
        assert!(p.namespace.is_empty());
        assert_eq!(p.full_id(), "conventions");
    }

    #[test]
    fn test_new_rejects_bad_id() {
        let err = Pearl::new("DB.Users", PearlType::new("table").unwrap()).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_type_validation() {
        assert!(PearlType::new("table").is_ok());
        assert!(PearlType::new("data-contract").is_ok());
        assert!(PearlType::new("brainstorm2").is_ok());
        assert!(PearlType::new("").is_err());
        assert!(PearlType::new("Table").is_err());
        assert!(PearlType::new("2fa").is_err());
        assert!(PearlType::new("my_type").is_err());
    }

    #[test]
    fn test_type_deserialize_rejects_invalid() {
        let ok: std::result::Result<PearlType, _> = serde_json::from_str("\"api\"");
        assert!(ok.is_ok());
        let bad: std::result::Result<PearlType, _> = serde_json::from_str("\"Not Valid\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("archived".parse::<Status>().unwrap(), Status::Archived);
        assert_eq!(Status::Deprecated.to_string(), "deprecated");
        assert!("gone".parse::<Status>().is_err());
    }

    #[test]
    fn test_validate_scopes() {
        assert!(validate_scopes(&["backend".into(), "data-eng".into()]).is_ok());
        assert!(validate_scopes(&["Backend".into()]).is_err());
        assert!(validate_scopes(&["has space".into()]).is_err());
    }

    #[test]
    fn test_validate_globs() {
        assert!(validate_globs(&["src/**/*.go".into(), "*.sql".into()]).is_ok());
        assert!(validate_globs(&["".into()]).is_err());
        assert!(validate_globs(&["src/[abc".into()]).is_err());
    }

    #[test]
    fn test_validate_identity_mismatch() {
        let mut p = table("db.users");
        p.name = "orders".into();
        assert!(p.validate().unwrap_err().is_validation());
    }

    #[test]
    fn test_matches_path_doublestar() {
        let globs = vec!["src/models/**/*.go".to_string()];
        assert!(matches_path("src/models/user.go", &globs));
        assert!(matches_path("src/models/billing/invoice.go", &globs));
        assert!(!matches_path("src/handlers/user.go", &globs));
        assert!(!matches_path("", &globs));
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        let globs = vec!["db/*.sql".to_string()];
        assert!(matches_path("db/001_init.sql", &globs));
        assert!(!matches_path("db/migrations/001_init.sql", &globs));
    }

    #[test]
    fn test_brace_alternatives() {
        let globs = vec!["src/{models,handlers}/*.go".to_string()];
        assert!(matches_path("src/models/user.go", &globs));
        assert!(matches_path("src/handlers/user.go", &globs));
        assert!(!matches_path("src/views/user.go", &globs));

        let globs = vec!["web/**/*.{ts,tsx}".to_string()];
        assert!(matches_path("web/app/page.tsx", &globs));
        assert!(matches_path("web/lib/api.ts", &globs));
        assert!(!matches_path("web/app/page.css", &globs));
    }

    #[test]
    fn test_double_star_inside_segment() {
        let globs = vec!["src/**.go".to_string()];
        assert!(validate_globs(&globs).is_ok());
        assert!(matches_path("src/main.go", &globs));
        assert!(!matches_path("src/models/user.go", &globs));
    }

    #[test]
    fn test_double_star_matches_zero_dirs() {
        assert!(matches_path("main.rs", &["**/*.rs".to_string()]));
        assert!(matches_path("web/page.tsx", &["web/**/*.tsx".to_string()]));
    }

    #[test]
    fn test_json_round_trip_omits_empty() {
        let p = table("db.users").with_description("Users");
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"type\":\"table\""));
        assert!(!json.contains("globs"));
        assert!(!json.contains("required"));

        let back: Pearl = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn test_connection_passthrough() {
        let mut p = table("db.users");
        let mut conn = ConnectionInfo {
            kind: "postgres".into(),
            host: "${DB_HOST}".into(),
            port: Some(5432),
            ..Default::default()
        };
        conn.extras.insert("sslmode".into(), "require".into());
        p.connection = Some(conn);

        let json = serde_json::to_string(&p).unwrap();
        let back: Pearl = serde_json::from_str(&json).unwrap();
        assert_eq!(back.connection, p.connection);
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("a, b,,c"), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
    }
}

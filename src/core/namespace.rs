//! Namespace - Dot-separated record identity
//!
//! A pearl ID doubles as its namespace path:
//!
//! - `db.postgres.users` → namespace `db.postgres`, name `users`
//! - `conventions` → top-level, empty namespace
//!
//! Segments start with a lowercase letter and contain only lowercase
//! alphanumerics, hyphens and underscores.

use std::fmt;

use super::error::{Error, Result};

/// A parsed dot-separated namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    segments: Vec<String>,
}

impl Namespace {
    /// Parse a namespace string
    ///
    /// # Examples
    /// ```
    /// use pearls::core::namespace::Namespace;
    ///
    /// let ns = Namespace::parse("db.postgres.users").unwrap();
    /// assert_eq!(ns.depth(), 3);
    /// assert_eq!(ns.name(), "users");
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::validation("namespace: cannot be empty"));
        }

        let segments: Vec<String> = s.split('.').map(str::to_string).collect();
        for segment in &segments {
            if !is_valid_segment(segment) {
                return Err(Error::validation(format!(
                    "namespace {:?}: segment {:?} must start with a lowercase letter and contain only a-z, 0-9, '-' or '_'",
                    s, segment
                )));
            }
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Parent namespace, `None` for a single segment
    pub fn parent(&self) -> Option<Namespace> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(Namespace {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Last segment
    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// True if `self` is `prefix` or nested anywhere below it
    pub fn starts_with(&self, prefix: &Namespace) -> bool {
        prefix.segments.len() <= self.segments.len()
            && self
                .segments
                .iter()
                .zip(prefix.segments.iter())
                .all(|(a, b)| a == b)
    }

    /// Append one or more dot-separated segments
    pub fn join(&self, other: &str) -> Result<Namespace> {
        let tail = Namespace::parse(other)?;
        let mut segments = self.segments.clone();
        segments.extend(tail.segments);
        Ok(Namespace { segments })
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl TryFrom<&str> for Namespace {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Namespace::parse(s)
    }
}

fn is_valid_segment(seg: &str) -> bool {
    let mut chars = seg.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

/// Everything before the last dot, empty for top-level IDs
pub fn parent_of(id: &str) -> String {
    match id.rfind('.') {
        Some(idx) => id[..idx].to_string(),
        None => String::new(),
    }
}

/// Everything after the last dot
pub fn last_segment(id: &str) -> String {
    match id.rfind('.') {
        Some(idx) => id[idx + 1..].to_string(),
        None => id.to_string(),
    }
}

/// `child` is `parent` itself or nested below it; empty parent matches all
pub fn is_child_of(child: &str, parent: &str) -> bool {
    parent.is_empty() || child == parent || child.starts_with(&format!("{}.", parent))
}

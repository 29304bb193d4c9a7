//! `pl update` command
//!
//! # Usage
//! ```bash
//! pl update db.users --description "Registered users" --add-tag pii
//! pl update db.users --globs "src/models/user*.rs" --scopes accounts
//! pl update db.users --status deprecated
//! pl update conventions.errors --required --priority 10
//! pl update notes.design --content -      # replace body from stdin
//! ```

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;

use super::utils::{open_catalog, print_json, read_content_arg};
use crate::core::pearl::{split_list, Pearl, PearlType, Status};

#[derive(Args, Debug, Default)]
pub struct UpdateArgs {
    /// Pearl ID
    pub id: String,

    /// New description
    #[arg(short, long)]
    pub description: Option<String>,

    /// New status (active, deprecated, archived)
    #[arg(long)]
    pub status: Option<String>,

    /// New type
    #[arg(short = 't', long = "type")]
    pub pearl_type: Option<String>,

    /// Replace globs (comma-separated, empty clears)
    #[arg(long)]
    pub globs: Option<String>,

    /// Replace scopes (comma-separated, empty clears)
    #[arg(long)]
    pub scopes: Option<String>,

    /// Add tag(s)
    #[arg(long = "add-tag")]
    pub add_tags: Vec<String>,

    /// Remove tag(s)
    #[arg(long = "remove-tag")]
    pub remove_tags: Vec<String>,

    /// Add reference(s)
    #[arg(long = "add-ref")]
    pub add_refs: Vec<String>,

    /// Remove reference(s)
    #[arg(long = "remove-ref")]
    pub remove_refs: Vec<String>,

    /// Mark as required context
    #[arg(long, conflicts_with = "no_required")]
    pub required: bool,

    /// Mark as not required
    #[arg(long)]
    pub no_required: bool,

    /// New priority
    #[arg(long)]
    pub priority: Option<i64>,

    /// Replace content ("-" reads stdin)
    #[arg(long)]
    pub content: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: UpdateArgs) -> Result<()> {
    let catalog = open_catalog()?;
    let mut pearl = catalog.store.require(&args.id)?;

    let body = read_content_arg(args.content.as_deref())?;
    let changed = apply_edits(&args, &mut pearl)?;
    if !changed && body.is_none() {
        bail!("No updates specified");
    }

    let pearl = catalog.store.update(pearl, body.as_deref())?;

    if args.json {
        return print_json(&pearl);
    }

    println!("{} Updated pearl: {}", "✓".green(), pearl.id.bold());
    Ok(())
}

/// Apply metadata flags to `pearl`; returns whether anything was requested
fn apply_edits(args: &UpdateArgs, pearl: &mut Pearl) -> Result<bool> {
    let mut changed = false;

    if let Some(description) = &args.description {
        pearl.description = description.clone();
        changed = true;
    }
    if let Some(status) = &args.status {
        pearl.status = status.parse::<Status>()?;
        changed = true;
    }
    if let Some(ty) = &args.pearl_type {
        pearl.pearl_type = PearlType::new(ty.as_str())?;
        changed = true;
    }
    if let Some(globs) = &args.globs {
        pearl.globs = split_list(globs);
        changed = true;
    }
    if let Some(scopes) = &args.scopes {
        pearl.scopes = split_list(scopes);
        changed = true;
    }

    if !args.add_tags.is_empty() || !args.remove_tags.is_empty() {
        edit_set(&mut pearl.tags, &args.add_tags, &args.remove_tags);
        changed = true;
    }
    if !args.add_refs.is_empty() || !args.remove_refs.is_empty() {
        edit_set(&mut pearl.references, &args.add_refs, &args.remove_refs);
        changed = true;
    }

    if args.required {
        pearl.required = true;
        changed = true;
    }
    if args.no_required {
        pearl.required = false;
        changed = true;
    }
    if let Some(priority) = args.priority {
        pearl.priority = priority;
        changed = true;
    }

    Ok(changed)
}

/// Append missing `add` items, then drop every `remove` item; order kept
fn edit_set(items: &mut Vec<String>, add: &[String], remove: &[String]) {
    for a in add {
        if !items.contains(a) {
            items.push(a.clone());
        }
    }
    items.retain(|i| !remove.contains(i));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pearl() -> Pearl {
        Pearl::new("db.users", PearlType::new("table").unwrap())
            .unwrap()
            .with_tags(vec!["core".into(), "pii".into()])
    }

    #[test]
    fn test_no_flags_is_no_change() -> Result<()> {
        let mut p = pearl();
        assert!(!apply_edits(&UpdateArgs::default(), &mut p)?);
        Ok(())
    }

    #[test]
    fn test_tag_and_ref_edits() -> Result<()> {
        let mut p = pearl();
        let args = UpdateArgs {
            add_tags: vec!["pii".into(), "gdpr".into()],
            remove_tags: vec!["core".into()],
            add_refs: vec!["db.orders".into()],
            ..Default::default()
        };
        assert!(apply_edits(&args, &mut p)?);
        assert_eq!(p.tags, vec!["pii", "gdpr"]);
        assert_eq!(p.references, vec!["db.orders"]);
        Ok(())
    }

    #[test]
    fn test_field_edits() -> Result<()> {
        let mut p = pearl();
        let args = UpdateArgs {
            status: Some("deprecated".into()),
            pearl_type: Some("view".into()),
            globs: Some("src/**/*.rs, migrations/*.sql".into()),
            scopes: Some(String::new()),
            required: true,
            priority: Some(5),
            ..Default::default()
        };
        apply_edits(&args, &mut p)?;
        assert_eq!(p.status, Status::Deprecated);
        assert_eq!(p.pearl_type.as_str(), "view");
        assert_eq!(p.globs, vec!["src/**/*.rs", "migrations/*.sql"]);
        assert!(p.scopes.is_empty());
        assert!(p.required);
        assert_eq!(p.priority, 5);
        Ok(())
    }

    #[test]
    fn test_invalid_status_rejected() {
        let mut p = pearl();
        let args = UpdateArgs {
            status: Some("gone".into()),
            ..Default::default()
        };
        assert!(apply_edits(&args, &mut p).is_err());
    }
}

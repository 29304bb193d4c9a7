//! `pl onboard` command
//!
//! Writes a marked pearls section into agent instruction files and,
//! optionally, installs a prompt hook that injects `pl context --for`
//! output for changed files.
//!
//! # Usage
//! ```bash
//! pl onboard                  # CLAUDE.md
//! pl onboard --target all     # CLAUDE.md and agents.md
//! pl onboard --force          # replace an existing section
//! pl onboard --hooks          # also install .claude/hooks/pearls-context.sh
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use serde_json::{json, Map, Value};

const MARKER_START: &str = "<!-- pearls:start -->";
const MARKER_END: &str = "<!-- pearls:end -->";
const HOOK_SCRIPT_NAME: &str = "pearls-context.sh";

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Target {
    /// CLAUDE.md
    #[default]
    Claude,
    /// agents.md
    Agents,
    /// Both files
    All,
}

impl Target {
    fn files(self) -> &'static [&'static str] {
        match self {
            Target::Claude => &["CLAUDE.md"],
            Target::Agents => &["agents.md"],
            Target::All => &["CLAUDE.md", "agents.md"],
        }
    }
}

#[derive(Args, Debug)]
pub struct OnboardArgs {
    /// Which file to update
    #[arg(long, value_enum, default_value = "claude")]
    pub target: Target,

    /// Overwrite an existing pearls section
    #[arg(long)]
    pub force: bool,

    /// Install the context-injection hook
    #[arg(long)]
    pub hooks: bool,
}

pub fn run(args: OnboardArgs) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to get working directory")?;

    for name in args.target.files() {
        let path = cwd.join(name);
        let wrote = onboard_file(&path, args.force)
            .with_context(|| format!("Failed to onboard {}", name))?;
        if wrote {
            println!("{} Updated {}", "✓".green(), name);
        } else {
            println!("  {} already has a pearls section (use --force to replace)", name);
        }
    }

    if args.hooks {
        install_hook(&cwd)?;
    }
    Ok(())
}

fn section() -> String {
    format!(
        r##"{MARKER_START}
## Pearls - Context for this project

This project keeps reusable knowledge in Pearls: data schemas, API docs,
conventions, design decisions and runbooks.

### Retrieval

Push (by what you are working on):
- `pl context --for <path>` - pearls whose globs match a file
- `pl context --scope <scope>` - pearls for a topic
- `pl clutch` - required project context

Pull (by what you need):
- `pl search "query"` - keyword search
- `pl search "query" --semantic` - natural language search
- `pl context <ids...>` - specific pearls

### Managing knowledge
- `pl create <id> --type <type>` - type is free-form (table, api, convention, runbook, ...)
- `pl create <id> --type convention --globs "src/**/*.rs" --scopes errors` - with push triggers
- `pl create <id> --type brainstorm --content "# Design\n\n..."` - inline content
- `pl update <id> --globs "src/payments/**" --scopes payments`
- `pl list`, `pl show <id>`, `pl cat <id>`, `pl refs <id>`
- `pl introspect --sqlite <file> --prefix <ns>` - bootstrap table docs
- `pl doctor` - check catalog health

### When to use
- Before changing unfamiliar code, run `pl context --for <file>`
- After a design discussion, save it with `pl create`
- When documenting a convention, attach globs so it shows up where it applies
{MARKER_END}"##
    )
}

/// Insert or replace the marked section; returns false if left untouched
fn onboard_file(path: &Path, force: bool) -> Result<bool> {
    let existing = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let markers = match (existing.find(MARKER_START), existing.find(MARKER_END)) {
        (Some(start), Some(end)) if end > start => Some((start, end)),
        _ => None,
    };

    let result = match markers {
        Some(_) if !force => return Ok(false),
        Some((start, end)) => {
            let after = &existing[end + MARKER_END.len()..];
            format!("{}{}{}", &existing[..start], section(), after)
        }
        None => {
            let mut out = existing;
            if !out.is_empty() {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push('\n');
            }
            out.push_str(&section());
            out.push('\n');
            out
        }
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, result)?;
    Ok(true)
}

fn install_hook(project_root: &Path) -> Result<()> {
    let hooks_dir = project_root.join(".claude").join("hooks");
    fs::create_dir_all(&hooks_dir)
        .with_context(|| format!("Failed to create {}", hooks_dir.display()))?;

    let script_path = hooks_dir.join(HOOK_SCRIPT_NAME);
    fs::write(&script_path, HOOK_SCRIPT)?;
    make_executable(&script_path)?;
    println!("{} Created hook script: {}", "✓".green(), script_path.display());

    let settings_path = project_root.join(".claude").join("settings.json");
    register_hook(&settings_path, &script_path.to_string_lossy())?;
    println!(
        "{} Registered UserPromptSubmit hook in {}",
        "✓".green(),
        settings_path.display()
    );
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Merge the hook into `settings.json`, keeping everything else as is
fn register_hook(settings_path: &Path, command: &str) -> Result<()> {
    let mut settings: Map<String, Value> = match fs::read_to_string(settings_path) {
        Ok(s) => serde_json::from_str(&s)
            .with_context(|| format!("Failed to parse {}", settings_path.display()))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
        Err(e) => return Err(e.into()),
    };

    let hooks = settings
        .entry("hooks")
        .or_insert_with(|| Value::Object(Map::new()));
    if !hooks.is_object() {
        *hooks = Value::Object(Map::new());
    }
    let submit = hooks
        .as_object_mut()
        .map(|h| h.entry("UserPromptSubmit").or_insert_with(|| json!([])));

    if let Some(submit) = submit {
        if !submit.is_array() {
            *submit = json!([]);
        }
        if let Some(groups) = submit.as_array_mut() {
            let registered = groups.iter().any(|group| {
                group["hooks"]
                    .as_array()
                    .map(|hs| {
                        hs.iter().any(|h| {
                            h["command"]
                                .as_str()
                                .map_or(false, |c| c.contains("pearls-context"))
                        })
                    })
                    .unwrap_or(false)
            });
            if !registered {
                groups.push(json!({
                    "hooks": [{ "type": "command", "command": command, "timeout": 10 }]
                }));
            }
        }
    }

    if let Some(parent) = settings_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = serde_json::to_string_pretty(&settings)?;
    out.push('\n');
    fs::write(settings_path, out)?;
    Ok(())
}

const HOOK_SCRIPT: &str = r#"#!/usr/bin/env bash
# Pearls context hook (UserPromptSubmit).
# Collects pearls matching recently changed files and emits them as
# additionalContext. Always exits 0 so the agent is never blocked.

{
  cat > /dev/null

  REPO_ROOT="$(git rev-parse --show-toplevel 2>/dev/null)" || exit 0
  cd "$REPO_ROOT"

  FILES="$(
    { git diff --name-only HEAD 2>/dev/null; git diff --name-only --cached 2>/dev/null; } \
      | sort -u \
      | head -20
  )"
  [ -z "$FILES" ] && exit 0

  ARGS=()
  while IFS= read -r FILE; do
    ARGS+=(--for "$FILE")
  done <<< "$FILES"

  CONTEXT="$(pl context "${ARGS[@]}" 2>/dev/null)" || true
  [ -z "$CONTEXT" ] && exit 0

  python3 -c "
import json, sys
print(json.dumps({
  'hookSpecificOutput': {
    'hookEventName': 'UserPromptSubmit',
    'additionalContext': sys.stdin.read().strip()
  }
}))
" <<< "$CONTEXT"

} 2>/dev/null

exit 0
"#;

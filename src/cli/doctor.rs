//! `pl doctor` command
//!
//! Read-only health report; exits non-zero when any check fails.

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;

use super::utils::{open_store, print_json};
use crate::config::{self, Config};
use crate::core::doctor;

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: DoctorArgs) -> Result<()> {
    let paths = config::discover()?;

    // A broken or missing config is a finding, not a reason to stop
    let (config, config_check) = match Config::load(&paths.config) {
        Ok(c) => (c, Ok(())),
        Err(e) => (Config::default(), Err(format!("{:#}", e))),
    };

    let store = open_store(&paths, &config)?;
    let checks = doctor::run_all(&store, config_check);
    let passed = doctor::all_passed(&checks);

    if args.json {
        print_json(&checks)?;
    } else {
        for c in &checks {
            if c.passed {
                println!("{} {}", "✓".green(), c.name);
            } else {
                println!("{} {}", "✗".red(), c.name);
                for issue in &c.issues {
                    println!("    {}", issue);
                }
            }
        }
    }

    if !passed {
        bail!("some checks failed");
    }
    Ok(())
}

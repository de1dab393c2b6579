//! Exclusions command - inspect the effective exclusion rules

use anyhow::Result;
use clap::Subcommand;
use davsync_core::domain::Resource;
use davsync_core::filter::{Exclusion, ExclusionSet};
use serde_json::json;

use super::{exclusions, CliContext};

/// Exclusion subcommands
#[derive(Debug, Subcommand)]
pub enum ExclusionsCommand {
    /// List the built-in and user patterns in effect
    List,
    /// Check whether a name would be skipped
    Test {
        /// Leaf name to test (e.g. "report.tmp")
        name: String,
        /// Size in bytes, to test the size limit
        #[arg(long, default_value_t = 0)]
        size: u64,
    },
}

impl ExclusionsCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = ctx.load_config()?;
        let set = exclusions(&config)?;

        match self {
            ExclusionsCommand::List => {
                let patterns: Vec<_> = set
                    .iter()
                    .map(|(pattern, reason)| json!({ "pattern": pattern, "reason": reason }))
                    .collect();
                formatter.print_json(&json!({
                    "file": config.sync.exclusions_path().display().to_string(),
                    "patterns": patterns,
                }));

                formatter.success(&format!(
                    "{} pattern(s) in effect (user file: {})",
                    set.len(),
                    config.sync.exclusions_path().display()
                ));
                for (pattern, reason) in set.iter() {
                    formatter.info(&format!("{pattern:<20} {reason}"));
                }
            }
            ExclusionsCommand::Test { name, size } => {
                let verdict = test_name(&set, name, *size)?;
                formatter.print_json(&json!({
                    "name": name,
                    "size": size,
                    "excluded": verdict.is_some(),
                    "reason": verdict.as_ref().map(ToString::to_string),
                }));
                match verdict {
                    Some(exclusion) => formatter.success(&format!("{name} is excluded: {exclusion}")),
                    None => formatter.success(&format!("{name} is synchronized")),
                }
            }
        }
        Ok(())
    }
}

fn test_name(set: &ExclusionSet, name: &str, size: u64) -> Result<Option<Exclusion>> {
    let resource = Resource::file(name, format!("/{name}"), 0, size)?;
    Ok(set.check(&resource))
}

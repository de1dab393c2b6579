//! Config command - view and create the davsync configuration
//!
//! Provides the `davsync config` CLI command which:
//! 1. Shows the current configuration (YAML or JSON, secret redacted)
//! 2. Validates the configuration file and reports errors
//! 3. Prints the configuration path
//! 4. Writes a starter configuration file

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use davsync_core::config::{Config, ConfigBuilder};
use tracing::info;

use super::CliContext;

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Validate configuration file
    Validate,
    /// Print the configuration file path
    Path,
    /// Write a configuration file with default values
    Init {
        /// Account email (tenant and site are derived from it)
        #[arg(long)]
        email: Option<String>,
        /// WebDAV server host
        #[arg(long)]
        host: Option<String>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    /// Execute the config command
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(ctx),
            ConfigCommand::Validate => self.execute_validate(ctx),
            ConfigCommand::Path => {
                let formatter = ctx.formatter();
                formatter.print_json(&serde_json::json!({
                    "config_path": ctx.config_path.display().to_string(),
                    "exists": ctx.config_path.exists(),
                }));
                if !ctx.format.is_json() {
                    println!("{}", ctx.config_path.display());
                }
                Ok(())
            }
            ConfigCommand::Init { email, host, force } => {
                self.execute_init(ctx, email.as_deref(), host.as_deref(), *force)
            }
        }
    }

    fn execute_show(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = ctx.load_config()?.redacted();

        info!(config_path = %ctx.config_path.display(), "Showing configuration");

        if ctx.format.is_json() {
            let json = serde_json::to_value(&config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", ctx.config_path.display()));
            formatter.info("");

            let yaml = serde_yaml::to_string(&config)
                .context("Failed to serialize configuration to YAML")?;

            for line in yaml.lines() {
                formatter.info(line);
            }
        }

        Ok(())
    }

    fn execute_validate(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config_path = &ctx.config_path;

        if !config_path.exists() {
            formatter.print_json(&serde_json::json!({
                "valid": false,
                "config_path": config_path.display().to_string(),
                "errors": ["Configuration file not found"],
            }));
            formatter.error(&format!(
                "Configuration file not found at {}",
                config_path.display()
            ));
            formatter.info("Run 'davsync config init --email <address>' to create one.");
            bail!("No configuration file");
        }

        let config = match Config::load(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "config_path": config_path.display().to_string(),
                    "errors": [e.to_string()],
                }));
                formatter.error(&e.to_string());
                bail!("Configuration cannot be parsed");
            }
        };

        info!(config_path = %config_path.display(), "Validating configuration");

        let errors = config.validate();

        let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": config_path.display().to_string(),
            "remote_root": config.remote.root_path(),
            "errors": error_strings,
        }));

        if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", config_path.display()));
            if let Some(root) = config.remote.root_path() {
                formatter.info(&format!("Remote: {}{}", config.remote.base_url(), root));
            }
            Ok(())
        } else {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ));
            formatter.info(&format!("File: {}", config_path.display()));
            formatter.info("");
            for error in &errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
            bail!("Invalid configuration");
        }
    }

    fn execute_init(
        &self,
        ctx: &CliContext,
        email: Option<&str>,
        host: Option<&str>,
        force: bool,
    ) -> Result<()> {
        let formatter = ctx.formatter();

        if ctx.config_path.exists() && !force {
            bail!(
                "{} already exists (use --force to overwrite)",
                ctx.config_path.display()
            );
        }

        let mut builder = ConfigBuilder::new();
        if let Some(email) = email {
            builder = builder.remote_email(email);
        }
        if let Some(host) = host {
            builder = builder.remote_host(host);
        }
        let config = builder.build();

        config
            .save(&ctx.config_path)
            .with_context(|| format!("Failed to write {}", ctx.config_path.display()))?;

        formatter.print_json(&serde_json::json!({
            "success": true,
            "config_path": ctx.config_path.display().to_string(),
        }));
        formatter.success(&format!("Wrote {}", ctx.config_path.display()));
        for error in config.validate() {
            formatter.warn(&format!("{} - {}", error.field, error.message));
        }
        Ok(())
    }
}

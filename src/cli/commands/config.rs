use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::{Formatter, get_formatter};
use crate::models::{CONFIG_FILE, Config, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Initialize configuration file")]
    Init {
        #[arg(
            long,
            short = 'g',
            help = "Create global config instead of project config"
        )]
        global: bool,
        #[arg(long, help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show current configuration")]
    Show,
    #[command(about = "Show configuration file paths")]
    Path {
        #[arg(long, help = "Show all possible config paths")]
        all: bool,
    },
}

pub async fn handle_config(cmd: ConfigCommand, format: OutputFormat, _verbose: bool) -> Result<()> {
    let formatter = get_formatter(format);

    match cmd {
        ConfigCommand::Init { global, force } => handle_init(global, force, formatter.as_ref()),
        ConfigCommand::Show => handle_show(format),
        ConfigCommand::Path { all } => handle_path(all),
    }
}

fn handle_init(global: bool, force: bool, formatter: &dyn Formatter) -> Result<()> {
    let (config_path, scope) = if global {
        let path = Config::global_path()
            .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;
        (path, "Global")
    } else {
        let dir = Config::project_config_dir()
            .ok_or_else(|| anyhow::anyhow!("could not determine project directory"))?;
        (dir.join(CONFIG_FILE), "Project")
    };

    if config_path.exists() && !force {
        anyhow::bail!(
            "{} config already exists at: {}\nUse --force to overwrite.",
            scope,
            config_path.display()
        );
    }

    let path = if global {
        Config::init_global().context("failed to create global config")?
    } else {
        Config::init_project().context("failed to create project config")?
    };
    println!(
        "{}",
        formatter.format_message(&format!(
            "Created {} config at: {}",
            scope.to_lowercase(),
            path.display()
        ))
    );

    Ok(())
}

/// Copy of `config` that is safe to print.
fn redacted(config: &Config) -> Config {
    let mut config = config.clone();
    if config.gemini.api_key.is_some() {
        config.gemini.api_key = Some("********".to_string());
    }
    if let Some(ref mut key) = config.vector_store.api_key {
        *key = "********".to_string();
    }
    config
}

fn handle_show(format: OutputFormat) -> Result<()> {
    let resolved = Config::load()?;
    let config = redacted(&resolved.config);

    if format == OutputFormat::Json {
        let output = serde_json::json!({
            "config": config,
            "project_path": resolved.project_path,
            "global_path": resolved.global_path,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if let Some(ref path) = resolved.project_path {
        println!("# Project config: {}", path.display());
    }
    if let Some(ref path) = resolved.global_path {
        println!("# Global config: {}", path.display());
    }
    if resolved.project_path.is_none() && resolved.global_path.is_none() {
        println!("# No config files found, showing defaults");
    }
    println!();
    print!("{}", toml::to_string_pretty(&config)?);

    Ok(())
}

fn handle_path(show_all: bool) -> Result<()> {
    let project_path = Config::project_config_dir().map(|d| d.join(CONFIG_FILE));
    let global_path = Config::global_path();

    println!("Configuration paths:");
    println!();

    if let Some(ref path) = project_path {
        if path.exists() {
            println!("Project config (active): {}", path.display());
        } else if show_all {
            println!("Project config (would be): {}", path.display());
        }
    }

    if let Some(ref path) = global_path {
        if path.exists() {
            println!("Global config (active): {}", path.display());
        } else if show_all {
            println!("Global config (would be): {}", path.display());
        }
    }

    if show_all {
        if let Some(path) = Config::metrics_db_path() {
            println!("Metrics database: {}", path.display());
        }
        if let Ok(cwd) = std::env::current_dir() {
            let env_path = cwd.join(".env");
            if env_path.exists() {
                println!(".env file (active): {}", env_path.display());
            } else {
                println!(".env file (would be): {}", env_path.display());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_hides_keys() {
        let mut config = Config::default();
        config.gemini.api_key = Some("AIza-secret".to_string());
        config.vector_store.api_key = Some("qdrant-secret".to_string());

        let shown = redacted(&config);
        let text = toml::to_string_pretty(&shown).unwrap();
        assert!(!text.contains("secret"));
        assert_eq!(shown.gemini.api_key.as_deref(), Some("********"));
    }

    #[test]
    fn test_redacted_keeps_missing_key_missing() {
        let shown = redacted(&Config::default());
        assert!(shown.gemini.api_key.is_none());
        assert!(shown.vector_store.api_key.is_none());
    }
}

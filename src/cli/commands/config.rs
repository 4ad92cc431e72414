use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::{Path, PathBuf};

use crate::cli::output::{Formatter, get_formatter};
use crate::models::{Config, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Write a config file with default values")]
    Init {
        #[arg(long, short = 'F', help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show the effective configuration")]
    Show,
    #[command(about = "Show configuration file paths")]
    Path,
}

pub async fn handle_config(
    cmd: ConfigCommand,
    config_path: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let formatter = get_formatter(format);

    match cmd {
        ConfigCommand::Init { force } => handle_init(config_path, force, formatter.as_ref()),
        ConfigCommand::Show => handle_show(config_path, format),
        ConfigCommand::Path => handle_path(config_path),
    }
}

fn target_path(config_path: Option<&Path>) -> Result<PathBuf> {
    config_path
        .map(Path::to_path_buf)
        .or_else(Config::config_path)
        .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))
}

fn handle_init(config_path: Option<&Path>, force: bool, formatter: &dyn Formatter) -> Result<()> {
    let path = target_path(config_path)?;

    if path.exists() && !force {
        anyhow::bail!(
            "Config already exists at: {}\nUse --force to overwrite.",
            path.display()
        );
    }

    Config::default()
        .save(&path)
        .context("failed to write config")?;
    print!(
        "{}",
        formatter.format_message(&format!("Created config at: {}", path.display()))
    );
    Ok(())
}

fn handle_show(config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let config = Config::load(config_path)?;
    let embedding_key = config.embedding.api_key.is_some();
    let qdrant_key = config.vector_store.api_key.is_some();

    if format == OutputFormat::Json {
        let output = serde_json::json!({
            "config": config,
            "secrets": {
                "embedding_api_key": embedding_key,
                "vector_store_api_key": qdrant_key,
            },
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if let Ok(path) = target_path(config_path) {
        let state = if path.exists() { "active" } else { "not found, using defaults" };
        println!("# Config file: {} ({})", path.display(), state);
    }
    println!(
        "# embedding api_key: {}",
        if embedding_key { "set" } else { "not set" }
    );
    println!(
        "# vector_store api_key: {}",
        if qdrant_key { "set" } else { "not set" }
    );
    println!();
    print!("{}", toml::to_string_pretty(&config)?);

    Ok(())
}

fn handle_path(config_path: Option<&Path>) -> Result<()> {
    let path = target_path(config_path)?;

    println!("Configuration paths:");
    println!();
    if path.exists() {
        println!("Config file (active): {}", path.display());
    } else {
        println!("Config file (would be): {}", path.display());
    }

    if let Ok(cwd) = std::env::current_dir() {
        let env_path = cwd.join(".env");
        if env_path.exists() {
            println!(".env file (active): {}", env_path.display());
        } else {
            println!(".env file (would be): {}", env_path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::output::TextFormatter;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        handle_init(Some(&path), false, &TextFormatter).unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.ingest.batch_size, 50);
    }

    #[test]
    fn test_init_refuses_to_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[ingest]\nbatch_size = 7\n").unwrap();

        assert!(handle_init(Some(&path), false, &TextFormatter).is_err());
        assert_eq!(Config::from_file(&path).unwrap().ingest.batch_size, 7);

        handle_init(Some(&path), true, &TextFormatter).unwrap();
        assert_eq!(Config::from_file(&path).unwrap().ingest.batch_size, 50);
    }

    #[test]
    fn test_target_path_prefers_explicit() {
        let explicit = Path::new("/tmp/custom.toml");
        assert_eq!(target_path(Some(explicit)).unwrap(), explicit);
    }
}

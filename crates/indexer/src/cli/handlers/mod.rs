use crate::cli::commands::Command;
use crate::config::IndexerConfig;
use anyhow::Result;
use common::config::ConfigValidation;
use std::path::{Path, PathBuf};

pub mod service;

pub struct CommandHandler;

impl CommandHandler {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(&self, command: Command, config_path: Option<PathBuf>) -> Result<()> {
        match command {
            Command::Start => service::handle_start(config_path.as_deref()).await,
            Command::RunOnce => service::handle_run_once(config_path.as_deref()).await,
            Command::GenConfig { output } => service::handle_gen_config(output).await,
            Command::CheckConfig => service::handle_check_config(config_path.as_deref()).await,
        }
    }
}

impl Default for CommandHandler {
    fn default() -> Self {
        Self::new()
    }
}

pub struct HandlerUtils;

impl HandlerUtils {
    pub fn load_config(config_path: Option<&Path>) -> Result<IndexerConfig> {
        match config_path {
            Some(path) => IndexerConfig::load_from_file(path),
            None => IndexerConfig::load(),
        }
    }

    pub fn validate_config(config: &IndexerConfig) -> Result<()> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))?;

        let warnings = config.warnings();
        if !warnings.is_empty() {
            for warning in warnings {
                Self::print_warning(&format!("Configuration warning: {warning}"));
            }
        }

        Ok(())
    }

    pub fn print_success(message: &str) {
        println!("[SUCCESS] {message}");
    }

    pub fn print_error(message: &str) {
        eprintln!("[ERROR] {message}");
    }

    pub fn print_info(message: &str) {
        println!("[INFO] {message}");
    }

    pub fn print_warning(message: &str) {
        println!("[WARNING] {message}");
    }
}

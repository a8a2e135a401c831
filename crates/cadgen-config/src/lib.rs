//! Layered run configuration: CLI flags override environment
//! variables, which override `cadgen.json` in the working directory,
//! which overrides built-in defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressSetting {
    Auto,
    Silent,
    Verbose,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub model: Option<String>,
    pub ollama_url: Option<String>,
    pub kernel_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_repair_attempts: Option<u32>,
    pub output_dir: Option<String>,
    pub print_code: Option<bool>,
    pub progress: Option<ProgressSetting>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnvConfig {
    pub model: Option<String>,
    pub ollama_url: Option<String>,
    pub kernel_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_repair_attempts: Option<u32>,
    pub output_dir: Option<String>,
    pub print_code: Option<bool>,
    pub progress: Option<ProgressSetting>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CliRunOverrides {
    pub model: Option<String>,
    pub ollama_url: Option<String>,
    pub kernel_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_repair_attempts: Option<u32>,
    pub output_dir: Option<String>,
    pub print_code: Option<bool>,
    pub no_progress: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunDefaults {
    pub model: String,
    pub ollama_url: String,
    pub kernel_url: String,
    pub timeout_secs: u64,
    pub max_repair_attempts: u32,
    pub output_dir: Option<String>,
    pub print_code: bool,
    pub progress: ProgressSetting,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            model: "qwen2.5-coder:7b".to_string(),
            ollama_url: "http://127.0.0.1:11434".to_string(),
            kernel_url: "http://127.0.0.1:8788".to_string(),
            timeout_secs: 60,
            max_repair_attempts: 2,
            output_dir: None,
            print_code: false,
            progress: ProgressSetting::Auto,
        }
    }
}

pub fn load_file_config(explicit_path: Option<&Path>, cwd: &Path) -> Result<Option<FileConfig>> {
    let path = match explicit_path {
        Some(p) => p.to_path_buf(),
        None => {
            let candidate = cwd.join("cadgen.json");
            if !candidate.exists() {
                return Ok(None);
            }
            candidate
        }
    };

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed reading config file {}", path.display()))?;
    let parsed: FileConfig = serde_json::from_str(&raw)
        .with_context(|| format!("failed parsing config file {}", path.display()))?;
    Ok(Some(parsed))
}

impl EnvConfig {
    pub fn from_current_env() -> Self {
        Self {
            model: env::var("CADGEN_MODEL").ok(),
            ollama_url: env::var("CADGEN_OLLAMA_URL").ok(),
            kernel_url: env::var("CADGEN_KERNEL_URL").ok(),
            timeout_secs: env::var("CADGEN_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.trim().parse().ok()),
            max_repair_attempts: env::var("CADGEN_MAX_REPAIRS")
                .ok()
                .and_then(|v| v.trim().parse().ok()),
            output_dir: env::var("CADGEN_OUTPUT_DIR").ok(),
            print_code: env::var("CADGEN_PRINT_CODE")
                .ok()
                .and_then(|v| parse_bool(&v)),
            progress: env::var("CADGEN_PROGRESS")
                .ok()
                .and_then(|v| parse_progress(&v)),
        }
    }
}

pub fn resolve_run_defaults(
    cli: &CliRunOverrides,
    env_cfg: &EnvConfig,
    file_cfg: Option<&FileConfig>,
) -> RunDefaults {
    let base = RunDefaults::default();

    let model = cli
        .model
        .clone()
        .or_else(|| env_cfg.model.clone())
        .or_else(|| file_cfg.and_then(|c| c.model.clone()))
        .unwrap_or(base.model);

    let ollama_url = cli
        .ollama_url
        .clone()
        .or_else(|| env_cfg.ollama_url.clone())
        .or_else(|| file_cfg.and_then(|c| c.ollama_url.clone()))
        .unwrap_or(base.ollama_url);

    let kernel_url = cli
        .kernel_url
        .clone()
        .or_else(|| env_cfg.kernel_url.clone())
        .or_else(|| file_cfg.and_then(|c| c.kernel_url.clone()))
        .unwrap_or(base.kernel_url);

    let timeout_secs = cli
        .timeout_secs
        .or(env_cfg.timeout_secs)
        .or(file_cfg.and_then(|c| c.timeout_secs))
        .unwrap_or(base.timeout_secs);

    let max_repair_attempts = cli
        .max_repair_attempts
        .or(env_cfg.max_repair_attempts)
        .or(file_cfg.and_then(|c| c.max_repair_attempts))
        .unwrap_or(base.max_repair_attempts);

    let output_dir = cli
        .output_dir
        .clone()
        .or_else(|| env_cfg.output_dir.clone())
        .or_else(|| file_cfg.and_then(|c| c.output_dir.clone()))
        .or(base.output_dir);

    let print_code = cli
        .print_code
        .or(env_cfg.print_code)
        .or(file_cfg.and_then(|c| c.print_code))
        .unwrap_or(base.print_code);

    let mut progress = env_cfg
        .progress
        .or(file_cfg.and_then(|c| c.progress))
        .unwrap_or(base.progress);

    if cli.no_progress == Some(true) {
        progress = ProgressSetting::Silent;
    }

    RunDefaults {
        model,
        ollama_url,
        kernel_url,
        timeout_secs,
        max_repair_attempts,
        output_dir,
        print_code,
        progress,
    }
}

fn parse_bool(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_progress(input: &str) -> Option<ProgressSetting> {
    match input.trim().to_ascii_lowercase().as_str() {
        "auto" => Some(ProgressSetting::Auto),
        "silent" => Some(ProgressSetting::Silent),
        "verbose" => Some(ProgressSetting::Verbose),
        _ => None,
    }
}

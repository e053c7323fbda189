use anyhow::{Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::python::SandboxLimits;

pub const DEFAULT_AOC_YEAR: u16 = 2024;
pub const DEFAULT_AOC_BASE_URL: &str = "https://adventofcode.com";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_PYTHON: &str = "python3";
pub const DEFAULT_EXECUTION_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MEMORY_LIMIT_MB: u64 = 1024;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

const CONFIG_DIR_NAME: &str = "advent-agent";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub aoc_session: Option<String>,
    pub aoc_year: u16,
    pub aoc_base_url: String,
    pub llm_provider: ProviderKind,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub sandbox: SandboxConfig,
    pub request_timeout_secs: u64,
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Gemini,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "openai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            _ => Err(format!("unknown provider '{value}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxBackend {
    Process,
    Embedded,
}

impl FromStr for SandboxBackend {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "process" => Ok(Self::Process),
            "embedded" => Ok(Self::Embedded),
            _ => Err(format!("unknown sandbox backend '{value}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConfig {
    pub backend: SandboxBackend,
    pub python: String,
    pub timeout_secs: u64,
    /// Address-space cap for the child interpreter; 0 disables it.
    pub memory_limit_mb: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            backend: SandboxBackend::Process,
            python: DEFAULT_PYTHON.to_string(),
            timeout_secs: DEFAULT_EXECUTION_TIMEOUT_SECS,
            memory_limit_mb: DEFAULT_MEMORY_LIMIT_MB,
        }
    }
}

impl SandboxConfig {
    pub fn limits(&self) -> SandboxLimits {
        SandboxLimits {
            wall_clock: Duration::from_secs(self.timeout_secs),
            memory_bytes: (self.memory_limit_mb > 0)
                .then(|| self.memory_limit_mb.saturating_mul(1024 * 1024)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFileConfig {
    aoc_session: Option<String>,
    aoc_year: Option<u16>,
    aoc_base_url: Option<String>,
    llm_provider: Option<String>,
    openai_api_key: Option<String>,
    openai_model: Option<String>,
    openai_base_url: Option<String>,
    gemini_api_key: Option<String>,
    gemini_model: Option<String>,
    gemini_base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    sandbox: Option<RawSandboxConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSandboxConfig {
    backend: Option<String>,
    python: Option<String>,
    timeout_secs: Option<u64>,
    memory_limit_mb: Option<u64>,
}

impl AppConfig {
    #[cfg(test)]
    pub fn load() -> Result<Self> {
        Self::load_with_path(None)
    }

    /// Loads `explicit_path` when given, otherwise the discovered default.
    /// Environment variables override file values.
    pub fn load_with_path(explicit_path: Option<&Path>) -> Result<Self> {
        let config_path = match explicit_path {
            Some(path) => {
                if !path.is_file() {
                    bail!("Failed to load config {}: file not found", path.display());
                }
                path.to_path_buf()
            }
            None => discover_config_path()?,
        };
        let file_config = load_file_config(&config_path)?;

        dotenvy::dotenv().ok();

        let file = file_config.as_ref();
        let file_str = |pick: fn(&RawFileConfig) -> Option<&String>| {
            file.and_then(pick)
                .and_then(|value| non_empty(value).map(ToOwned::to_owned))
        };

        let aoc_year = match env_non_empty("AOC_YEAR") {
            Some(value) => value
                .parse::<u16>()
                .map_err(|err| config_error(&config_path, "AOC_YEAR", &err.to_string()))?,
            None => file
                .and_then(|cfg| cfg.aoc_year)
                .unwrap_or(DEFAULT_AOC_YEAR),
        };

        let llm_provider = env_non_empty("ADVENT_AGENT_PROVIDER")
            .or_else(|| file_str(|cfg| cfg.llm_provider.as_ref()))
            .map(|value| {
                ProviderKind::from_str(&value)
                    .map_err(|reason| config_error(&config_path, "llm_provider", &reason))
            })
            .transpose()?
            .unwrap_or(ProviderKind::OpenAi);

        let request_timeout_secs = file
            .and_then(|cfg| cfg.request_timeout_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if request_timeout_secs == 0 {
            return Err(config_error(
                &config_path,
                "request_timeout_secs",
                "must be greater than zero",
            ));
        }

        let sandbox = validate_sandbox(file.and_then(|cfg| cfg.sandbox.as_ref()), &config_path)?;

        Ok(Self {
            aoc_session: env_non_empty("AOC_SESSION").or(file_str(|cfg| cfg.aoc_session.as_ref())),
            aoc_year,
            aoc_base_url: env_non_empty("AOC_BASE_URL")
                .or(file_str(|cfg| cfg.aoc_base_url.as_ref()))
                .unwrap_or_else(|| DEFAULT_AOC_BASE_URL.to_string()),
            llm_provider,
            openai_api_key: env_non_empty("OPENAI_API_KEY")
                .or(file_str(|cfg| cfg.openai_api_key.as_ref())),
            openai_model: env_non_empty("OPENAI_MODEL")
                .or(file_str(|cfg| cfg.openai_model.as_ref()))
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            openai_base_url: env_non_empty("OPENAI_BASE_URL")
                .or(file_str(|cfg| cfg.openai_base_url.as_ref()))
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            gemini_api_key: env_non_empty("GEMINI_API_KEY")
                .or(file_str(|cfg| cfg.gemini_api_key.as_ref())),
            gemini_model: env_non_empty("GEMINI_MODEL")
                .or(file_str(|cfg| cfg.gemini_model.as_ref()))
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            gemini_base_url: env_non_empty("GEMINI_BASE_URL")
                .or(file_str(|cfg| cfg.gemini_base_url.as_ref()))
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            sandbox,
            request_timeout_secs,
        })
    }
}

fn validate_sandbox(raw: Option<&RawSandboxConfig>, config_path: &Path) -> Result<SandboxConfig> {
    let mut config = SandboxConfig::default();

    let backend =
        env_non_empty("ADVENT_AGENT_SANDBOX").or_else(|| raw.and_then(|r| r.backend.clone()));
    if let Some(backend) = backend {
        config.backend = SandboxBackend::from_str(backend.trim())
            .map_err(|reason| config_error(config_path, "sandbox.backend", &reason))?;
    }

    let file_python = raw.and_then(|r| r.python.as_deref()).and_then(non_empty);
    let python = env_non_empty("ADVENT_AGENT_PYTHON").or_else(|| file_python.map(str::to_string));
    if let Some(python) = python {
        config.python = python;
    }

    if let Some(timeout_secs) = raw.and_then(|r| r.timeout_secs) {
        if timeout_secs == 0 {
            return Err(config_error(
                config_path,
                "sandbox.timeout_secs",
                "must be greater than zero",
            ));
        }
        config.timeout_secs = timeout_secs;
    }

    if let Some(memory_limit_mb) = raw.and_then(|r| r.memory_limit_mb) {
        config.memory_limit_mb = memory_limit_mb;
    }

    Ok(config)
}

fn discover_config_path() -> Result<PathBuf> {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let trimmed = xdg.trim();
        if trimmed.is_empty() {
            bail!("Failed to resolve config path: XDG_CONFIG_HOME is set but empty");
        }

        return Ok(PathBuf::from(trimmed)
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME));
    }

    let home = dirs::home_dir().ok_or_else(|| {
        anyhow!("Failed to resolve config path: HOME directory is unavailable")
    })?;

    Ok(home
        .join(".config")
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME))
}

fn load_file_config(config_path: &Path) -> Result<Option<RawFileConfig>> {
    if !config_path.is_file() {
        return Ok(None);
    }

    let config_text = fs::read_to_string(config_path).map_err(|err| {
        anyhow!(
            "Failed to load config {}: unable to read file: {err}",
            config_path.display()
        )
    })?;

    toml::from_str(&config_text)
        .map(Some)
        .map_err(|err| anyhow!("Failed to load config {}: {err}", config_path.display()))
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .and_then(|value| non_empty(&value).map(ToOwned::to_owned))
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn config_error(config_path: &Path, key_path: &str, reason: &str) -> anyhow::Error {
    anyhow!(
        "Failed to load config {}: {key_path}: {reason}",
        config_path.display()
    )
}

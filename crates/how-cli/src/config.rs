//! User configuration, stored as `config.yaml` in the configuration directory.

use anyhow::{Context, Result};
use how_core::StoreOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the configuration inside the configuration directory.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Overrides the configuration directory when set.
pub const CONFIG_DIR_ENV: &str = "HOW_CONFIG_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub system_prompt: String,
    #[serde(default)]
    pub anthropic: AnthropicConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropicConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_anthropic_model")]
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_model")]
    pub model: String,
    #[serde(default = "default_ollama_url")]
    pub url: String,
}

/// Settings for the command memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Interactions recalled for a question.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    /// Interactions shown by `memory list`.
    #[serde(default = "default_list_limit")]
    pub list_limit: usize,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_provider() -> String {
    "anthropic".to_string()
}

fn default_anthropic_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o".to_string()
}

fn default_ollama_model() -> String {
    "llama3".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_true() -> bool {
    true
}

fn default_search_limit() -> usize {
    10
}

fn default_list_limit() -> usize {
    20
}

fn default_busy_timeout_ms() -> u64 {
    how_core::DEFAULT_BUSY_TIMEOUT.as_millis() as u64
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            system_prompt: String::new(),
            anthropic: AnthropicConfig::default(),
            openai: OpenAiConfig::default(),
            ollama: OllamaConfig::default(),
            memory: MemoryConfig::default(),
        }
    }
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_anthropic_model(),
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_openai_model(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            model: default_ollama_model(),
            url: default_ollama_url(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            search_limit: default_search_limit(),
            list_limit: default_list_limit(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl MemoryConfig {
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }
}

/// The configuration directory: `$HOW_CONFIG_DIR`, else `~/.config/how`.
pub fn config_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("how"))
}

impl Config {
    /// Load config from `dir`, then apply API keys from the environment.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let mut config = Self::load_file(dir)?;
        config.apply_env_with(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load config from the default directory.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_dir()?)
    }

    /// Parse `config.yaml` in `dir`, or return defaults when it does not exist.
    fn load_file(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(target: "how::config", "No config at {}, using defaults", path.display());
                return Ok(Config::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        // An empty file deserializes to unit, not a mapping.
        if content.trim().is_empty() {
            return Ok(Config::default());
        }

        serde_yaml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Non-empty `ANTHROPIC_API_KEY` / `OPENAI_API_KEY` take precedence over the file.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("ANTHROPIC_API_KEY").filter(|k| !k.is_empty()) {
            self.anthropic.api_key = key;
        }
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()) {
            self.openai.api_key = key;
        }
    }

    /// Write this config to `dir`, readable by the owner only.
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config directory {}", dir.display()))?;

        let path = dir.join(CONFIG_FILE_NAME);
        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to restrict permissions on {}", path.display()))?;
        }

        tracing::info!(target: "how::config", "Wrote config to {}", path.display());
        Ok(path)
    }

    /// The config file and its contents, or where to create one.
    pub fn show(dir: &Path) -> Result<String> {
        let path = dir.join(CONFIG_FILE_NAME);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(format!("Config file: {}\n\n{}", path.display(), content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(format!(
                "No config file found. Create one at: {}",
                path.display()
            )),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &Path, content: &str) {
        std::fs::write(dir.join(CONFIG_FILE_NAME), content).unwrap();
    }

    #[test]
    fn test_defaults_when_file_missing() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_file(temp_dir.path()).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.provider, "anthropic");
        assert_eq!(config.anthropic.model, "claude-sonnet-4-5-20250929");
        assert_eq!(config.openai.model, "gpt-4o");
        assert_eq!(config.ollama.url, "http://localhost:11434/v1");
        assert!(config.memory.enabled);
        assert_eq!(config.memory.busy_timeout_ms, 5000);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp_dir = TempDir::new().unwrap();
        write_config(
            temp_dir.path(),
            "provider: ollama\nanthropic:\n  api_key: sk-file\nmemory:\n  enabled: false\n",
        );

        let config = Config::load_file(temp_dir.path()).unwrap();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.anthropic.api_key, "sk-file");
        assert_eq!(config.anthropic.model, "claude-sonnet-4-5-20250929");
        assert!(!config.memory.enabled);
        assert_eq!(config.memory.search_limit, 10);
        assert_eq!(config.ollama.model, "llama3");
    }

    #[test]
    fn test_empty_file_is_default() {
        let temp_dir = TempDir::new().unwrap();
        write_config(temp_dir.path(), "\n");
        assert_eq!(Config::load_file(temp_dir.path()).unwrap(), Config::default());
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        write_config(temp_dir.path(), "memory: [unclosed\n");

        let err = Config::load_file(temp_dir.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_env_keys_override_file() {
        let mut config = Config::default();
        config.anthropic.api_key = "sk-file".to_string();
        config.openai.api_key = "sk-openai-file".to_string();

        config.apply_env_with(|key| match key {
            "ANTHROPIC_API_KEY" => Some("sk-env".to_string()),
            "OPENAI_API_KEY" => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.anthropic.api_key, "sk-env");
        assert_eq!(config.openai.api_key, "sk-openai-file");
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("how");

        let mut config = Config::default();
        config.system_prompt = "Prefer POSIX tools".to_string();
        config.memory.list_limit = 5;

        let path = config.save_to(&dir).unwrap();
        assert_eq!(path, dir.join(CONFIG_FILE_NAME));
        assert_eq!(Config::load_file(&dir).unwrap(), config);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_empty_system_prompt_is_not_written() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        assert!(!yaml.contains("system_prompt"));
        assert!(yaml.contains("busy_timeout_ms: 5000"));
    }

    #[test]
    fn test_show() {
        let temp_dir = TempDir::new().unwrap();

        let hint = Config::show(temp_dir.path()).unwrap();
        assert!(hint.starts_with("No config file found. Create one at:"));

        Config::default().save_to(temp_dir.path()).unwrap();
        let shown = Config::show(temp_dir.path()).unwrap();
        assert!(shown.starts_with("Config file:"));
        assert!(shown.contains("provider: anthropic"));
    }

    #[test]
    fn test_store_options_from_memory_config() {
        let memory = MemoryConfig {
            busy_timeout_ms: 250,
            ..MemoryConfig::default()
        };
        assert_eq!(memory.store_options().busy_timeout, Duration::from_millis(250));
    }
}

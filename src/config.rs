use std::{env, path::PathBuf, time::Duration};

use directories::BaseDirs;
use lazy_static::lazy_static;
use serde::Deserialize;
use strum::{Display, EnumString};

const CONFIG: &str = include_str!("../.config/config.json5");

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub config_dir: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    /// Rows requested with each dataset preview
    pub preview_limit: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PollingConfig {
    pub interval_ms: u64,
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NotificationConfig {
    pub toast_duration_ms: u64,
}

impl NotificationConfig {
    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.toast_duration_ms)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LlmProvider {
    OpenAi,
    Groq,
    Gemini,
    OpenRouter,
}

impl LlmProvider {
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o",
            Self::Groq => "llama3-70b-8192",
            Self::Gemini => "gemini-1.5-pro",
            Self::OpenRouter => "anthropic/claude-3-opus",
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    #[serde(default)]
    pub model: Option<String>,
    /// Name of the environment variable holding the provider key
    pub api_key_env: String,
}

impl LlmConfig {
    pub fn model_name(&self) -> String {
        self.model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    /// Provider key from the environment; empty when unset
    pub fn api_key(&self) -> String {
        env::var(&self.api_key_env).unwrap_or_default()
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default, flatten)]
    pub config: AppConfig,
    pub api: ApiConfig,
    pub polling: PollingConfig,
    pub notifications: NotificationConfig,
    pub llm: LlmConfig,
}

lazy_static! {
    pub static ref PROJECT_NAME: String = env!("CARGO_CRATE_NAME").to_uppercase().to_string();
    pub static ref DATA_FOLDER: Option<PathBuf> =
        env::var(format!("{}_DATA", PROJECT_NAME.clone()))
            .ok()
            .map(PathBuf::from);
    pub static ref CONFIG_FOLDER: Option<PathBuf> =
        env::var(format!("{}_CONFIG", PROJECT_NAME.clone()))
            .ok()
            .map(PathBuf::from);
}

impl Config {
    /// Embedded defaults only, ignoring files and the environment
    pub fn defaults() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(CONFIG, config::FileFormat::Json5))
            .build()?
            .try_deserialize()
    }

    /// Layer embedded defaults, then the user file, then `DSFORGE_*`
    /// environment variables (`__` separates sections).
    ///
    /// An explicit path must exist; the default `<config dir>/config.json5`
    /// is optional.
    pub fn from_path(config_path: Option<&PathBuf>) -> Result<Self, config::ConfigError> {
        let data_dir = get_data_dir();
        let config_dir = get_config_dir();
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(CONFIG, config::FileFormat::Json5))
            .set_default("data_dir", data_dir.to_string_lossy().to_string())?
            .set_default("config_dir", config_dir.to_string_lossy().to_string())?;

        builder = match config_path {
            Some(p) => builder.add_source(
                config::File::from(expand_tilde(p))
                    .format(config::FileFormat::Json5)
                    .required(true),
            ),
            None => builder.add_source(
                config::File::from(config_dir.join("config.json5"))
                    .format(config::FileFormat::Json5)
                    .required(false),
            ),
        };

        builder = builder.add_source(
            config::Environment::with_prefix(PROJECT_NAME.as_str())
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let cfg: Self = builder.build()?.try_deserialize()?;
        tracing::debug!("Loaded config, backend at {}", cfg.api.base_url);
        Ok(cfg)
    }
}

fn expand_tilde(path: &PathBuf) -> PathBuf {
    if let Some(s) = path.to_str() {
        if s.starts_with("~") {
            if let Some(base) = BaseDirs::new() {
                return PathBuf::from(s.replacen("~", base.home_dir().to_str().unwrap_or(""), 1));
            }
        }
    }
    path.clone()
}

pub fn get_data_dir() -> PathBuf {
    if let Some(s) = DATA_FOLDER.clone() {
        s
    } else {
        PathBuf::from(".").join(".data")
    }
}

pub fn get_config_dir() -> PathBuf {
    if let Some(s) = CONFIG_FOLDER.clone() {
        s
    } else if let Some(base) = BaseDirs::new() {
        base.config_dir().join(env!("CARGO_CRATE_NAME"))
    } else {
        PathBuf::from(".").join(".config")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_embedded_defaults() {
        let cfg = Config::defaults().unwrap();
        assert_eq!(cfg.api.base_url, "http://localhost:8000/api/v1");
        assert_eq!(cfg.api.preview_limit, 10);
        assert_eq!(cfg.polling.interval(), Duration::from_millis(2000));
        assert_eq!(cfg.notifications.toast_duration(), Duration::from_millis(5000));
        assert_eq!(cfg.llm.provider, LlmProvider::OpenAi);
        assert_eq!(cfg.llm.model_name(), "gpt-4o");
    }

    #[test]
    fn test_user_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".json5").tempfile().unwrap();
        writeln!(
            file,
            r#"{{ polling: {{ interval_ms: 500 }}, llm: {{ provider: "groq" }} }}"#
        )
        .unwrap();

        let cfg = Config::from_path(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.polling.interval_ms, 500);
        assert_eq!(cfg.llm.provider, LlmProvider::Groq);
        assert_eq!(cfg.llm.model_name(), "llama3-70b-8192");
        assert_eq!(cfg.notifications.toast_duration_ms, 5000);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json5");
        assert!(Config::from_path(Some(&missing)).is_err());
    }

    #[test]
    fn test_provider_names() {
        assert_eq!(LlmProvider::from_str("openrouter").unwrap(), LlmProvider::OpenRouter);
        assert_eq!(LlmProvider::Gemini.to_string(), "gemini");
        assert_eq!(LlmProvider::Gemini.default_model(), "gemini-1.5-pro");
    }
}

//! Credentials and endpoint settings.
//!
//! Values come from, in order of precedence:
//!
//! 1. environment variables (`OPENAI_API_KEY`, `OPENAI_BASE_URL`,
//!    `OPENAI_MODEL`),
//! 2. the `[openai]` table of a TOML secrets file, `.secrets.toml` in the
//!    working directory unless `JUNGLE_QUEST_SECRETS` points elsewhere.
//!
//! A missing API key is not an error until a provider is configured, so
//! the front-end can still ask the player for one.

use std::fmt::{self, Display};
use std::path::PathBuf;
use std::{env, fs, io};

use jungle_quest_openai_model::{OpenAIConfig, OpenAIConfigBuilder};
use serde::Deserialize;

/// Secrets file read when `JUNGLE_QUEST_SECRETS` is not set.
pub const DEFAULT_SECRETS_FILE: &str = ".secrets.toml";

/// Environment variable overriding the secrets file location.
pub const SECRETS_PATH_ENV: &str = "JUNGLE_QUEST_SECRETS";

const API_KEY_ENV: &str = "OPENAI_API_KEY";
const BASE_URL_ENV: &str = "OPENAI_BASE_URL";
const MODEL_ENV: &str = "OPENAI_MODEL";

#[derive(Debug, Default, Deserialize)]
struct SecretsFile {
    #[serde(default)]
    openai: OpenAISecrets,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAISecrets {
    #[serde(rename = "OPENAI_API_KEY")]
    api_key: Option<String>,
    #[serde(rename = "OPENAI_BASE_URL")]
    base_url: Option<String>,
    #[serde(rename = "OPENAI_MODEL")]
    model: Option<String>,
}

/// Errors while loading the configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// The secrets file could not be read.
    Read {
        /// Location of the file.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
    /// The secrets file is not valid TOML or has unexpected types.
    Parse {
        /// Location of the file.
        path: PathBuf,
        /// The underlying error.
        source: toml::de::Error,
    },
    /// No API key was found anywhere.
    MissingApiKey,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "cannot read {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "cannot parse {}: {source}", path.display())
            }
            ConfigError::MissingApiKey => write!(
                f,
                "no API key, set {API_KEY_ENV} or add it to {DEFAULT_SECRETS_FILE}"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::MissingApiKey => None,
        }
    }
}

/// Settings for the model provider.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Config {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl Config {
    /// Loads the configuration from the process environment and the
    /// secrets file.
    ///
    /// A missing default secrets file is fine; a missing file named by
    /// `JUNGLE_QUEST_SECRETS` is an error.
    pub fn load() -> Result<Self, ConfigError> {
        let var = |name: &str| env::var(name).ok();
        let (path, explicit) = match var(SECRETS_PATH_ENV) {
            Some(path) if !path.is_empty() => (PathBuf::from(path), true),
            _ => (PathBuf::from(DEFAULT_SECRETS_FILE), false),
        };

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => {
                debug!("loaded secrets from {}", path.display());
                Some(contents)
            }
            Err(err) if !explicit && err.kind() == io::ErrorKind::NotFound => {
                None
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        Self::resolve(contents.as_deref(), var)
            .map_err(|source| ConfigError::Parse { path, source })
    }

    /// Builds the configuration from the contents of a secrets file and an
    /// environment lookup. Empty values count as unset.
    pub fn resolve(
        secrets: Option<&str>,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, toml::de::Error> {
        let secrets = match secrets {
            Some(contents) => toml::from_str::<SecretsFile>(contents)?,
            None => SecretsFile::default(),
        };
        let clean = |value: String| {
            Some(value.trim().to_owned()).filter(|value| !value.is_empty())
        };
        let pick = |name: &str, from_file: Option<String>| {
            var(name).and_then(clean).or_else(|| from_file.and_then(clean))
        };
        Ok(Self {
            api_key: pick(API_KEY_ENV, secrets.openai.api_key),
            base_url: pick(BASE_URL_ENV, secrets.openai.base_url),
            model: pick(MODEL_ENV, secrets.openai.model),
        })
    }

    /// Returns the API key, if one was configured.
    #[inline]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// Replaces the API key, e.g. with one typed in by the player.
    #[inline]
    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        let api_key = api_key.into();
        self.api_key = Some(api_key).filter(|key| !key.is_empty());
        self
    }

    /// Builds the provider configuration.
    pub fn provider_config(&self) -> Result<OpenAIConfig, ConfigError> {
        let Some(api_key) = &self.api_key else {
            return Err(ConfigError::MissingApiKey);
        };
        let mut builder = OpenAIConfigBuilder::with_api_key(api_key);
        if let Some(base_url) = &self.base_url {
            builder = builder.with_base_url(base_url);
        }
        if let Some(model) = &self.model {
            builder = builder.with_model(model);
        }
        Ok(builder.build())
    }
}

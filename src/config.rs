use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const CLIENT_ID_VAR: &str = "SPOTIPY_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "SPOTIPY_CLIENT_SECRET";
pub const REDIRECT_URI_VAR: &str = "SPOTIPY_REDIRECT_URI";
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";

/// Credentials for the streaming service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub token_cache: PathBuf,
}

impl Settings {
    /// Load credentials from the process environment, after applying an env file.
    ///
    /// Without `env_file`, a `.env` in the working directory is applied when
    /// present. An explicitly named file that cannot be read is an error.
    pub fn load(env_file: Option<&Path>, token_cache: PathBuf) -> Result<Self, ConfigError> {
        match env_file {
            Some(path) => {
                dotenvy::from_path(path).map_err(|source| ConfigError::EnvFile {
                    path: path.to_path_buf(),
                    source,
                })?;
                log::debug!("Loaded environment from {:?}", path);
            }
            None => {
                if let Ok(path) = dotenvy::dotenv() {
                    log::debug!("Loaded environment from {:?}", path);
                }
            }
        }

        Self::from_lookup(|name| std::env::var(name).ok(), token_cache)
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F, token_cache: PathBuf) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let client_id = non_empty(CLIENT_ID_VAR);
        let client_secret = non_empty(CLIENT_SECRET_VAR);

        let missing: Vec<&'static str> = [
            (CLIENT_ID_VAR, client_id.is_none()),
            (CLIENT_SECRET_VAR, client_secret.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();

        let (Some(client_id), Some(client_secret)) = (client_id, client_secret) else {
            return Err(ConfigError::MissingCredentials(missing));
        };

        let redirect_uri =
            non_empty(REDIRECT_URI_VAR).unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());
        if !(redirect_uri.starts_with("http://") || redirect_uri.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                var: REDIRECT_URI_VAR,
                reason: format!("expected an http(s) URL, got {:?}", redirect_uri),
            });
        }

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri,
            token_cache,
        })
    }

    /// Client id shortened for logs.
    pub fn redacted_client_id(&self) -> String {
        let prefix: String = self.client_id.chars().take(10).collect();
        format!("{}...", prefix)
    }
}

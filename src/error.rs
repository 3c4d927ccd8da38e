use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Missing or unusable credentials. Always fatal, raised before any network call.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing Spotify credentials: {}\n\nCreate a .env file with:\n  SPOTIPY_CLIENT_ID=your_client_id\n  SPOTIPY_CLIENT_SECRET=your_client_secret\n  SPOTIPY_REDIRECT_URI=http://127.0.0.1:8888/callback", .0.join(", "))]
    MissingCredentials(Vec<&'static str>),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("failed to read env file {path:?}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

/// Failure reported by the streaming service (or a call that never returned).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("{0}")]
    Request(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Serial transport failure.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("serial write failed: {0}")]
    Write(#[from] std::io::Error),
}

/// Outcome of a playback command that did not go through.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("No devices available")]
    NoDevice,

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credentials_lists_every_variable() {
        let message =
            ConfigError::MissingCredentials(vec!["SPOTIPY_CLIENT_ID", "SPOTIPY_CLIENT_SECRET"])
                .to_string();
        assert!(message.starts_with(
            "missing Spotify credentials: SPOTIPY_CLIENT_ID, SPOTIPY_CLIENT_SECRET"
        ));
        assert!(message.contains("SPOTIPY_REDIRECT_URI="));
    }

    #[test]
    fn relay_error_keeps_provider_message() {
        let err = RelayError::from(ProviderError::Request("Player command failed".into()));
        assert_eq!(err.to_string(), "Player command failed");
        assert_eq!(RelayError::NoDevice.to_string(), "No devices available");
    }
}

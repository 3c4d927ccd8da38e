use async_trait::async_trait;
use rspotify::model::{AdditionalType, CurrentPlaybackContext, PlayableItem};
use rspotify::prelude::*;
use rspotify::{scopes, AuthCodeSpotify, ClientError, Config, Credentials, OAuth};
use std::collections::HashSet;

use crate::config::Settings;
use crate::error::ProviderError;
use crate::types::{Device, PlaybackState};

/// The slice of the streaming service the displays and relay depend on.
#[async_trait]
pub trait StreamingClient: Send + Sync {
    /// What is playing right now, or `None` when no item is active.
    async fn playback_state(&self) -> Result<Option<PlaybackState>, ProviderError>;

    async fn devices(&self) -> Result<Vec<Device>, ProviderError>;

    /// Resume playback. `None` lets the provider pick its default target.
    async fn play(&self, device_id: Option<&str>) -> Result<(), ProviderError>;

    async fn pause(&self, device_id: Option<&str>) -> Result<(), ProviderError>;

    async fn next(&self) -> Result<(), ProviderError>;

    async fn previous(&self) -> Result<(), ProviderError>;
}

/// Without `episode` the API reports podcasts as an empty item.
const PLAYABLE_TYPES: [AdditionalType; 2] = [AdditionalType::Track, AdditionalType::Episode];

/// Permissions requested during authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    Control,
}

impl Access {
    fn scopes(self) -> HashSet<String> {
        match self {
            Access::ReadOnly => scopes!("user-read-currently-playing", "user-read-playback-state"),
            Access::Control => scopes!(
                "user-read-playback-state",
                "user-modify-playback-state",
                "user-read-currently-playing"
            ),
        }
    }
}

impl From<ClientError> for ProviderError {
    fn from(err: ClientError) -> Self {
        ProviderError::Request(err.to_string())
    }
}

/// Spotify Web API client; token exchange and refresh are handled by rspotify.
#[derive(Clone, Debug)]
pub struct SpotifyClient {
    inner: AuthCodeSpotify,
}

impl SpotifyClient {
    pub fn new(settings: &Settings, access: Access) -> Self {
        let credentials = Credentials::new(&settings.client_id, &settings.client_secret);
        let oauth = OAuth {
            redirect_uri: settings.redirect_uri.clone(),
            scopes: access.scopes(),
            ..Default::default()
        };
        let config = Config {
            token_cached: true,
            token_refreshing: true,
            cache_path: settings.token_cache.clone(),
            ..Default::default()
        };

        Self {
            inner: AuthCodeSpotify::with_config(credentials, oauth, config),
        }
    }

    /// Obtain a token, from the cache when possible, otherwise by asking the
    /// user to authorize in a browser and paste the redirect URL back.
    pub async fn authenticate(&self) -> Result<(), ProviderError> {
        let url = self.inner.get_authorize_url(false)?;
        self.inner.prompt_for_token(&url).await?;
        log::info!("Authenticated with Spotify");
        Ok(())
    }
}

#[async_trait]
impl StreamingClient for SpotifyClient {
    async fn playback_state(&self) -> Result<Option<PlaybackState>, ProviderError> {
        let context = self
            .inner
            .current_playback(None, Some(&PLAYABLE_TYPES))
            .await?;
        Ok(context.and_then(playback_from_context))
    }

    async fn devices(&self) -> Result<Vec<Device>, ProviderError> {
        let devices = self.inner.device().await?;
        Ok(devices
            .into_iter()
            .filter_map(|device| {
                let id = device.id?;
                Some(Device {
                    id,
                    name: device.name,
                    is_active: device.is_active,
                })
            })
            .collect())
    }

    async fn play(&self, device_id: Option<&str>) -> Result<(), ProviderError> {
        self.inner.resume_playback(device_id, None).await?;
        Ok(())
    }

    async fn pause(&self, device_id: Option<&str>) -> Result<(), ProviderError> {
        self.inner.pause_playback(device_id).await?;
        Ok(())
    }

    async fn next(&self) -> Result<(), ProviderError> {
        self.inner.next_track(None).await?;
        Ok(())
    }

    async fn previous(&self) -> Result<(), ProviderError> {
        self.inner.previous_track(None).await?;
        Ok(())
    }
}

fn playback_from_context(context: CurrentPlaybackContext) -> Option<PlaybackState> {
    let progress_ms = context
        .progress
        .map(|progress| non_negative_ms(progress.num_milliseconds()))
        .unwrap_or(0);

    let state = match context.item? {
        PlayableItem::Track(track) => PlaybackState {
            is_playing: context.is_playing,
            track_name: track.name,
            artist_names: track.artists.into_iter().map(|artist| artist.name).collect(),
            album_name: track.album.name,
            album_art_url: track
                .album
                .images
                .into_iter()
                .next()
                .map(|image| image.url)
                .unwrap_or_default(),
            duration_ms: non_negative_ms(track.duration.num_milliseconds()),
            progress_ms,
            track_uri: track.id.map(|id| id.uri()).unwrap_or_default(),
        },
        PlayableItem::Episode(episode) => PlaybackState {
            is_playing: context.is_playing,
            track_name: episode.name,
            artist_names: vec![episode.show.publisher],
            album_name: episode.show.name,
            album_art_url: episode
                .images
                .into_iter()
                .next()
                .map(|image| image.url)
                .unwrap_or_default(),
            duration_ms: non_negative_ms(episode.duration.num_milliseconds()),
            progress_ms,
            track_uri: episode.id.uri(),
        },
    };

    Some(state)
}

fn non_negative_ms(ms: i64) -> u64 {
    u64::try_from(ms).unwrap_or(0)
}

#[cfg(test)]
pub(crate) mod stub {
    //! Scripted client used by the poll loop, relay and server tests.

    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Devices,
        Play(Option<String>),
        Pause(Option<String>),
        Next,
        Previous,
    }

    #[derive(Default)]
    pub struct StubClient {
        states: Mutex<VecDeque<Result<Option<PlaybackState>, ProviderError>>>,
        devices: Mutex<Vec<Device>>,
        command_error: Mutex<Option<ProviderError>>,
        calls: Mutex<Vec<Call>>,
    }

    impl StubClient {
        pub fn with_states(
            states: impl IntoIterator<Item = Result<Option<PlaybackState>, ProviderError>>,
        ) -> Self {
            let stub = Self::default();
            stub.states.lock().extend(states);
            stub
        }

        pub fn with_devices(devices: Vec<Device>) -> Self {
            let stub = Self::default();
            *stub.devices.lock() = devices;
            stub
        }

        pub fn fail_commands(&self, err: ProviderError) {
            *self.command_error.lock() = Some(err);
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }

        fn command(&self, call: Call) -> Result<(), ProviderError> {
            self.calls.lock().push(call);
            match self.command_error.lock().clone() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    pub fn device(id: &str, is_active: bool) -> Device {
        Device {
            id: id.to_string(),
            name: format!("Device {}", id),
            is_active,
        }
    }

    #[async_trait]
    impl StreamingClient for StubClient {
        async fn playback_state(&self) -> Result<Option<PlaybackState>, ProviderError> {
            self.states.lock().pop_front().unwrap_or(Ok(None))
        }

        async fn devices(&self) -> Result<Vec<Device>, ProviderError> {
            self.calls.lock().push(Call::Devices);
            Ok(self.devices.lock().clone())
        }

        async fn play(&self, device_id: Option<&str>) -> Result<(), ProviderError> {
            self.command(Call::Play(device_id.map(str::to_string)))
        }

        async fn pause(&self, device_id: Option<&str>) -> Result<(), ProviderError> {
            self.command(Call::Pause(device_id.map(str::to_string)))
        }

        async fn next(&self) -> Result<(), ProviderError> {
            self.command(Call::Next)
        }

        async fn previous(&self) -> Result<(), ProviderError> {
            self.command(Call::Previous)
        }
    }
}

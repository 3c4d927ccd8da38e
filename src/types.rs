use serde::Serialize;

/// What the streaming service reports as currently playing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub track_name: String,
    pub artist_names: Vec<String>,
    pub album_name: String,
    pub album_art_url: String,
    pub duration_ms: u64,
    pub progress_ms: u64,
    pub track_uri: String,
}

impl PlaybackState {
    /// First credited artist, or empty when the provider sent none.
    pub fn primary_artist(&self) -> &str {
        self.artist_names.first().map(String::as_str).unwrap_or("")
    }

    pub fn joined_artists(&self) -> String {
        self.artist_names.join(", ")
    }
}

/// A playback target registered with the provider (speaker, app instance).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub is_active: bool,
}

/// Last observation published to the web display.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Snapshot {
    /// No poll has completed yet
    #[default]
    Pending,
    Idle,
    Track(PlaybackState),
    /// The most recent fetch failed with this message
    Failed(String),
}

impl Snapshot {
    pub fn from_state(state: Option<&PlaybackState>) -> Self {
        match state {
            Some(state) => Snapshot::Track(state.clone()),
            None => Snapshot::Idle,
        }
    }
}

/// JSON body of `GET /current-track`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum TrackPayload {
    Track(TrackInfo),
    Idle { playing: bool },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub playing: bool,
    pub name: String,
    pub artist: String,
    pub album: String,
    pub album_art: String,
    pub duration: u64,
    pub progress: u64,
    pub uri: String,
}

impl TrackPayload {
    pub fn idle() -> Self {
        TrackPayload::Idle { playing: false }
    }
}

impl From<&PlaybackState> for TrackPayload {
    fn from(state: &PlaybackState) -> Self {
        TrackPayload::Track(TrackInfo {
            playing: state.is_playing,
            name: state.track_name.clone(),
            artist: state.joined_artists(),
            album: state.album_name.clone(),
            album_art: state.album_art_url.clone(),
            duration: state.duration_ms,
            progress: state.progress_ms,
            uri: state.track_uri.clone(),
        })
    }
}

#[cfg(test)]
pub(crate) fn sample_state(track: &str, artist: &str) -> PlaybackState {
    PlaybackState {
        is_playing: true,
        track_name: track.to_string(),
        artist_names: vec![artist.to_string()],
        album_name: "Album".to_string(),
        album_art_url: "https://i.scdn.co/image/abc".to_string(),
        duration_ms: 200_000,
        progress_ms: 42_000,
        track_uri: "spotify:track:abc".to_string(),
    }
}

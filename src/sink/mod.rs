//! Destinations that render playback state for a human.

mod lcd;
mod web;

pub use lcd::{format_line, SerialLcdSink, FIELD_WIDTH, NOTHING_PLAYING};
pub use web::WebSink;

use crate::error::{ProviderError, TransportError};
use crate::types::PlaybackState;

/// When the poll loop should hand a fresh observation to a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPolicy {
    /// Only when the displayed track changes
    OnChange,
    /// On every successful poll
    EveryTick,
}

pub trait DisplaySink: Send {
    fn name(&self) -> &'static str;

    fn policy(&self) -> RenderPolicy;

    /// Show `state`, or a "nothing playing" indicator for `None`.
    fn render(&mut self, state: Option<&PlaybackState>) -> Result<(), TransportError>;

    /// Called when a fetch failed. Most sinks keep showing what they have.
    fn record_failure(&mut self, _err: &ProviderError) {}
}

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::client::StreamingClient;
use crate::error::ProviderError;
use crate::sink::{DisplaySink, RenderPolicy};
use crate::types::PlaybackState;

/// What a display shows, reduced to the fields that decide a redraw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKey {
    Track { name: String, primary_artist: String },
    NothingPlaying,
}

impl ChangeKey {
    /// Paused playback keys the same as nothing playing.
    pub fn of(state: Option<&PlaybackState>) -> Self {
        match state {
            Some(state) if state.is_playing => ChangeKey::Track {
                name: state.track_name.clone(),
                primary_artist: state.primary_artist().to_string(),
            },
            _ => ChangeKey::NothingPlaying,
        }
    }
}

/// `previous` is `None` until the first successful render.
pub fn should_render(previous: Option<&ChangeKey>, current: &ChangeKey) -> bool {
    previous != Some(current)
}

pub fn track_changed(previous: Option<&PlaybackState>, current: Option<&PlaybackState>) -> bool {
    ChangeKey::of(previous) != ChangeKey::of(current)
}

/// Per-tick result, mostly for tests and debug logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub fetch_failed: bool,
    pub rendered: Vec<&'static str>,
    pub render_failed: Vec<&'static str>,
}

struct SinkSlot {
    sink: Box<dyn DisplaySink>,
    last_key: Option<ChangeKey>,
}

/// Polls the provider on a fixed interval and feeds the sinks.
pub struct PollLoop {
    client: Arc<dyn StreamingClient>,
    slots: Vec<SinkSlot>,
    interval: Duration,
    fetch_timeout: Duration,
    wake: Arc<Notify>,
    last_state: Option<PlaybackState>,
}

impl PollLoop {
    pub fn new(client: Arc<dyn StreamingClient>, interval: Duration) -> Self {
        Self {
            client,
            slots: Vec::new(),
            interval,
            fetch_timeout: Duration::from_secs(10),
            wake: Arc::new(Notify::new()),
            last_state: None,
        }
    }

    pub fn with_sink(mut self, sink: impl DisplaySink + 'static) -> Self {
        self.slots.push(SinkSlot {
            sink: Box::new(sink),
            last_key: None,
        });
        self
    }

    #[cfg(test)]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Handle that cuts the current wait short, e.g. after a skip command.
    pub fn waker(&self) -> Arc<Notify> {
        self.wake.clone()
    }

    /// Fetch once and update the sinks. Never fails: errors are logged and
    /// reported to the sinks.
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport {
            fetch_failed: false,
            rendered: Vec::new(),
            render_failed: Vec::new(),
        };

        let state = match fetch_state(&*self.client, self.fetch_timeout).await {
            Ok(state) => state,
            Err(err) => {
                log::error!("Error fetching playback state: {}", err);
                for slot in &mut self.slots {
                    slot.sink.record_failure(&err);
                }
                report.fetch_failed = true;
                return report;
            }
        };

        if track_changed(self.last_state.as_ref(), state.as_ref()) {
            match state.as_ref().filter(|s| s.is_playing) {
                Some(s) => log::info!("Now playing: {} - {}", s.track_name, s.joined_artists()),
                None => log::info!("Nothing playing"),
            }
        }

        let key = ChangeKey::of(state.as_ref());
        for slot in &mut self.slots {
            let due = match slot.sink.policy() {
                RenderPolicy::EveryTick => true,
                RenderPolicy::OnChange => should_render(slot.last_key.as_ref(), &key),
            };
            if !due {
                continue;
            }

            match slot.sink.render(state.as_ref()) {
                Ok(()) => {
                    slot.last_key = Some(key.clone());
                    report.rendered.push(slot.sink.name());
                }
                Err(err) => {
                    // Key stays put so the next tick retries the write
                    log::error!("Error updating {} display: {}", slot.sink.name(), err);
                    report.render_failed.push(slot.sink.name());
                }
            }
        }

        self.last_state = state;
        report
    }

    /// Tick until `shutdown` resolves.
    pub async fn run_until<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        log::info!(
            "Polling playback every {:?} for {} display(s)",
            self.interval,
            self.slots.len()
        );

        tokio::pin!(shutdown);
        loop {
            // A hung fetch must not hold up shutdown
            tokio::select! {
                _ = &mut shutdown => break,
                report = self.tick() => log::debug!("Tick: {:?}", report),
            }

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.wake.notified() => log::debug!("Poll woken early"),
            }
        }

        log::info!("Poll loop stopped");
    }
}

async fn fetch_state(
    client: &dyn StreamingClient,
    timeout: Duration,
) -> Result<Option<PlaybackState>, ProviderError> {
    match tokio::time::timeout(timeout, client.playback_state()).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(timeout)),
    }
}

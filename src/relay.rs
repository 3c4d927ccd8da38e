use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::client::StreamingClient;
use crate::error::RelayError;
use crate::types::Device;

/// Delay after a skip so the provider reports the new track on the next poll.
pub const SKIP_SETTLE: Duration = Duration::from_millis(300);

/// Playback commands issued from the browser page or tray menu.
pub struct CommandRelay {
    client: Arc<dyn StreamingClient>,
    skip_settle: Duration,
    poll_wake: Option<Arc<Notify>>,
}

impl CommandRelay {
    pub fn new(client: Arc<dyn StreamingClient>) -> Self {
        Self {
            client,
            skip_settle: SKIP_SETTLE,
            poll_wake: None,
        }
    }

    #[cfg(test)]
    pub fn with_skip_settle(mut self, delay: Duration) -> Self {
        self.skip_settle = delay;
        self
    }

    /// Wake the poll loop after each successful command.
    pub fn with_poll_wake(mut self, wake: Arc<Notify>) -> Self {
        self.poll_wake = Some(wake);
        self
    }

    /// Resume on the active device, or the first known one.
    pub async fn play(&self) -> Result<(), RelayError> {
        let devices = self.client.devices().await?;
        let target = resolve_target(&devices).ok_or(RelayError::NoDevice)?;

        log::info!("Resuming playback on {} ({})", target.name, target.id);
        self.client.play(Some(&target.id)).await?;
        self.commanded();
        Ok(())
    }

    /// Pause the active device; without one, let the provider pick.
    ///
    /// Unlike `play`, an empty device list is not `NoDevice`: the unscoped
    /// pause still goes out and the provider decides.
    pub async fn pause(&self) -> Result<(), RelayError> {
        let devices = self.client.devices().await?;

        match active_device(&devices) {
            Some(device) => {
                log::info!("Pausing playback on {} ({})", device.name, device.id);
                self.client.pause(Some(&device.id)).await?;
            }
            None => {
                log::info!("Pausing playback on the default device");
                self.client.pause(None).await?;
            }
        }

        self.commanded();
        Ok(())
    }

    pub async fn next(&self) -> Result<(), RelayError> {
        log::info!("Skipping to next track");
        self.client.next().await?;
        tokio::time::sleep(self.skip_settle).await;
        self.commanded();
        Ok(())
    }

    pub async fn previous(&self) -> Result<(), RelayError> {
        log::info!("Skipping to previous track");
        self.client.previous().await?;
        tokio::time::sleep(self.skip_settle).await;
        self.commanded();
        Ok(())
    }

    fn commanded(&self) {
        if let Some(wake) = &self.poll_wake {
            wake.notify_one();
        }
    }
}

pub fn active_device(devices: &[Device]) -> Option<&Device> {
    devices.iter().find(|device| device.is_active)
}

/// First active device, falling back to the first listed.
pub fn resolve_target(devices: &[Device]) -> Option<&Device> {
    active_device(devices).or_else(|| devices.first())
}

//! Proxy Connection Module
//!
//! Connects to a tracked device's proxy. Every attempt is bounded by a timer;
//! on timeout or failure the session falls back to disconnected and a
//! user-facing message is sent instead of hanging.

use crate::domain::models::{AppEvent, ConnectionStatus, MessageSeverity, StatusMessage};
use crate::domain::settings::ConnectionSettings;
use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

const PLAY_SOUND: &str = "PLAY_SOUND";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Please connect to the device first")]
    NotConnected,
    #[error("A connection attempt is already in progress")]
    AlreadyConnecting,
    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),
    #[error("Connection failed: {0}")]
    Link(#[from] anyhow::Error),
}

/// Transport to the device proxy.
#[async_trait]
pub trait ProxyLink: Send + Sync {
    /// Establish the link and return the reported battery level, if any.
    async fn establish(&self, device_id: Uuid) -> Result<Option<u8>>;
    async fn send(&self, device_id: Uuid, message: &str) -> Result<()>;
    async fn close(&self, device_id: Uuid);
}

/// Link that succeeds after a fixed delay without reporting a battery level.
pub struct SimulatedLink {
    delay: Duration,
}

impl SimulatedLink {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ProxyLink for SimulatedLink {
    async fn establish(&self, device_id: Uuid) -> Result<Option<u8>> {
        tokio::time::sleep(self.delay).await;
        info!("Simulated link established with {}", device_id);
        Ok(None)
    }

    async fn send(&self, device_id: Uuid, message: &str) -> Result<()> {
        info!("-> {}: {}", device_id, message);
        Ok(())
    }

    async fn close(&self, device_id: Uuid) {
        info!("Simulated link with {} closed", device_id);
    }
}

/// Reverts a `Connecting` session when the connect future is dropped
/// before the link answers.
struct PendingAttempt<'a> {
    status: &'a mut ConnectionStatus,
    event_sender: &'a mpsc::UnboundedSender<AppEvent>,
    armed: bool,
}

impl PendingAttempt<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingAttempt<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("Connection attempt cancelled");
        *self.status = ConnectionStatus::Disconnected;
        let _ = self
            .event_sender
            .send(AppEvent::ConnectionStatus(ConnectionStatus::Disconnected));
        let _ = self.event_sender.send(AppEvent::LogMessage(StatusMessage {
            message: "Connection attempt cancelled".to_string(),
            severity: MessageSeverity::Error,
        }));
    }
}

pub struct ProxySession<L: ProxyLink> {
    device_id: Uuid,
    link: L,
    status: ConnectionStatus,
    battery_level: u8,
    connect_timeout: Duration,
    event_sender: mpsc::UnboundedSender<AppEvent>,
}

impl<L: ProxyLink> ProxySession<L> {
    pub fn new(
        device_id: Uuid,
        battery_level: u8,
        link: L,
        settings: &ConnectionSettings,
        event_sender: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            device_id,
            link,
            status: ConnectionStatus::Disconnected,
            battery_level,
            connect_timeout: Duration::from_millis(settings.connect_timeout_ms),
            event_sender,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    pub fn battery_level(&self) -> u8 {
        self.battery_level
    }

    /// Connect, or disconnect when already connected.
    pub async fn connect(&mut self) -> Result<ConnectionStatus, SessionError> {
        match self.status {
            ConnectionStatus::Connected => {
                self.disconnect().await;
                return Ok(self.status);
            }
            ConnectionStatus::Connecting => return Err(SessionError::AlreadyConnecting),
            ConnectionStatus::Disconnected => {}
        }

        info!("Connecting to proxy of {}", self.device_id);
        self.set_status(ConnectionStatus::Connecting);

        let outcome = {
            let attempt = PendingAttempt {
                status: &mut self.status,
                event_sender: &self.event_sender,
                armed: true,
            };
            let outcome =
                tokio::time::timeout(self.connect_timeout, self.link.establish(self.device_id))
                    .await;
            attempt.disarm();
            outcome
        };

        let result = match outcome {
            Ok(Ok(reported_battery)) => {
                self.battery_level = match reported_battery {
                    Some(level) => level.min(100),
                    None if self.battery_level == 0 => rand::thread_rng().gen_range(20..=100),
                    None => self.battery_level,
                };
                self.set_status(ConnectionStatus::Connected);
                self.send_log("Connected to device", MessageSeverity::Success);
                return Ok(self.status);
            }
            Ok(Err(e)) => {
                error!("Proxy link failed: {}", e);
                SessionError::Link(e)
            }
            Err(_) => {
                warn!("Proxy connection timed out after {:?}", self.connect_timeout);
                SessionError::Timeout(self.connect_timeout)
            }
        };

        self.set_status(ConnectionStatus::Disconnected);
        self.send_log(&result.to_string(), MessageSeverity::Error);
        Err(result)
    }

    pub async fn disconnect(&mut self) {
        if self.status == ConnectionStatus::Disconnected {
            return;
        }
        self.link.close(self.device_id).await;
        self.set_status(ConnectionStatus::Disconnected);
        self.send_log("Disconnected from device", MessageSeverity::Info);
    }

    pub async fn play_sound(&self) -> Result<(), SessionError> {
        self.require_connected()?;
        self.link.send(self.device_id, PLAY_SOUND).await?;
        self.send_log("Sound played on device", MessageSeverity::Info);
        Ok(())
    }

    /// Gate for opening the chat surface.
    pub fn start_chat(&self) -> Result<(), SessionError> {
        self.require_connected()
    }

    /// Gate for requesting a map estimate.
    pub fn show_location(&self) -> Result<(), SessionError> {
        self.require_connected()
    }

    fn require_connected(&self) -> Result<(), SessionError> {
        if self.is_connected() {
            Ok(())
        } else {
            self.send_log(
                &SessionError::NotConnected.to_string(),
                MessageSeverity::Warning,
            );
            Err(SessionError::NotConnected)
        }
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        self.status = status;
        let _ = self.event_sender.send(AppEvent::ConnectionStatus(status));
    }

    fn send_log(&self, message: &str, severity: MessageSeverity) {
        let _ = self.event_sender.send(AppEvent::LogMessage(StatusMessage {
            message: message.to_string(),
            severity,
        }));
    }
}

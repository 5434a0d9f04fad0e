use serde::Deserialize;
use duet_core::error::{DuetError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    pub version: u32,

    #[serde(default)]
    pub relay: RelaySection,

    #[serde(default)]
    pub limits: LimitsSection,

    #[serde(default)]
    pub rooms: RoomsSection,

    #[serde(default)]
    pub chat: ChatSection,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            version: 1,
            relay: RelaySection::default(),
            limits: LimitsSection::default(),
            rooms: RoomsSection::default(),
            chat: ChatSection::default(),
        }
    }
}

impl RelayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(DuetError::UnsupportedVersion);
        }
        self.relay.validate()?;
        self.limits.validate()?;
        self.chat.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelaySection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,

    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    /// Per-connection outbound queue depth.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,

    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            ping_interval_ms: default_ping_interval_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
            outbound_queue: default_outbound_queue(),
            max_frame_bytes: default_max_frame_bytes(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl RelaySection {
    pub fn validate(&self) -> Result<()> {
        if self.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(DuetError::BadRequest(format!(
                "relay.listen must be a socket address, got {}",
                self.listen
            )));
        }
        if !(5000..=120000).contains(&self.ping_interval_ms) {
            return Err(DuetError::BadRequest(
                "relay.ping_interval_ms must be between 5000 and 120000".into(),
            ));
        }
        if !(10000..=600000).contains(&self.idle_timeout_ms) {
            return Err(DuetError::BadRequest(
                "relay.idle_timeout_ms must be between 10000 and 600000".into(),
            ));
        }
        if self.idle_timeout_ms <= self.ping_interval_ms {
            return Err(DuetError::BadRequest(
                "relay.idle_timeout_ms must be greater than ping_interval_ms".into(),
            ));
        }
        if !(1..=65536).contains(&self.outbound_queue) {
            return Err(DuetError::BadRequest(
                "relay.outbound_queue must be between 1 and 65536".into(),
            ));
        }
        if self.max_frame_bytes < 256 {
            return Err(DuetError::BadRequest(
                "relay.max_frame_bytes must be at least 256".into(),
            ));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:8081".into()
}
fn default_ping_interval_ms() -> u64 {
    20000
}
fn default_idle_timeout_ms() -> u64 {
    60000
}
fn default_outbound_queue() -> usize {
    256
}
fn default_max_frame_bytes() -> usize {
    65536
}
fn default_shutdown_grace_ms() -> u64 {
    5000
}

/// Per-connection inbound rate limit. `messages_per_sec: 0` disables it.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsSection {
    #[serde(default = "default_messages_per_sec")]
    pub messages_per_sec: u32,

    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            messages_per_sec: default_messages_per_sec(),
            burst: default_burst(),
        }
    }
}

impl LimitsSection {
    pub fn validate(&self) -> Result<()> {
        if self.messages_per_sec > 0 && self.burst == 0 {
            return Err(DuetError::BadRequest(
                "limits.burst must be positive when rate limiting is enabled".into(),
            ));
        }
        Ok(())
    }
}

fn default_messages_per_sec() -> u32 {
    50
}
fn default_burst() -> u32 {
    100
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoomsSection {
    #[serde(default = "default_true")]
    pub auto_join_creator: bool,
}

impl Default for RoomsSection {
    fn default() -> Self {
        Self {
            auto_join_creator: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatSection {
    /// Chat history ring size; 0 disables history.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    #[serde(default = "default_broadcast_queue")]
    pub broadcast_queue: usize,
}

impl Default for ChatSection {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            broadcast_queue: default_broadcast_queue(),
        }
    }
}

impl ChatSection {
    pub fn validate(&self) -> Result<()> {
        if self.broadcast_queue == 0 {
            return Err(DuetError::BadRequest(
                "chat.broadcast_queue must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn default_history_capacity() -> usize {
    1000
}
fn default_broadcast_queue() -> usize {
    1000
}

//! Relay config loader (strict parsing).

pub mod schema;

use std::fs;

use duet_core::error::{DuetError, Result};

pub use schema::{ChatSection, LimitsSection, RelayConfig, RelaySection, RoomsSection};

/// Config path resolution: first CLI argument, then `DUET_CONFIG`, then `duet.yaml`.
pub fn resolve_path() -> String {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("DUET_CONFIG").ok())
        .unwrap_or_else(|| "duet.yaml".to_string())
}

pub fn load_from_file(path: &str) -> Result<RelayConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| DuetError::Internal(format!("read config {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<RelayConfig> {
    let cfg: RelayConfig = serde_yaml::from_str(s)
        .map_err(|e| DuetError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

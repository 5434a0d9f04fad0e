use std::time::{Duration, Instant};

use crate::config::RelayConfig;

/// Decision from guard evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Pass,
    /// Drop the frame silently; the reason labels the drop metric.
    Drop(&'static str),
}

/// Per-connection guard. Owned by the connection's dispatcher loop, so no
/// locking is involved.
#[derive(Debug)]
pub struct InboundGuard {
    max_frame_bytes: usize,
    limiter: Option<TokenBucket>,
}

impl InboundGuard {
    pub fn new(max_frame_bytes: usize, messages_per_sec: u32, burst: u32) -> Self {
        let limiter = (messages_per_sec > 0).then(|| TokenBucket::new(messages_per_sec, burst));
        Self {
            max_frame_bytes,
            limiter,
        }
    }

    pub fn from_config(cfg: &RelayConfig) -> Self {
        Self::new(
            cfg.relay.max_frame_bytes,
            cfg.limits.messages_per_sec,
            cfg.limits.burst,
        )
    }

    pub fn check(&mut self, bytes_len: usize) -> GuardDecision {
        if bytes_len > self.max_frame_bytes {
            return GuardDecision::Drop("frame_too_large");
        }
        if let Some(lim) = &mut self.limiter {
            if !lim.allow() {
                return GuardDecision::Drop("rate_limited");
            }
        }
        GuardDecision::Pass
    }
}

#[derive(Debug)]
struct TokenBucket {
    rps: u32,
    capacity: u32,
    tokens: u32,
    last: Instant,
}

impl TokenBucket {
    fn new(rps: u32, burst: u32) -> Self {
        let rps = rps.max(1);
        let capacity = burst.max(1);
        Self {
            rps,
            capacity,
            tokens: capacity,
            last: Instant::now(),
        }
    }

    fn allow(&mut self) -> bool {
        self.refill();

        if self.tokens == 0 {
            return false;
        }
        self.tokens -= 1;
        true
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last);
        if elapsed < Duration::from_millis(50) {
            return;
        }

        let add = (elapsed.as_millis() as u64 * self.rps as u64 / 1000) as u32;
        if add > 0 {
            self.tokens = self.tokens.saturating_add(add).min(self.capacity);
            self.last = now;
        }
    }
}

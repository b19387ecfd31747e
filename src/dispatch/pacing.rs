//! Submission pacing
//!
//! Enforces a randomized minimum gap between the starts of successive
//! submissions within one dispatch.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Bounds of the randomized gap between submissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacingWindow {
    /// Lower bound in milliseconds
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    /// Upper bound in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_min_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    3000
}

impl PacingWindow {
    /// Create a window
    pub fn new(min_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            min_delay_ms,
            max_delay_ms,
        }
    }

    /// No gap between submissions
    pub fn disabled() -> Self {
        Self::new(0, 0)
    }

    /// Whether any gap is enforced
    pub fn is_enabled(&self) -> bool {
        self.max_delay_ms > 0
    }

    /// Largest gap this window can produce
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms.max(self.min_delay_ms))
    }
}

impl Default for PacingWindow {
    fn default() -> Self {
        Self::new(default_min_delay_ms(), default_max_delay_ms())
    }
}

/// Pacing state owned by a single dispatch
#[derive(Debug)]
pub struct Pacer {
    window: PacingWindow,
    rng: StdRng,
    last_start: Option<Instant>,
}

impl Pacer {
    /// Create a pacer seeded from entropy
    pub fn new(window: PacingWindow) -> Self {
        Self::from_rng(window, StdRng::from_entropy())
    }

    /// Create a pacer with a fixed seed
    pub fn with_seed(window: PacingWindow, seed: u64) -> Self {
        Self::from_rng(window, StdRng::seed_from_u64(seed))
    }

    fn from_rng(window: PacingWindow, rng: StdRng) -> Self {
        Self {
            window,
            rng,
            last_start: None,
        }
    }

    /// Draw the next gap
    pub fn next_delay(&mut self) -> Duration {
        if !self.window.is_enabled() {
            return Duration::ZERO;
        }
        let lo = self.window.min_delay_ms.min(self.window.max_delay_ms);
        let hi = self.window.min_delay_ms.max(self.window.max_delay_ms);
        Duration::from_millis(self.rng.gen_range(lo..=hi))
    }

    /// Wait until the next submission may start and mark it started
    ///
    /// The first call returns immediately. Returns the time spent waiting.
    pub async fn wait_turn(&mut self) -> Duration {
        let now = Instant::now();
        let mut waited = Duration::ZERO;

        if let Some(last) = self.last_start {
            let due = last + self.next_delay();
            if due > now {
                tokio::time::sleep_until(due).await;
                waited = due - now;
            }
        }

        self.last_start = Some(Instant::now());
        waited
    }
}

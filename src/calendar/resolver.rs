//! Symbol to calendar resolution

use std::collections::HashMap;

use super::{MarketCalendarProfile, SessionKind, DEFAULT_TIMEFRAME_MINUTES};

const CRYPTO_MARKERS: &[&str] = &["BTC", "ETH", "SOL", "BNB", "LTC", "XRP", "ADA", "DOGE"];
const EQUITY_MARKERS: &[&str] = &["AAPL", "MSFT", "NVDA", "TSLA", "AMZN", "GOOGL", "JPM", "V."];

/// Resolves the calendar profile for a unified symbol
///
/// Explicit per-instrument profiles win; otherwise the symbol name decides:
/// crypto runs 24x7 on a midnight grid, US equities on the regular session
/// with phase 150, everything else on the 24x5 forex grid with phase -120.
#[derive(Debug, Clone)]
pub struct CalendarResolver {
    overrides: HashMap<String, MarketCalendarProfile>,
    timeframe_minutes: i64,
}

impl CalendarResolver {
    /// Create a resolver with a default bar length
    pub fn new(timeframe_minutes: i64) -> Self {
        Self {
            overrides: HashMap::new(),
            timeframe_minutes,
        }
    }

    /// Register an explicit profile for a symbol
    pub fn with_profile(mut self, symbol: &str, profile: MarketCalendarProfile) -> Self {
        self.insert(symbol, profile);
        self
    }

    /// Register an explicit profile for a symbol
    pub fn insert(&mut self, symbol: &str, profile: MarketCalendarProfile) {
        self.overrides.insert(symbol.to_ascii_uppercase(), profile);
    }

    /// Profile for a symbol
    pub fn resolve(&self, symbol: &str) -> MarketCalendarProfile {
        let upper = symbol.to_ascii_uppercase();
        if let Some(profile) = self.overrides.get(&upper) {
            return *profile;
        }

        let session = Self::detect_session(&upper);
        let phase = match session {
            SessionKind::Continuous => 0,
            SessionKind::RegularHours => 150,
            SessionKind::ContinuousWeekday => -120,
        };
        MarketCalendarProfile::new(session, phase, self.timeframe_minutes)
    }

    fn detect_session(symbol: &str) -> SessionKind {
        if CRYPTO_MARKERS.iter().any(|m| symbol.contains(m)) {
            SessionKind::Continuous
        } else if EQUITY_MARKERS.iter().any(|m| symbol.contains(m)) {
            SessionKind::RegularHours
        } else {
            SessionKind::ContinuousWeekday
        }
    }
}

impl Default for CalendarResolver {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEFRAME_MINUTES)
    }
}

//! Market calendar profiles

use serde::{Deserialize, Serialize};

/// Default bar length (4h)
pub const DEFAULT_TIMEFRAME_MINUTES: i64 = 240;

/// Regular session open, minutes after UTC midnight (14:30)
pub const RTH_OPEN_MINUTE: u32 = 870;

/// Regular session close, minutes after UTC midnight (21:00)
pub const RTH_CLOSE_MINUTE: u32 = 1260;

/// Trading session model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// Always open (crypto)
    #[serde(alias = "24x7")]
    Continuous,
    /// Open around the clock, closed Friday 22:00 to Sunday 22:00 UTC (forex, metals, indices)
    #[serde(alias = "24x5")]
    ContinuousWeekday,
    /// Weekday cash session only (equities)
    #[serde(alias = "rth", alias = "RTH")]
    RegularHours,
}

/// Calendar used to partition time into bars for one instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketCalendarProfile {
    /// Session model
    pub session: SessionKind,
    /// Shift of the bar grid relative to UTC midnight
    pub phase_minutes: i64,
    /// Bar length
    pub timeframe_minutes: i64,
    /// Regular session open (minutes after UTC midnight)
    #[serde(default = "default_open_minute")]
    pub session_open_minute: u32,
    /// Regular session close (minutes after UTC midnight, inclusive)
    #[serde(default = "default_close_minute")]
    pub session_close_minute: u32,
}

fn default_open_minute() -> u32 {
    RTH_OPEN_MINUTE
}
fn default_close_minute() -> u32 {
    RTH_CLOSE_MINUTE
}

impl MarketCalendarProfile {
    /// Create a profile with the default regular session window
    pub fn new(session: SessionKind, phase_minutes: i64, timeframe_minutes: i64) -> Self {
        Self {
            session,
            phase_minutes,
            timeframe_minutes,
            session_open_minute: RTH_OPEN_MINUTE,
            session_close_minute: RTH_CLOSE_MINUTE,
        }
    }

    /// 24x7 grid anchored at UTC midnight
    pub fn continuous(timeframe_minutes: i64) -> Self {
        Self::new(SessionKind::Continuous, 0, timeframe_minutes)
    }

    /// 24x5 grid (forex convention: phase -120 puts 4h closes on 22:00 UTC)
    pub fn weekday(phase_minutes: i64, timeframe_minutes: i64) -> Self {
        Self::new(SessionKind::ContinuousWeekday, phase_minutes, timeframe_minutes)
    }

    /// Regular trading hours grid
    pub fn regular_hours(phase_minutes: i64, timeframe_minutes: i64) -> Self {
        Self::new(SessionKind::RegularHours, phase_minutes, timeframe_minutes)
    }

    /// Whether weekend time is excluded from bar counting
    pub fn excludes_weekends(&self) -> bool {
        !matches!(self.session, SessionKind::Continuous)
    }
}

impl Default for MarketCalendarProfile {
    fn default() -> Self {
        Self::weekday(-120, DEFAULT_TIMEFRAME_MINUTES)
    }
}

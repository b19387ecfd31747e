//! Market calendar module
//!
//! Bar grids, session models and candle-aligned expiry

mod aligner;
mod profile;
mod resolver;

pub use aligner::{CandleAligner, MAX_BAR_SCAN};
pub use profile::{
    MarketCalendarProfile, SessionKind, DEFAULT_TIMEFRAME_MINUTES, RTH_CLOSE_MINUTE,
    RTH_OPEN_MINUTE,
};
pub use resolver::CalendarResolver;

//! Bar alignment on a market calendar
//!
//! Reproduces the bar grid a charting platform draws for an instrument:
//! bars are `timeframe` long, anchored at the Unix epoch shifted by the
//! profile phase. Bars that lie entirely outside trading time do not count
//! towards order validity.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Timelike, Utc, Weekday};

use super::{MarketCalendarProfile, SessionKind};

/// Upper bound on bars walked when counting on a session calendar
pub const MAX_BAR_SCAN: i64 = 10_000;

/// Sunday reopen of a 24x5 calendar, minutes after UTC midnight (22:00)
const WEEKLY_OPEN_MINUTE: u32 = 1320;

/// Bar arithmetic for one calendar profile
#[derive(Debug, Clone, Copy)]
pub struct CandleAligner {
    profile: MarketCalendarProfile,
}

impl CandleAligner {
    /// Create an aligner for a profile
    pub fn new(profile: MarketCalendarProfile) -> Self {
        Self { profile }
    }

    fn bar_seconds(&self) -> i64 {
        self.profile.timeframe_minutes.max(1) * 60
    }

    fn phase_seconds(&self) -> i64 {
        self.profile.phase_minutes * 60
    }

    /// Index of the bar containing `instant`
    pub fn bar_index(&self, instant: DateTime<Utc>) -> i64 {
        (instant.timestamp() - self.phase_seconds()).div_euclid(self.bar_seconds())
    }

    /// Start instant of the bar with the given index
    pub fn start_of_bar(&self, index: i64) -> DateTime<Utc> {
        let offset = index * self.bar_seconds() + self.phase_seconds();
        DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(offset)
    }

    /// Start instant of the bar containing `instant`
    pub fn bar_start(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        self.start_of_bar(self.bar_index(instant))
    }

    /// Start instant of the bar after the one containing `instant`
    pub fn next_bar_start(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        self.start_of_bar(self.bar_index(instant) + 1)
    }

    /// Whether the market is open at `instant`
    pub fn is_trading_time(&self, instant: DateTime<Utc>) -> bool {
        let weekday = instant.weekday();
        let hour = instant.hour();

        match self.profile.session {
            SessionKind::Continuous => true,
            SessionKind::ContinuousWeekday => match weekday {
                Weekday::Fri => hour < 22,
                Weekday::Sat => false,
                Weekday::Sun => hour >= 22,
                _ => true,
            },
            SessionKind::RegularHours => {
                if matches!(weekday, Weekday::Sat | Weekday::Sun) {
                    return false;
                }
                let minute_of_day = hour * 60 + instant.minute();
                (self.profile.session_open_minute..=self.profile.session_close_minute)
                    .contains(&minute_of_day)
            }
        }
    }

    /// Whether the bar starting at `bar_start` counts towards validity
    ///
    /// A bar counts when any part of `[bar_start, bar_start + timeframe)` is
    /// trading time: either it starts inside a session or a session opens
    /// before it closes.
    pub fn is_counted_bar(&self, bar_start: DateTime<Utc>) -> bool {
        if self.is_trading_time(bar_start) {
            return true;
        }
        let bar_end = bar_start + Duration::seconds(self.bar_seconds());
        self.session_opens_between(bar_start, bar_end)
    }

    /// Whether a session opens strictly inside `(from, to)`
    fn session_opens_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        let open_minute = match self.profile.session {
            SessionKind::Continuous => return false,
            SessionKind::ContinuousWeekday => WEEKLY_OPEN_MINUTE,
            SessionKind::RegularHours => {
                if self.profile.session_open_minute > self.profile.session_close_minute {
                    return false;
                }
                self.profile.session_open_minute
            }
        };

        let mut day = from.date_naive();
        while day <= to.date_naive() {
            let opens_today = match self.profile.session {
                SessionKind::ContinuousWeekday => day.weekday() == Weekday::Sun,
                _ => !matches!(day.weekday(), Weekday::Sat | Weekday::Sun),
            };
            if opens_today {
                let open = day.and_time(NaiveTime::default()).and_utc()
                    + Duration::minutes(i64::from(open_minute));
                if from < open && open < to {
                    return true;
                }
            }
            let Some(next) = day.succ_opt() else {
                break;
            };
            day = next;
        }
        false
    }

    /// Whether some bar within one week of any instant is counted
    ///
    /// False only for calendars whose session can never be reached, such as a
    /// regular-hours window that closes before it opens.
    pub fn counts_bars_weekly(&self) -> bool {
        if !self.profile.excludes_weekends() {
            return true;
        }
        // Monday 1970-01-05
        let monday = DateTime::<Utc>::UNIX_EPOCH + Duration::days(4);
        let first = self.bar_index(monday);
        let last = self.bar_index(monday + Duration::days(7));
        (first..=last).any(|idx| self.is_counted_bar(self.start_of_bar(idx)))
    }

    /// Counted bars closed between `created` and `now`
    ///
    /// The bar containing `created` counts once it has closed.
    pub fn elapsed_bars(&self, created: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
        if now <= created {
            return 0;
        }

        let created_idx = self.bar_index(created);
        let now_idx = self.bar_index(now);

        if !self.profile.excludes_weekends() {
            return u32::try_from((now_idx - created_idx).max(0)).unwrap_or(u32::MAX);
        }

        let end_idx = now_idx.min(created_idx + MAX_BAR_SCAN);
        let counted = (created_idx..end_idx)
            .filter(|idx| self.is_counted_bar(self.start_of_bar(*idx)))
            .count();
        u32::try_from(counted).unwrap_or(u32::MAX)
    }

    /// Instant at which an order created at `created` reaches `validity_bars`
    pub fn expiry_instant(&self, created: DateTime<Utc>, validity_bars: u32) -> DateTime<Utc> {
        let created_idx = self.bar_index(created);

        if !self.profile.excludes_weekends() {
            return self.start_of_bar(created_idx + i64::from(validity_bars));
        }

        let mut idx = created_idx;
        let mut counted = 0u32;
        while counted < validity_bars && idx < created_idx + MAX_BAR_SCAN {
            if self.is_counted_bar(self.start_of_bar(idx)) {
                counted += 1;
            }
            idx += 1;
        }
        if counted < validity_bars {
            tracing::warn!(
                session = ?self.profile.session,
                timeframe = self.profile.timeframe_minutes,
                counted,
                validity_bars,
                "Bar scan limit reached before expiry"
            );
        }
        self.start_of_bar(idx)
    }
}

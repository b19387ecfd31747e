//! Configuration types for signal-fanout

use std::collections::{BTreeMap, HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use crate::calendar::{
    CalendarResolver, CandleAligner, MarketCalendarProfile, DEFAULT_TIMEFRAME_MINUTES,
};
use crate::dispatch::PacingWindow;
use crate::reconcile::ReconcilerConfig;
use crate::risk::{FilterThresholds, SizingBasis};
use crate::telemetry::LogFormat;
use crate::venue::InstrumentSpec;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub pacing: PacingWindow,
    #[serde(default)]
    pub filters: FilterThresholds,
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
    /// Instrument table keyed by unified symbol, uppercased on load
    #[serde(default, deserialize_with = "uppercase_symbols")]
    pub instruments: BTreeMap<String, InstrumentConfig>,
}

fn uppercase_symbols<'de, D>(deserializer: D) -> Result<BTreeMap<String, InstrumentConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, InstrumentConfig>::deserialize(deserializer)?;
    let mut instruments = BTreeMap::new();
    for (symbol, inst) in raw {
        let symbol = symbol.trim().to_ascii_uppercase();
        if instruments.insert(symbol.clone(), inst).is_some() {
            return Err(serde::de::Error::custom(format!(
                "instrument {symbol} is defined more than once"
            )));
        }
    }
    Ok(instruments)
}

/// Risk and validity defaults
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// Fraction of the sizing basis risked per signal (0.005 = 0.5%)
    #[serde(default = "default_risk_fraction")]
    pub risk_fraction: Decimal,

    /// Account value the risk fraction applies to
    #[serde(default)]
    pub sizing_basis: SizingBasis,

    /// Bar length used when an instrument has no explicit calendar
    #[serde(default = "default_timeframe_minutes")]
    pub timeframe_minutes: i64,

    /// Validity in bars when a signal carries no override
    #[serde(default = "default_validity_bars")]
    pub default_validity_bars: u32,
}

fn default_risk_fraction() -> Decimal {
    Decimal::new(5, 3) // 0.005 = 0.5%
}
fn default_timeframe_minutes() -> i64 {
    DEFAULT_TIMEFRAME_MINUTES
}
fn default_validity_bars() -> u32 {
    4
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            risk_fraction: default_risk_fraction(),
            sizing_basis: SizingBasis::Equity,
            timeframe_minutes: DEFAULT_TIMEFRAME_MINUTES,
            default_validity_bars: 4,
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Prometheus exporter port, disabled when absent
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Pretty,
            metrics_port: None,
        }
    }
}

/// One brokerage account
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    /// Account identifier
    pub id: String,
    /// Venue identifier the account lives on
    pub venue: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Venue enforces order expiry itself
    #[serde(default)]
    pub native_expiry: bool,
    /// Per-account override of `reconciler.exempt_native_expiry`
    #[serde(default)]
    pub exempt_native_expiry: Option<bool>,
    /// Starting state for paper venues
    #[serde(default)]
    pub paper: PaperAccountConfig,
}

/// Paper account starting state
#[derive(Debug, Clone, Deserialize)]
pub struct PaperAccountConfig {
    #[serde(default = "default_paper_equity")]
    pub equity: Decimal,
    #[serde(default)]
    pub used_margin: Decimal,
    #[serde(default)]
    pub daily_drawdown_pct: Decimal,
    #[serde(default)]
    pub open_positions: usize,
}

fn default_paper_equity() -> Decimal {
    Decimal::new(10_000, 0)
}

impl Default for PaperAccountConfig {
    fn default() -> Self {
        Self {
            equity: default_paper_equity(),
            used_margin: Decimal::ZERO,
            daily_drawdown_pct: Decimal::ZERO,
            open_positions: 0,
        }
    }
}

/// Instrument definition shared by every venue
#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentConfig {
    pub pip_size: Decimal,

    /// Fixed pip value per lot; computed from the quote currency when absent
    #[serde(default)]
    pub pip_value_per_lot: Option<Decimal>,

    #[serde(default)]
    pub quote_currency: Option<String>,

    #[serde(default = "default_min_lot")]
    pub min_lot: Decimal,

    #[serde(default = "default_max_lot")]
    pub max_lot: Decimal,

    #[serde(default = "default_lot_step")]
    pub lot_step: Decimal,

    #[serde(default = "default_contract_size")]
    pub contract_size: Decimal,

    /// Conversion pair override (default `USD{QUOTE}`)
    #[serde(default)]
    pub conversion_symbol: Option<String>,

    /// Explicit calendar; symbol heuristics apply when absent
    #[serde(default)]
    pub calendar: Option<MarketCalendarProfile>,

    /// Venue id to venue-native symbol; empty means every venue, same symbol
    #[serde(default)]
    pub venues: HashMap<String, String>,

    /// Quote used by paper venues
    #[serde(default)]
    pub paper_price: Option<Decimal>,
}

fn default_min_lot() -> Decimal {
    Decimal::new(1, 2) // 0.01
}
fn default_max_lot() -> Decimal {
    Decimal::new(100, 0)
}
fn default_lot_step() -> Decimal {
    Decimal::new(1, 2) // 0.01
}
fn default_contract_size() -> Decimal {
    Decimal::new(100_000, 0)
}
fn default_true() -> bool {
    true
}

const MINUTES_PER_DAY: u32 = 1440;

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check bounds and cross-references
    pub fn validate(&self) -> anyhow::Result<()> {
        let risk = self.general.risk_fraction;
        if risk <= Decimal::ZERO || risk > Decimal::ONE {
            anyhow::bail!("general.risk_fraction must be in (0, 1], got {risk}");
        }
        if self.general.timeframe_minutes <= 0 {
            anyhow::bail!("general.timeframe_minutes must be positive");
        }
        if self.pacing.min_delay_ms > self.pacing.max_delay_ms {
            anyhow::bail!(
                "pacing.min_delay_ms ({}) exceeds pacing.max_delay_ms ({})",
                self.pacing.min_delay_ms,
                self.pacing.max_delay_ms
            );
        }
        if self.reconciler.interval_secs == 0 {
            anyhow::bail!("reconciler.interval_secs must be positive");
        }

        let mut seen = HashSet::new();
        for account in &self.accounts {
            if !seen.insert(account.id.as_str()) {
                anyhow::bail!("duplicate account id {}", account.id);
            }
        }

        let calendars = self.calendar_resolver();
        for (symbol, inst) in &self.instruments {
            if inst.pip_size <= Decimal::ZERO {
                anyhow::bail!("instruments.{symbol}.pip_size must be positive");
            }
            if inst.lot_step <= Decimal::ZERO
                || inst.min_lot <= Decimal::ZERO
                || inst.min_lot > inst.max_lot
            {
                anyhow::bail!(
                    "instruments.{symbol}: invalid lots (min {}, max {}, step {})",
                    inst.min_lot,
                    inst.max_lot,
                    inst.lot_step
                );
            }
            if let Some(profile) = &inst.calendar {
                if profile.timeframe_minutes <= 0 {
                    anyhow::bail!("instruments.{symbol}.calendar.timeframe_minutes must be positive");
                }
                if profile.session_open_minute > MINUTES_PER_DAY
                    || profile.session_close_minute > MINUTES_PER_DAY
                {
                    anyhow::bail!("instruments.{symbol}.calendar: session minutes exceed one day");
                }
            }
            let profile = calendars.resolve(symbol);
            if !CandleAligner::new(profile).counts_bars_weekly() {
                anyhow::bail!(
                    "instruments.{symbol}: calendar {:?} ({} min bars) never counts a bar, \
                     orders would not expire",
                    profile.session,
                    profile.timeframe_minutes
                );
            }
        }

        Ok(())
    }

    /// Instrument spec for a symbol on a venue, `None` when not mapped there
    pub fn instrument_spec(&self, venue: &str, symbol: &str) -> Option<InstrumentSpec> {
        let symbol = symbol.to_ascii_uppercase();
        let inst = self.instruments.get(&symbol)?;

        let venue_symbol = if inst.venues.is_empty() {
            symbol.clone()
        } else {
            inst.venues.get(venue)?.clone()
        };

        Some(InstrumentSpec {
            symbol,
            venue_symbol,
            pip_size: inst.pip_size,
            pip_value_per_lot: inst.pip_value_per_lot,
            quote_currency: inst.quote_currency.as_ref().map(|q| q.to_ascii_uppercase()),
            min_lot: inst.min_lot,
            max_lot: inst.max_lot,
            lot_step: inst.lot_step,
            contract_size: inst.contract_size,
            conversion_symbol: inst.conversion_symbol.clone(),
        })
    }

    /// Resolver seeded with every explicit instrument calendar
    pub fn calendar_resolver(&self) -> CalendarResolver {
        let mut resolver = CalendarResolver::new(self.general.timeframe_minutes);
        for (symbol, inst) in &self.instruments {
            if let Some(profile) = inst.calendar {
                resolver.insert(symbol, profile);
            }
        }
        resolver
    }

    /// Calendar profile for a symbol
    pub fn calendar_for(&self, symbol: &str) -> MarketCalendarProfile {
        self.calendar_resolver().resolve(symbol)
    }

    /// Accounts with `enabled = true`
    pub fn enabled_accounts(&self) -> impl Iterator<Item = &AccountConfig> {
        self.accounts.iter().filter(|a| a.enabled)
    }
}

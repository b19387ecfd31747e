//! Paper venues built from configured accounts

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::Config;
use crate::telemetry::{self, GaugeMetric};
use crate::venue::{AccountBinding, PaperAccount, PaperVenue, VenueAdapter};

/// One paper venue per configured venue id, with account bindings in configured order
pub struct PaperFleet {
    /// Venues keyed by venue id
    pub venues: BTreeMap<String, Arc<PaperVenue>>,
    /// Bindings in configured order
    pub bindings: Vec<AccountBinding>,
}

impl PaperFleet {
    /// Build venues and bindings for every configured account
    pub fn from_config(config: &Config) -> Self {
        let mut builders: BTreeMap<String, PaperVenue> = BTreeMap::new();

        for account in &config.accounts {
            let venue = builders
                .remove(&account.venue)
                .unwrap_or_else(|| Self::new_venue(config, &account.venue));
            let native = venue.supports_native_expiry() || account.native_expiry;
            let paper = &account.paper;
            let venue = venue.with_native_expiry(native).with_account(
                PaperAccount::new(account.id.clone(), paper.equity)
                    .with_used_margin(paper.used_margin)
                    .with_drawdown(paper.daily_drawdown_pct)
                    .with_open_positions(paper.open_positions),
            );
            builders.insert(account.venue.clone(), venue);
        }

        let venues: BTreeMap<String, Arc<PaperVenue>> = builders
            .into_iter()
            .map(|(id, venue)| (id, Arc::new(venue)))
            .collect();

        let mut bindings = Vec::with_capacity(config.accounts.len());
        for account in &config.accounts {
            let Some(venue) = venues.get(&account.venue) else {
                continue;
            };
            let exempt = account
                .exempt_native_expiry
                .unwrap_or(config.reconciler.exempt_native_expiry);
            let venue: Arc<dyn VenueAdapter> = venue.clone();
            bindings.push(
                AccountBinding::new(account.id.clone(), venue)
                    .enabled(account.enabled)
                    .exempt_native_expiry(exempt),
            );
        }

        telemetry::set_gauge(
            GaugeMetric::EnabledAccounts,
            bindings.iter().filter(|b| b.enabled).count() as f64,
        );
        Self { venues, bindings }
    }

    fn new_venue(config: &Config, venue_id: &str) -> PaperVenue {
        let mut venue = PaperVenue::new(venue_id);
        for (symbol, inst) in &config.instruments {
            let Some(spec) = config.instrument_spec(venue_id, symbol) else {
                continue;
            };
            if let Some(price) = inst.paper_price {
                venue = venue.with_price(spec.venue_symbol.clone(), price);
            }
            venue = venue.with_instrument(spec);
        }
        venue
    }

    /// Venue serving an account
    pub fn venue_for(&self, account_id: &str) -> Option<Arc<PaperVenue>> {
        let config_venue = self
            .bindings
            .iter()
            .find(|b| b.account_id == account_id)?
            .venue_id()
            .to_string();
        self.venues.get(&config_venue).cloned()
    }
}

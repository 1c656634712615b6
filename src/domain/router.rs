//! Instrument to venue routing, built once per session.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::error::BotError;
use crate::ports::broker_port::BrokerPort;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VenueMode {
    /// Every instrument goes to the one named venue.
    Single(String),
    /// Orders must name their venue.
    Multi,
}

pub struct BrokerRouter {
    mode: VenueMode,
    venues: BTreeMap<String, Arc<dyn BrokerPort>>,
    routes: BTreeMap<String, Vec<Arc<dyn BrokerPort>>>,
}

impl BrokerRouter {
    /// Map each of `instruments` to the shared `venue`.
    pub fn single(name: &str, venue: Arc<dyn BrokerPort>, instruments: &[String]) -> Self {
        let routes = instruments
            .iter()
            .map(|instrument| (instrument.clone(), vec![Arc::clone(&venue)]))
            .collect();
        let mut venues = BTreeMap::new();
        venues.insert(name.to_string(), venue);
        Self {
            mode: VenueMode::Single(name.to_string()),
            venues,
            routes,
        }
    }

    /// Derive instrument routes from each venue's tradable instruments. Venues
    /// listing the same instrument are kept in `tradeable` iteration order.
    pub fn multi(
        venues: BTreeMap<String, Arc<dyn BrokerPort>>,
        tradeable: &BTreeMap<String, Vec<String>>,
    ) -> Result<Self, BotError> {
        if venues.is_empty() {
            return Err(BotError::config("multi-venue session has no venues"));
        }

        let mut routes: BTreeMap<String, Vec<Arc<dyn BrokerPort>>> = BTreeMap::new();
        for (venue_name, instruments) in tradeable {
            let venue = venues.get(venue_name).ok_or_else(|| {
                BotError::config(format!(
                    "tradable instruments listed for unknown venue '{venue_name}'"
                ))
            })?;
            for instrument in instruments {
                routes
                    .entry(instrument.clone())
                    .or_default()
                    .push(Arc::clone(venue));
            }
        }

        Ok(Self {
            mode: VenueMode::Multi,
            venues,
            routes,
        })
    }

    pub fn mode(&self) -> &VenueMode {
        &self.mode
    }

    pub fn is_multi_venue(&self) -> bool {
        self.mode == VenueMode::Multi
    }

    /// Venues trading `instrument`, in routing order. Never empty.
    pub fn resolve(&self, instrument: &str) -> Result<&[Arc<dyn BrokerPort>], BotError> {
        match self.routes.get(instrument) {
            Some(venues) if !venues.is_empty() => Ok(venues),
            _ => Err(BotError::config(format!(
                "no venue routes instrument '{instrument}'"
            ))),
        }
    }

    /// The exchange an order goes to: its own, or the sole venue of a
    /// single-venue session.
    pub fn resolve_exchange(&self, exchange: Option<&str>) -> Result<String, BotError> {
        match (exchange, &self.mode) {
            (Some(name), _) if !name.is_empty() => Ok(name.to_string()),
            (_, VenueMode::Single(name)) => Ok(name.clone()),
            (_, VenueMode::Multi) => Err(BotError::config(
                "the exchange an order is submitted to must be specified when \
                 trading across multiple venues",
            )),
        }
    }

    pub fn venue(&self, name: &str) -> Result<&Arc<dyn BrokerPort>, BotError> {
        self.venues
            .get(name)
            .ok_or_else(|| BotError::config(format!("unknown exchange '{name}'")))
    }

    pub fn venues(&self) -> impl Iterator<Item = (&str, &Arc<dyn BrokerPort>)> {
        self.venues.iter().map(|(name, venue)| (name.as_str(), venue))
    }

    /// Every (instrument, venue) pair.
    pub fn routes(&self) -> impl Iterator<Item = (&str, &Arc<dyn BrokerPort>)> {
        self.routes.iter().flat_map(|(instrument, venues)| {
            venues.iter().map(move |venue| (instrument.as_str(), venue))
        })
    }

    pub fn instruments(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }
}

//! The fixed set of places a player can be, and what it costs to go there.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::LocationConfig;
use crate::game::errors::GameError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub name: String,
    pub cost: u64,
}

/// Known locations in configuration order. Names are unique.
#[derive(Debug, Clone)]
pub struct WorldMap {
    locations: Vec<Location>,
}

impl WorldMap {
    pub fn from_config(entries: &[LocationConfig]) -> Result<Self, GameError> {
        if entries.is_empty() {
            return Err(GameError::InvalidInput(
                "world needs at least one location".to_string(),
            ));
        }
        let mut locations: Vec<Location> = Vec::with_capacity(entries.len());
        for entry in entries {
            let name = entry.name.trim();
            if name.is_empty() {
                return Err(GameError::InvalidInput("blank location name".to_string()));
            }
            if locations.iter().any(|l| l.name == name) {
                return Err(GameError::InvalidInput(format!(
                    "duplicate location: {}",
                    name
                )));
            }
            locations.push(Location {
                name: name.to_string(),
                cost: entry.cost,
            });
        }
        Ok(Self { locations })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.locations.iter().any(|l| l.name == name)
    }

    pub fn cost(&self, name: &str) -> Option<u64> {
        self.locations.iter().find(|l| l.name == name).map(|l| l.cost)
    }

    pub fn names(&self) -> Vec<String> {
        self.locations.iter().map(|l| l.name.clone()).collect()
    }

    pub fn travel_costs(&self) -> BTreeMap<String, u64> {
        self.locations
            .iter()
            .map(|l| (l.name.clone(), l.cost))
            .collect()
    }

    /// Uniformly random starting location.
    pub fn random_location<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        // from_config guarantees at least one entry
        self.locations
            .choose(rng)
            .map(|l| l.name.as_str())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

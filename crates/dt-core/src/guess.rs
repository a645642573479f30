//! Smart guessing: category inference from historical location behavior.
//!
//! A smart guess is a learned association between a place and a category.
//! Guesses are learned from user-set slots, used to categorize unknown slots
//! nearby, and struck when the user later contradicts them at that place.
//! Every mutation is keyed by slot start, so processing the same slots twice
//! leaves the guesses unchanged.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::slot::TemporaryTimeSlot;
use crate::types::{Category, Location};

/// Configuration for smart guessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuessConfig {
    /// Maximum distance in meters between a slot and a guess. Default: 200.
    pub radius_m: f64,

    /// A guess with this many strikes is no longer used. Default: 1.
    pub max_strikes: u32,

    /// Guesses not used for this many days are purged. Default: 30.
    pub max_age_days: i64,
}

impl Default for GuessConfig {
    fn default() -> Self {
        Self {
            radius_m: 200.0,
            max_strikes: 1,
            max_age_days: 30,
        }
    }
}

/// A learned location to category association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartGuess {
    pub id: String,
    /// Cluster centroid; its timestamp is when the guess was first learned.
    pub location: Location,
    pub category: Category,
    pub usage_count: u32,
    pub strikes: u32,
    /// Start of the slot whose correction last struck this guess.
    pub struck_at: Option<DateTime<Utc>>,
    /// Start of the latest slot this guess categorized or was confirmed by.
    pub last_used_at: DateTime<Utc>,
}

impl SmartGuess {
    /// Creates a guess first learned from a slot starting at `used_at`.
    pub fn learned(location: Location, category: Category, used_at: DateTime<Utc>) -> Self {
        Self {
            id: deterministic_guess_id(&location, category, used_at),
            location: Location {
                timestamp: used_at,
                ..location
            },
            category,
            usage_count: 1,
            strikes: 0,
            struck_at: None,
            last_used_at: used_at,
        }
    }

    pub const fn is_struck(&self) -> bool {
        self.strikes > 0
    }

    /// Whether the guess may still categorize slots.
    pub const fn is_usable(&self, config: &GuessConfig) -> bool {
        self.strikes < config.max_strikes
    }

    fn record_use(&mut self, slot_start: DateTime<Utc>) -> bool {
        if self.last_used_at >= slot_start {
            return false;
        }
        self.usage_count += 1;
        self.last_used_at = slot_start;
        true
    }

    /// Moves the centroid towards a confirming location, weighted by usage.
    fn absorb_location(&mut self, location: &Location) {
        let weight = f64::from(self.usage_count.max(1));
        self.location.latitude =
            self.location.latitude.mul_add(weight, location.latitude) / (weight + 1.0);
        self.location.longitude =
            self.location.longitude.mul_add(weight, location.longitude) / (weight + 1.0);
    }
}

/// Result of running the guesser over a slot sequence.
#[derive(Debug, Clone)]
pub struct GuessOutcome {
    pub slots: Vec<TemporaryTimeSlot>,
    /// Final state of every guess that was created or changed, ordered by ID.
    pub updated: Vec<SmartGuess>,
}

/// Categorizes unknown slots and learns from user-set ones.
///
/// `known` is the pool of stored guesses near the slots. Slots are visited in
/// order, and guesses learned from an earlier slot apply to later ones.
///
/// - A user-set slot with a location reinforces (or creates) the guess for its
///   category and strikes every nearby guess of another category that was in
///   use by then.
/// - An inferred `unknown` slot with a location takes the category of the best
///   usable guess: fewest strikes, then nearest, then most used.
/// - Everything else is left as is.
pub fn apply_guesses(
    mut slots: Vec<TemporaryTimeSlot>,
    known: Vec<SmartGuess>,
    config: &GuessConfig,
) -> GuessOutcome {
    let mut pool = known;
    let mut touched: BTreeSet<usize> = BTreeSet::new();

    for slot in &mut slots {
        let Some(location) = slot.location else {
            continue;
        };

        if slot.set_by_user {
            learn(&mut pool, &mut touched, slot, &location, config);
        } else if slot.category == Category::Unknown {
            if let Some(index) = best_match(&pool, &location, config) {
                slot.category = pool[index].category;
                if pool[index].record_use(slot.start) {
                    touched.insert(index);
                }
            }
        }
    }

    let mut updated: Vec<SmartGuess> = touched.into_iter().map(|i| pool[i].clone()).collect();
    updated.sort_by(|a, b| a.id.cmp(&b.id));

    tracing::debug!(updated = updated.len(), "applied smart guesses");
    GuessOutcome { slots, updated }
}

fn learn(
    pool: &mut Vec<SmartGuess>,
    touched: &mut BTreeSet<usize>,
    slot: &TemporaryTimeSlot,
    location: &Location,
    config: &GuessConfig,
) {
    let mut matched = false;

    for (index, guess) in pool.iter_mut().enumerate() {
        if guess.location.distance_m(location) > config.radius_m {
            continue;
        }
        if guess.category == slot.category {
            matched = true;
            if guess.last_used_at < slot.start {
                guess.absorb_location(location);
                guess.record_use(slot.start);
                touched.insert(index);
            }
        } else if guess.is_usable(config)
            && guess.last_used_at <= slot.start
            && guess.struck_at.is_none_or(|struck| struck < slot.start)
        {
            guess.strikes += 1;
            guess.struck_at = Some(slot.start);
            touched.insert(index);
            tracing::debug!(guess = %guess.id, strikes = guess.strikes, "struck smart guess");
        }
    }

    if !matched {
        pool.push(SmartGuess::learned(*location, slot.category, slot.start));
        touched.insert(pool.len() - 1);
    }
}

/// Picks the usable guess within the radius with the fewest strikes, then the
/// smallest distance, then the highest usage.
pub fn best_match(pool: &[SmartGuess], location: &Location, config: &GuessConfig) -> Option<usize> {
    pool.iter()
        .enumerate()
        .filter(|(_, g)| g.is_usable(config))
        .map(|(i, g)| (i, g, g.location.distance_m(location)))
        .filter(|(_, _, distance)| *distance <= config.radius_m)
        .min_by(|(_, a, da), (_, b, db)| {
            a.strikes
                .cmp(&b.strikes)
                .then_with(|| da.partial_cmp(db).unwrap_or(Ordering::Equal))
                .then_with(|| b.usage_count.cmp(&a.usage_count))
        })
        .map(|(i, _, _)| i)
}

fn deterministic_guess_id(location: &Location, category: Category, used_at: DateTime<Utc>) -> String {
    let content = format!(
        "guess|{category}|{:.5}|{:.5}|{}",
        location.latitude,
        location.longitude,
        used_at.timestamp_millis()
    );
    Uuid::new_v5(&Uuid::NAMESPACE_OID, content.as_bytes()).to_string()
}

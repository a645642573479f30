//! Core type definitions with validation.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The name did not match any variant of the enumeration.
    #[error("invalid {field}: {value}")]
    UnknownName { field: &'static str, value: String },

    /// A coordinate was outside the valid range.
    #[error("{field} must be between -{max} and {max}, got {value}")]
    CoordinateOutOfRange {
        field: &'static str,
        max: f64,
        value: f64,
    },

    /// A window or interval ended before it started.
    #[error("interval end {end} is before start {start}")]
    InvertedInterval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Generates a closed, string-backed enumeration with `as_str`, `Display`
/// and `FromStr` so the same names are used on disk, in config and in the CLI.
macro_rules! define_named_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// String representation for storage and display.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $text ),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok(Self::$variant), )+
                    _ => Err(ValidationError::UnknownName {
                        field: $field_name,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

define_named_enum!(
    /// The kind of activity a slot represents.
    Category, "category" {
        Commute => "commute",
        Food => "food",
        Friends => "friends",
        Work => "work",
        Leisure => "leisure",
        Family => "family",
        Fitness => "fitness",
        Hobby => "hobby",
        Household => "household",
        School => "school",
        Shopping => "shopping",
        Sleep => "sleep",
        /// Nothing is known about the activity yet.
        Unknown => "unknown",
    }
);

impl Default for Category {
    fn default() -> Self {
        Self::Unknown
    }
}

define_named_enum!(
    /// Activity type reported by the motion classifier.
    MotionType, "motion type" {
        Still => "still",
        Walk => "walk",
        Run => "run",
        Cycle => "cycle",
        Auto => "auto",
        Unknown => "unknown",
    }
);

impl MotionType {
    /// The category a stretch of this motion implies on its own.
    ///
    /// Being still says nothing about what the user is doing; that is left to
    /// the smart guesser.
    #[must_use]
    pub const fn implied_category(self) -> Category {
        match self {
            Self::Walk | Self::Cycle | Self::Auto => Category::Commute,
            Self::Run => Category::Fitness,
            Self::Still | Self::Unknown => Category::Unknown,
        }
    }
}

define_named_enum!(
    /// Classifier confidence for a motion sample.
    ConfidenceTier, "confidence" {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
);

impl ConfidenceTier {
    /// Whether samples at this tier are trusted by the segmenter.
    #[must_use]
    pub const fn qualifies(self) -> bool {
        matches!(self, Self::Medium | Self::High)
    }
}

define_named_enum!(
    /// An explicit user action from the tracking UI.
    TrackAction, "track action" {
        StartTracking => "start_tracking",
        SetCategory => "set_category",
        EditSlot => "edit_slot",
        StopTracking => "stop_tracking",
    }
);

impl TrackAction {
    /// Whether the action pins the category of the slot it opens.
    #[must_use]
    pub const fn sets_category(self) -> bool {
        !matches!(self, Self::StopTracking)
    }
}

/// Mean Earth radius used for great-circle distances.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A location fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// When the fix was taken.
    pub timestamp: DateTime<Utc>,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Horizontal accuracy radius in meters, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_m: Option<f64>,
}

impl Location {
    /// Creates a location after validating the coordinates.
    pub fn new(
        timestamp: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
    ) -> Result<Self, ValidationError> {
        if latitude.is_nan() || !(-90.0..=90.0).contains(&latitude) {
            return Err(ValidationError::CoordinateOutOfRange {
                field: "latitude",
                max: 90.0,
                value: latitude,
            });
        }
        if longitude.is_nan() || !(-180.0..=180.0).contains(&longitude) {
            return Err(ValidationError::CoordinateOutOfRange {
                field: "longitude",
                max: 180.0,
                value: longitude,
            });
        }
        Ok(Self {
            timestamp,
            latitude,
            longitude,
            accuracy_m: None,
        })
    }

    /// Returns a copy with the given accuracy.
    #[must_use]
    pub const fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy_m = Some(accuracy_m);
        self
    }

    /// Great-circle (haversine) distance in meters.
    pub fn distance_m(&self, other: &Self) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

/// A half-open processing window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    /// Creates a window, rejecting one that ends before it starts.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::InvertedInterval { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whether `instant` lies inside the window.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

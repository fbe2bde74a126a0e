//! Status vocabulary shared by the controller and the orchestrator
//!
//! `ChargeControllerStatus` is the controller's single output; the
//! `ChargerNativeStateMap` turns a brand's raw state token into one of the
//! logical buckets the classifier reasons about.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Overall status computed by the charge controller each tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChargeControllerStatus {
    Idle,
    Connected,
    Charging,
    Done,
    Stop,
    Disabled,
    Error,
    Start,
}

impl ChargeControllerStatus {
    /// Human-readable name used in logs and sensor values
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Connected => "Connected",
            Self::Charging => "Charging",
            Self::Done => "Done",
            Self::Stop => "Stop",
            Self::Disabled => "Disabled",
            Self::Error => "Error",
            Self::Start => "Start",
        }
    }
}

impl fmt::Display for ChargeControllerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical buckets a raw charger state token can fall into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargerStateBucket {
    Idle,
    Connected,
    Charging,
    Done,
}

/// Kind of charger the hub controls; selects the classification variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChargerType {
    /// Charger with its own native state entity
    #[default]
    Generic,
    /// Smart outlet: a switch plus a power meter, no native states
    Outlet,
    /// No controllable charger; the hub only advises
    NoCharger,
}

/// Raw state tokens recognised per bucket, supplied by the charger adapter.
///
/// Buckets are expected to be disjoint but this is not enforced. An empty
/// `Done` bucket means "done" has to be inferred from idle time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChargerNativeStateMap {
    pub idle: HashSet<String>,
    pub connected: HashSet<String>,
    pub charging: HashSet<String>,
    pub done: HashSet<String>,
}

impl ChargerNativeStateMap {
    /// Build a map from per-bucket token lists
    pub fn from_lists<S: AsRef<str>>(
        idle: &[S],
        connected: &[S],
        charging: &[S],
        done: &[S],
    ) -> Self {
        fn set<S: AsRef<str>>(tokens: &[S]) -> HashSet<String> {
            tokens.iter().map(|t| t.as_ref().to_string()).collect()
        }
        Self {
            idle: set(idle),
            connected: set(connected),
            charging: set(charging),
            done: set(done),
        }
    }

    /// Tokens registered for a bucket
    pub const fn tokens(&self, bucket: ChargerStateBucket) -> &HashSet<String> {
        match bucket {
            ChargerStateBucket::Idle => &self.idle,
            ChargerStateBucket::Connected => &self.connected,
            ChargerStateBucket::Charging => &self.charging,
            ChargerStateBucket::Done => &self.done,
        }
    }

    /// Whether `raw` is one of the tokens of `bucket`
    pub fn contains(&self, bucket: ChargerStateBucket, raw: &str) -> bool {
        self.tokens(bucket).contains(raw)
    }

    /// First bucket (in Idle, Connected, Charging, Done order) holding `raw`
    pub fn classify(&self, raw: &str) -> Option<ChargerStateBucket> {
        [
            ChargerStateBucket::Idle,
            ChargerStateBucket::Connected,
            ChargerStateBucket::Charging,
            ChargerStateBucket::Done,
        ]
        .into_iter()
        .find(|bucket| self.contains(*bucket, raw))
    }

    /// Count of tokens per bucket, for startup logging
    pub fn summary(&self) -> HashMap<ChargerStateBucket, usize> {
        [
            ChargerStateBucket::Idle,
            ChargerStateBucket::Connected,
            ChargerStateBucket::Charging,
            ChargerStateBucket::Done,
        ]
        .into_iter()
        .map(|bucket| (bucket, self.tokens(bucket).len()))
        .collect()
    }
}

//! Domain types for the pumping-station graph.
//!
//! Field names are the Dgraph predicate names (`<Type>.<field>`), so these
//! structs serialize directly into mutation payloads and deserialize
//! directly from query responses.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Number of hourly slots in an [`HourRate`].
pub const HOURS_PER_DAY: usize = 24;

/// A record type stored as a graph node.
///
/// Each implementor names its node type and the predicate holding its
/// caller-assigned logical id.
pub trait NodeEntity {
    /// Graph node type (`dgraph.type`).
    const NODE_TYPE: &'static str;
    /// Predicate carrying the logical id.
    const ID_FIELD: &'static str;

    fn logical_id(&self) -> &str;
}

/// Generate a fresh logical id of the form `<prefix>-<uuid>`.
pub fn new_logical_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

// ── Pumping Station ───────────────────────────────────────────────

/// A pumping station and its daily operating profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PumpingStation {
    /// Store-assigned node identifier, present on fetched entities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    #[serde(rename = "PumpingStation.id")]
    pub id: String,

    #[serde(rename = "PumpingStation.name", default)]
    pub name: String,

    #[serde(
        rename = "PumpingStation.profiles",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub profiles: Option<Vec<Profile>>,
}

impl PumpingStation {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uid: None,
            id: id.into(),
            name: name.into(),
            profiles: None,
        }
    }

    pub fn with_profiles(mut self, profiles: Vec<Profile>) -> Self {
        self.profiles = Some(profiles);
        self
    }
}

impl NodeEntity for PumpingStation {
    const NODE_TYPE: &'static str = "PumpingStation";
    const ID_FIELD: &'static str = "PumpingStation.id";

    fn logical_id(&self) -> &str {
        &self.id
    }
}

// ── Profile ───────────────────────────────────────────────────────

/// One day of flow, price and pump-action curves for a station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    #[serde(rename = "Profile.id")]
    pub id: String,

    #[serde(rename = "Profile.datestring")]
    pub date: NaiveDate,

    #[serde(
        rename = "Profile.flow_per_hour",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub flow_per_hour: Option<HourRate>,

    #[serde(
        rename = "Profile.price_per_hour",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub price_per_hour: Option<HourRate>,

    #[serde(
        rename = "Profile.action_per_hour",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub action_per_hour: Option<HourRate>,
}

impl Profile {
    pub fn new(id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            uid: None,
            id: id.into(),
            date,
            flow_per_hour: None,
            price_per_hour: None,
            action_per_hour: None,
        }
    }
}

impl NodeEntity for Profile {
    const NODE_TYPE: &'static str = "Profile";
    const ID_FIELD: &'static str = "Profile.id";

    fn logical_id(&self) -> &str {
        &self.id
    }
}

// ── Hour Rate ─────────────────────────────────────────────────────

/// Twenty-four hourly values stored as `HourRate.h0` … `HourRate.h23`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "HourRateFields", into = "HourRateFields")]
pub struct HourRate {
    pub uid: Option<String>,
    pub id: String,
    pub hours: [f32; HOURS_PER_DAY],
}

impl HourRate {
    pub fn new(id: impl Into<String>, hours: [f32; HOURS_PER_DAY]) -> Self {
        Self {
            uid: None,
            id: id.into(),
            hours,
        }
    }
}

impl NodeEntity for HourRate {
    const NODE_TYPE: &'static str = "HourRate";
    const ID_FIELD: &'static str = "HourRate.id";

    fn logical_id(&self) -> &str {
        &self.id
    }
}

type HourRateFields = BTreeMap<String, serde_json::Value>;

fn hour_key(hour: usize) -> String {
    format!("HourRate.h{hour}")
}

impl From<HourRate> for HourRateFields {
    fn from(rate: HourRate) -> Self {
        let mut fields = BTreeMap::new();
        if let Some(uid) = rate.uid {
            fields.insert("uid".to_string(), serde_json::Value::String(uid));
        }
        fields.insert(
            HourRate::ID_FIELD.to_string(),
            serde_json::Value::String(rate.id),
        );
        for (hour, value) in rate.hours.iter().enumerate() {
            fields.insert(hour_key(hour), serde_json::json!(value));
        }
        fields
    }
}

impl TryFrom<HourRateFields> for HourRate {
    type Error = CoreError;

    fn try_from(mut fields: HourRateFields) -> Result<Self, Self::Error> {
        let invalid = |reason: String| CoreError::InvalidEntity {
            entity: "HourRate".to_string(),
            reason,
        };

        let uid = match fields.remove("uid") {
            Some(serde_json::Value::String(s)) => Some(s),
            Some(other) => return Err(invalid(format!("uid must be a string, got {other}"))),
            None => None,
        };

        let id = match fields.remove(HourRate::ID_FIELD) {
            Some(serde_json::Value::String(s)) => s,
            Some(other) => {
                return Err(invalid(format!("{} must be a string, got {other}", HourRate::ID_FIELD)))
            }
            None => return Err(invalid(format!("missing {}", HourRate::ID_FIELD))),
        };

        let mut hours = [0.0f32; HOURS_PER_DAY];
        for (hour, slot) in hours.iter_mut().enumerate() {
            let key = hour_key(hour);
            *slot = fields
                .get(&key)
                .and_then(serde_json::Value::as_f64)
                .ok_or_else(|| invalid(format!("missing or non-numeric {key}")))?
                as f32;
        }

        Ok(Self { uid, id, hours })
    }
}

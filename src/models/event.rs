//! Event data models for ExhibitStream
//!
//! This module defines the three shapes an interaction event takes on its way
//! through the pipeline: the raw event decoded from a Kafka payload, the
//! validated event, and the normalized record handed to storage.

use std::fmt;

use chrono::{DateTime, FixedOffset, SubsecRound, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};

/// One key of a raw event
///
/// JSON `null` and an absent key are the same thing: `Missing`. A value of the
/// wrong JSON type is kept as `Mistyped` so rejections can name it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Field<T> {
    /// Key absent or null
    #[default]
    Missing,
    /// Key present with a value of the wrong JSON type
    Mistyped(Value),
    /// Key present with the expected JSON type
    Present(T),
}

impl<T: DeserializeOwned> Field<T> {
    /// Classify a JSON value
    pub fn from_value(value: Value) -> Self {
        if value.is_null() {
            return Field::Missing;
        }
        match T::deserialize(&value) {
            Ok(typed) => Field::Present(typed),
            Err(_) => Field::Mistyped(value),
        }
    }
}

impl<T> Field<T> {
    /// True when the key was absent or null
    pub fn is_missing(&self) -> bool {
        matches!(self, Field::Missing)
    }

    /// The typed value, if the key held one
    pub fn present(&self) -> Option<&T> {
        match self {
            Field::Present(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Field::Present(value)
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Field::from_value)
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Missing => serializer.serialize_none(),
            Field::Mistyped(value) => value.serialize(serializer),
            Field::Present(value) => value.serialize(serializer),
        }
    }
}

/// 2^63, the first whole number past `i64::MAX`
const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// A JSON integer of any width
///
/// Integers too wide for `i64` are still integers, so they fail range checks
/// rather than type checks. serde_json reads integer literals beyond `u64` as
/// floats; a whole float outside the `i64` range is taken to be one of those.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonInteger(Number);

impl JsonInteger {
    /// Accept a JSON number if it is an integer
    pub fn from_number(number: Number) -> Option<Self> {
        if number.is_i64() || number.is_u64() {
            return Some(Self(number));
        }

        match number.as_f64() {
            Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() >= I64_LIMIT => {
                Some(Self(number))
            },
            _ => None,
        }
    }

    /// The value, if it fits an `i64`
    pub fn as_i64(&self) -> Option<i64> {
        self.0.as_i64()
    }
}

impl From<i64> for JsonInteger {
    fn from(value: i64) -> Self {
        Self(Number::from(value))
    }
}

impl Serialize for JsonInteger {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for JsonInteger {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let number = Number::deserialize(deserializer)?;
        JsonInteger::from_number(number)
            .ok_or_else(|| serde::de::Error::custom("expected an integer"))
    }
}

/// Raw event as received from Kafka
///
/// Unknown keys are ignored. Nothing about the values is checked here beyond
/// their JSON type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawEvent {
    /// When the interaction was recorded (ISO-8601)
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub at: Field<String>,

    /// Exhibition site code
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub site: Field<String>,

    /// Rating value, or the request sentinel
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub val: Field<JsonInteger>,

    /// Request type, only on request events
    #[serde(rename = "type", default, skip_serializing_if = "Field::is_missing")]
    pub request_type: Field<JsonInteger>,
}

impl RawEvent {
    /// Decode a Kafka payload
    ///
    /// Returns `None` when the payload is not a JSON object. Malformed
    /// payloads are not errors: there is simply nothing to process.
    pub fn decode(payload: &[u8]) -> Option<Self> {
        let object: Map<String, Value> = serde_json::from_slice(payload).ok()?;
        Some(Self::from_map(object))
    }

    /// Build an event from an already parsed JSON object
    pub fn from_map(mut object: Map<String, Value>) -> Self {
        let mut take = |key: &str| object.remove(key).unwrap_or(Value::Null);
        Self {
            at: Field::from_value(take("at")),
            site: Field::from_value(take("site")),
            val: Field::from_value(take("val")),
            request_type: Field::from_value(take("type")),
        }
    }

    /// Set `at`
    pub fn with_at(mut self, at: impl Into<String>) -> Self {
        self.at = Field::Present(at.into());
        self
    }

    /// Set `site`
    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = Field::Present(site.into());
        self
    }

    /// Set `val`
    pub fn with_val(mut self, val: i64) -> Self {
        self.val = Field::Present(JsonInteger::from(val));
        self
    }

    /// Set `type`
    pub fn with_request_type(mut self, request_type: i64) -> Self {
        self.request_type = Field::Present(JsonInteger::from(request_type));
        self
    }
}

/// Renders the event as compact JSON, the form used in diagnostics
impl fmt::Display for RawEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// Decode a Kafka payload into a raw event
pub fn decode(payload: &[u8]) -> Option<RawEvent> {
    RawEvent::decode(payload)
}

/// An event that passed every field rule
///
/// Only the validator constructs one, so holding a `ValidatedEvent` is proof
/// that its fields are in-domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedEvent {
    occurred_at: DateTime<FixedOffset>,
    site: u16,
    value: i16,
    request_type: Option<i16>,
}

impl ValidatedEvent {
    pub(crate) fn new(
        occurred_at: DateTime<FixedOffset>,
        site: u16,
        value: i16,
        request_type: Option<i16>,
    ) -> Self {
        Self {
            occurred_at,
            site,
            value,
            request_type,
        }
    }

    /// Source timestamp with its original offset
    pub fn occurred_at(&self) -> DateTime<FixedOffset> {
        self.occurred_at
    }

    /// Exhibition site code
    pub fn site(&self) -> u16 {
        self.site
    }

    /// Rating value (the sentinel on request events)
    pub fn value(&self) -> i16 {
        self.value
    }

    /// Request type, if this is a request event
    pub fn request_type(&self) -> Option<i16> {
        self.request_type
    }

    /// Check if this event is an assistance request
    pub fn is_request(&self) -> bool {
        self.request_type.is_some()
    }
}

/// Which storage target a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    /// Visitor feedback
    Rating,
    /// Visitor asked for assistance
    Request,
}

impl InteractionKind {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Rating => "rating",
            InteractionKind::Request => "request",
        }
    }

    /// Table the records of this kind are stored in
    pub fn table(&self) -> &'static str {
        match self {
            InteractionKind::Rating => "rating_interaction",
            InteractionKind::Request => "request_interaction",
        }
    }

    /// Column holding the rating or request key
    pub fn id_column(&self) -> &'static str {
        match self {
            InteractionKind::Rating => "rating_id",
            InteractionKind::Request => "request_id",
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized rating ready for storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub exhibition_id: i32,
    pub rating_id: i32,
    pub recorded_at: DateTime<Utc>,
}

/// Normalized assistance request ready for storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub exhibition_id: i32,
    pub request_id: i32,
    pub recorded_at: DateTime<Utc>,
}

/// Storage-ready form of a validated event
///
/// All keys are shifted by one into the 1-indexed storage domain, and the
/// timestamp is UTC at whole-second precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizedRecord {
    Rating(RatingRecord),
    Request(RequestRecord),
}

impl NormalizedRecord {
    /// Storage target of this record
    pub fn kind(&self) -> InteractionKind {
        match self {
            NormalizedRecord::Rating(_) => InteractionKind::Rating,
            NormalizedRecord::Request(_) => InteractionKind::Request,
        }
    }

    /// Exhibition key
    pub fn exhibition_id(&self) -> i32 {
        match self {
            NormalizedRecord::Rating(r) => r.exhibition_id,
            NormalizedRecord::Request(r) => r.exhibition_id,
        }
    }

    /// Rating key or request key, depending on the variant
    pub fn type_id(&self) -> i32 {
        match self {
            NormalizedRecord::Rating(r) => r.rating_id,
            NormalizedRecord::Request(r) => r.request_id,
        }
    }

    /// Normalized timestamp
    pub fn recorded_at(&self) -> DateTime<Utc> {
        match self {
            NormalizedRecord::Rating(r) => r.recorded_at,
            NormalizedRecord::Request(r) => r.recorded_at,
        }
    }

    /// Timestamp in its storage text form, e.g. `2025-03-11 17:00:00+00`
    pub fn recorded_at_text(&self) -> String {
        format_storage_timestamp(self.recorded_at())
    }
}

/// Format a UTC timestamp the way the interaction tables store it
pub fn format_storage_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S+00").to_string()
}

impl From<ValidatedEvent> for NormalizedRecord {
    fn from(event: ValidatedEvent) -> Self {
        let recorded_at = event.occurred_at.with_timezone(&Utc).trunc_subsecs(0);
        let exhibition_id = i32::from(event.site) + 1;
        let rating_id = i32::from(event.value) + 1;

        match event.request_type.map(|t| i32::from(t) + 1) {
            Some(request_id) => NormalizedRecord::Request(RequestRecord {
                exhibition_id,
                request_id,
                recorded_at,
            }),
            None => NormalizedRecord::Rating(RatingRecord {
                exhibition_id,
                rating_id,
                recorded_at,
            }),
        }
    }
}

/// Turn a validated event into its storage form
pub fn normalize(event: ValidatedEvent) -> NormalizedRecord {
    NormalizedRecord::from(event)
}

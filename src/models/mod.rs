//! Data models for ExhibitStream
//!
//! This module contains the event validation and normalization engine: raw
//! event decoding, the floor's validation rules, field validators and the
//! storage-ready records an accepted event becomes.

pub mod error;
pub mod event;
pub mod rules;
pub mod validation;

// Re-export commonly used types
pub use error::{FieldResult, RejectionReason};
pub use event::{
    decode, format_storage_timestamp, normalize, Field, InteractionKind, JsonInteger,
    NormalizedRecord, RatingRecord, RawEvent, RequestRecord, ValidatedEvent,
};
pub use rules::{OpeningHours, ValidationRules};
pub use validation::{
    is_decimal_digits, parse_event_time, validate_exhibition, validate_rating, validate_request,
    validate_time, EventValidator,
};

//! Pure mapping from each upstream's raw record shapes into the canonical
//! entities in [`crate::model`].
//!
//! Ground rules shared by both source families:
//! - records missing required identifiers, finite geometry, or all of their
//!   timing are dropped, never emitted with placeholder values;
//! - `minutes_away` is floored at zero no matter how negative the upstream
//!   arithmetic came out;
//! - output ordering is deterministic: positions by vehicle id, predictions by
//!   arrival time ascending.

pub mod bustime;
pub mod realtime;
pub mod text;

pub use text::{TRANSLATION_SEPARATOR, clean_alert_text};

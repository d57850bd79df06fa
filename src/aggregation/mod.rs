//! Accumulation of per-location statistics.
//!
//! A [`KeyProjection`] picks which fields of a resolved location identify an
//! entry, for example binary and function, or function, file and line. The
//! [`AggregationTable`] then sums sample counts, time and energy per
//! [`AggregationKey`]. Display labels are built from the names behind a key
//! and sanitized for readability; they are never used for identity.

mod key;
mod label;
mod table;

pub use key::*;
pub use label::*;
pub use table::*;

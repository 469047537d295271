//! # Domain Models
//!
//! Canonical types every provider response is normalized into.
//!
//! ## Models
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Observation`] | One `(date, value)` point of a series |
//! | [`SeriesMetadata`] | Catalog entry describing a known series |
//!
//! Missing values are carried as `f64::NAN` rather than dropped, so a bad row
//! never shifts the positions of the rows around it.
//!
//! ## Dates
//!
//! Providers encode periods in several shapes. [`parse_period`] maps all of
//! them onto the first calendar day of the period:
//!
//! ```rust
//! use econfeed_core::domain::{format_date, parse_period};
//!
//! for raw in ["2023", "2023-01", "2023Q1", "2023M01", "2023-01-01"] {
//!     let date = parse_period(raw).expect("known period shape");
//!     assert_eq!(format_date(date), "2023-01-01");
//! }
//! ```

mod observation;
mod period;

pub use observation::{Observation, SeriesMetadata};
pub use period::{format_date, parse_date, parse_period, DATE_FORMAT};

//! Energy model.
//!
//! Resolves a declared chronotype (or a caller-supplied hour map) into a
//! 24-entry capacity curve used to bias slot scoring.

mod curve;

pub use curve::{EnergyCurve, EnergyProfile, FocusLevel};

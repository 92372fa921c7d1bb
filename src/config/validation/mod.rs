//! Configuration validation
//!
//! - `trait_def`: Core Validate trait definition
//! - `section_validators`: Validators for each configuration section
//! - `tests`: Test suite for all validators

mod section_validators;
mod trait_def;

pub use trait_def::Validate;

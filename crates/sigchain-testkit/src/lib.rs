//! # Sigchain Testkit
//!
//! Shared testing utilities:
//!
//! - [`fixtures`] - ready-made contexts and chain builders
//! - [`generators`] - proptest strategies for records and payloads
//! - [`vectors`] - golden canonical-encoding vectors

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{make_chain, make_record, TestFixture};

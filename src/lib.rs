//! Common functionality for osprey.
#![warn(missing_docs)]
pub mod build;
pub mod commands;
pub mod error;
pub mod id;
pub mod index;
pub mod log;
pub mod model;
pub mod output;
pub mod params;
pub mod phases;
pub mod run;
pub mod scenario;
pub mod sets;
pub mod settings;
pub mod solver;
pub mod store;

#[cfg(test)]
mod fixture;

//! Configuration for the departure engine.

mod settings;

pub use settings::*;

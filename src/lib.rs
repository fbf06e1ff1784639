//! Wiring between the loaded configuration and the flow runner.

pub mod setup;

pub use setup::*;

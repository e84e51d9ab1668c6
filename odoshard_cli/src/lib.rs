// odoshard_cli/src/lib.rs

// This prelude is for convenience for other files WITHIN the odoshard_cli crate.
pub mod prelude;

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod npy_store;
pub mod opencv;
pub mod scans;

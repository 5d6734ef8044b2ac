//! syncrclone library crate — re-exports the reconciliation engine, listing
//! model, agent driver, and dispatcher as a reusable API, mirroring the
//! lib-plus-bin split of the CLI binary (`src/main.rs`).

pub mod acquire;
pub mod agent;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod pathutil;
pub mod reconcile;
pub mod run;
pub mod side;
pub mod state;
pub mod telemetry;

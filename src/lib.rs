pub mod analysis;
pub mod analytics;
pub mod config;
pub mod control;
pub mod data;
pub mod disease;
pub mod dist;
pub mod engine;
pub mod error;
pub mod group;
pub mod ids;
pub mod matrix;
pub mod network;
pub mod notify;
pub mod person;
pub mod population;
pub mod relation;
pub mod sampling;
pub mod simulation;
pub mod stats;
pub mod utils;

#[cfg(test)]
mod testing;

pub use config::Scenario;
pub use control::Status;
pub use data::{EndReason, RunResults};
pub use notify::Notification;
pub use simulation::Simulation;

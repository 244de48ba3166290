pub mod api;
pub mod args;
pub mod commands;
mod config;
mod conflict;
mod decide;
mod error;
mod index;
mod locate;
mod mapper;
mod model;
mod utils;
mod week;

#[cfg(test)]
mod test;

pub use api::Mode;
pub use config::Config;
pub use decide::{Decide, InteractiveDecider, OverwritePolicy, PolicyDecider};
pub use error::Error;
pub use error::Result;
pub use model::{Cell, RunOutcome};
pub use week::WeekKey;

#![allow(clippy::too_many_arguments)]

#[macro_use]
extern crate common;

#[macro_use]
extern crate log as extern_log;

pub mod edit;
pub mod map;
pub mod spawn;
#[cfg(test)]
mod tests;
pub mod utils;

pub use edit::{CommitOutcome, EditError, EditSession, Provisional, SessionState, Tool};
pub use map::{TopologyError, TopologyGraph};
pub use utils::config::Config;

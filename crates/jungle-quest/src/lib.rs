//! A choose-your-own-adventure game narrated by a chat model.
//!
//! The crate bundles the built-in scenarios and the configuration loader,
//! and ships a terminal front-end. It can also be used as a library to
//! host the game in another front-end.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod config;
mod scenario;

pub use scenario::Scenario;

/// Re-exports of [`jungle_quest_core`] crate.
pub mod core {
    pub use jungle_quest_core::*;
}

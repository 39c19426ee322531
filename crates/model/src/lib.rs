//! An abstraction layer over chat-completion models.
//!
//! The game engine talks to a model only through the types defined here,
//! so a hosted API, a local server, or a scripted fake can drive the same
//! session without touching the engine.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;

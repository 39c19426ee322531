//! Core logic of the game: the conversation transcript, the turn loop,
//! and end-of-game detection.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod error;
pub mod marker;
mod model_client;
mod retry;
mod session;
pub mod transcript;

pub use error::Error;
pub use retry::RetryPolicy;
pub use session::{Session, SessionBuilder, Stage, TurnOutcome};
pub use transcript::{Role, Transcript, Turn};

mod builder;
mod state;

use tokio::sync::{mpsc, oneshot};

use crate::Error;
use crate::transcript::Transcript;
pub use builder::SessionBuilder;
pub use state::Stage;
use state::{Command, Snapshot};

/// One player's game.
///
/// The session owns the transcript and runs in its own task. Turns are
/// processed one at a time: while the model is answering, another
/// [`submit_turn`](Session::submit_turn) fails with [`Error::Busy`], and
/// once the story has ended every submission fails with [`Error::Ended`].
///
/// Handles are cheap to clone. The session stops when the last handle is
/// dropped.
#[derive(Clone)]
pub struct Session {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl Session {
    /// Plays one turn: records the player's text, sends the whole
    /// transcript to the model and records the reply.
    ///
    /// The text is passed to the model verbatim. If the request fails the
    /// player's turn is discarded, so the same text can be sent again.
    ///
    /// # Cancel safety
    ///
    /// Dropping the returned future does not cancel the turn, the reply is
    /// still recorded in the transcript.
    pub async fn submit_turn<S: Into<String>>(
        &self,
        input: S,
    ) -> Result<TurnOutcome, Error> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::SubmitTurn {
            input: input.into(),
            reply_tx,
        })?;
        reply_rx.await.map_err(|_| Error::SessionClosed)?
    }

    /// Returns a copy of the transcript.
    pub async fn transcript(&self) -> Result<Transcript, Error> {
        Ok(self.snapshot().await?.transcript)
    }

    /// Returns the current stage.
    pub async fn stage(&self) -> Result<Stage, Error> {
        Ok(self.snapshot().await?.stage)
    }

    /// Returns `true` once the model has ended the story.
    #[inline]
    pub async fn is_ended(&self) -> Result<bool, Error> {
        Ok(self.stage().await? == Stage::Ended)
    }

    async fn snapshot(&self) -> Result<Snapshot, Error> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx))?;
        rx.await.map_err(|_| Error::SessionClosed)
    }

    #[inline]
    fn send(&self, cmd: Command) -> Result<(), Error> {
        self.cmd_tx.send(cmd).map_err(|_| Error::SessionClosed)
    }
}

/// The result of a successful turn.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TurnOutcome {
    reply: String,
    closing: Option<String>,
}

impl TurnOutcome {
    /// Returns the model's reply.
    #[inline]
    pub fn reply(&self) -> &str {
        &self.reply
    }

    /// Returns the closing message if this turn ended the game.
    #[inline]
    pub fn closing(&self) -> Option<&str> {
        self.closing.as_deref()
    }

    /// Returns `true` if this turn ended the game.
    #[inline]
    pub fn is_game_over(&self) -> bool {
        self.closing.is_some()
    }

    /// Returns everything the player should see for this turn: the reply,
    /// followed by the closing message when the game is over.
    pub fn visible_text(&self) -> String {
        match &self.closing {
            Some(closing) => format!("{}\n\n{closing}", self.reply),
            None => self.reply.clone(),
        }
    }
}

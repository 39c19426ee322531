use std::fmt::{self, Debug};
use std::time::Duration;

use jungle_quest_model::ModelRequest;
use tokio::sync::{mpsc, oneshot};
use tokio::time;

use super::TurnOutcome;
use crate::Error;
use crate::marker::{GAME_OVER_MESSAGE, contains_end_marker};
use crate::model_client::{DeltaFn, ModelClient};
use crate::retry::RetryPolicy;
use crate::transcript::{Transcript, Turn};

/// Where a session is in the turn loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Waiting for the player.
    #[default]
    AwaitingInput,
    /// A turn has been sent to the model.
    ModelThinking,
    /// The model ended the story. Terminal.
    Ended,
}

type TurnReply = oneshot::Sender<Result<TurnOutcome, Error>>;

pub(crate) struct Snapshot {
    pub transcript: Transcript,
    pub stage: Stage,
}

pub(crate) enum Command {
    SubmitTurn { input: String, reply_tx: TurnReply },
    Snapshot(oneshot::Sender<Snapshot>),
    RequestFinished {
        result: Result<String, Error>,
        reply_tx: TurnReply,
    },
}

impl Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SubmitTurn { input, .. } => f
                .debug_struct("SubmitTurn")
                .field("input", input)
                .finish_non_exhaustive(),
            Command::Snapshot(_) => f.write_str("Snapshot"),
            Command::RequestFinished { result, .. } => f
                .debug_struct("RequestFinished")
                .field("result", result)
                .finish_non_exhaustive(),
        }
    }
}

pub(crate) struct SessionState {
    pub model_client: ModelClient,
    pub retry_policy: RetryPolicy,
    pub timeout: Option<Duration>,
    pub on_delta: Option<DeltaFn>,
    pub transcript: Transcript,
    pub stage: Stage,
}

impl SessionState {
    /// Records the player's turn and returns the request to send.
    pub fn begin_turn(&mut self, input: String) -> Result<ModelRequest, Error> {
        match self.stage {
            Stage::AwaitingInput => {}
            Stage::ModelThinking => return Err(Error::Busy),
            Stage::Ended => return Err(Error::Ended),
        }
        self.transcript.push(Turn::user(input));
        self.stage = Stage::ModelThinking;
        debug!("turn {} sent to the model", self.transcript.len());
        Ok(self.transcript.to_request())
    }

    /// Records the model's reply, or rolls back the player's turn if the
    /// request failed.
    pub fn complete_turn(
        &mut self,
        result: Result<String, Error>,
    ) -> Result<TurnOutcome, Error> {
        let reply = match result {
            Ok(reply) => reply,
            Err(err) => {
                self.transcript.pop_user_turn();
                self.stage = Stage::AwaitingInput;
                return Err(err);
            }
        };

        self.transcript.push(Turn::assistant(reply.clone()));
        let closing = if contains_end_marker(&reply) {
            debug!("end marker found, game over");
            self.transcript.push(Turn::assistant(GAME_OVER_MESSAGE));
            self.stage = Stage::Ended;
            Some(GAME_OVER_MESSAGE.to_owned())
        } else {
            self.stage = Stage::AwaitingInput;
            None
        };
        Ok(TurnOutcome { reply, closing })
    }

    fn handle_submit_turn(
        &mut self,
        input: String,
        reply_tx: TurnReply,
        cmd_tx: &mpsc::WeakUnboundedSender<Command>,
    ) {
        // The finished request reports back through the mailbox, which
        // needs a live sender for the whole request.
        let Some(cmd_tx) = cmd_tx.upgrade() else {
            reply_tx.send(Err(Error::SessionClosed)).ok();
            return;
        };
        let request = match self.begin_turn(input) {
            Ok(request) => request,
            Err(err) => {
                debug!("turn rejected: {err}");
                reply_tx.send(Err(err)).ok();
                return;
            }
        };

        let model_client = self.model_client.clone();
        let retry_policy = self.retry_policy.clone();
        let timeout = self.timeout;
        let on_delta = self.on_delta.clone();
        tokio::spawn(async move {
            let fut = retry_policy.send(&model_client, request, on_delta);
            let result = match timeout {
                Some(duration) => match time::timeout(duration, fut).await {
                    Ok(result) => result.map_err(Error::Model),
                    Err(_) => Err(Error::Timeout(duration)),
                },
                None => fut.await.map_err(Error::Model),
            };
            let result = result.map(|resp| resp.text);
            cmd_tx
                .send(Command::RequestFinished { result, reply_tx })
                .ok();
        });
    }
}

pub(crate) async fn run_session(
    mut state: SessionState,
    cmd_tx: mpsc::WeakUnboundedSender<Command>,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
) {
    debug!("started");
    while let Some(cmd) = cmd_rx.recv().await {
        trace!("received command: {cmd:?}");
        match cmd {
            Command::SubmitTurn { input, reply_tx } => {
                state.handle_submit_turn(input, reply_tx, &cmd_tx);
            }
            Command::Snapshot(tx) => {
                tx.send(Snapshot {
                    transcript: state.transcript.clone(),
                    stage: state.stage,
                })
                .ok();
            }
            Command::RequestFinished { result, reply_tx } => {
                let outcome = state.complete_turn(result);
                if let Err(err) = &outcome {
                    warn!("turn failed: {err}");
                }
                reply_tx.send(outcome).ok();
            }
        }
    }
    debug!("will terminate");
}

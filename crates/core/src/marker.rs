//! End-of-game detection.
//!
//! The system prompt asks the model to finish every ending, good or bad,
//! with the text "The End...". A reply containing that text in any letter
//! case ends the game. The ellipsis is part of the marker, so a plain
//! "The End" does not end the game.

/// The marker, in lower case.
pub const END_MARKER: &str = "the end...";

/// The closing message appended after the model ends the story.
pub const GAME_OVER_MESSAGE: &str = "Game Over! Refresh the page to play again.";

/// Returns `true` if `reply` contains the end marker, ignoring ASCII case.
#[inline]
pub fn contains_end_marker(reply: &str) -> bool {
    reply.to_ascii_lowercase().contains(END_MARKER)
}

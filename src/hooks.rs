//! Host-side collaborators the router calls into.
//!
//! The board UI and the chat/voice panel are outside this crate. They plug in
//! by implementing these traits; every method has a no-op default, so a host
//! only overrides what it actually renders.

use frames::GridState;
use serde_json::Value;
use tracing::debug;

/// Board rendering hooks.
pub trait BoardHooks: Send {
    /// Render a finished stroke drawn by another participant.
    fn draw_remote_stroke(&mut self, stroke: &Value) {
        debug!(?stroke, "no board hook for remote stroke");
    }

    /// Apply one opaque board operation.
    fn apply_patch(&mut self, patch: &Value) {
        debug!(?patch, "no board hook for patch");
    }

    /// Replace board state with an opaque snapshot.
    fn import_state(&mut self, state: &Value) {
        debug!(?state, "no board hook for state import");
    }

    /// Opaque board state for `publish_state`; `None` when the host keeps none.
    fn export_state(&mut self) -> Option<Value> {
        None
    }

    /// Clear the board before a patch-log snapshot is replayed.
    fn reset_board_for_snapshot(&mut self) {
        debug!("no board hook for snapshot reset");
    }

    /// Move a remote participant's cursor.
    fn update_remote_cursor(&mut self, cursor: &Value) {
        debug!(?cursor, "no board hook for remote cursor");
    }

    fn apply_grid_state(&mut self, grid: &GridState) {
        debug!(grid_size = grid.grid_size, kind = %grid.kind, "no board hook for grid state");
    }
}

/// Chat and voice handlers. Each receives the whole inbound message.
pub trait SignalHandler: Send {
    /// Chat lines, presence and audio mode changes.
    fn on_server_message(&mut self, message: &Value) {
        debug!(?message, "no signal handler for server message");
    }

    /// `call_signal`, `voice:ring`, `voice:end` and `voice:busy`.
    fn on_call_signal(&mut self, signal: &Value) {
        debug!(?signal, "no signal handler for call signal");
    }

    fn on_offer(&mut self, offer: &Value) {
        debug!(?offer, "no signal handler for offer");
    }

    fn on_answer(&mut self, answer: &Value) {
        debug!(?answer, "no signal handler for answer");
    }

    fn on_ice_candidate(&mut self, candidate: &Value) {
        debug!(?candidate, "no signal handler for ice candidate");
    }

    fn on_chat_read(&mut self, receipt: &Value) {
        debug!(?receipt, "no signal handler for chat read");
    }

    fn on_chat_read_state(&mut self, state: &Value) {
        debug!(?state, "no signal handler for chat read state");
    }
}

/// Board hooks that render nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl BoardHooks for NoopHooks {}

/// Signal handler that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSignals;

impl SignalHandler for NoopSignals {}

//! Hooks that print remote activity as JSON lines on stdout.

use aliboard::{BoardHooks, GridState, SignalHandler};
use serde_json::{Value, json};

/// Print one event line: `{"event": <name>, "data": <payload>}`.
pub fn emit(event: &str, data: &Value) {
    println!("{}", json!({ "event": event, "data": data }));
}

/// Board and signal hooks for a terminal participant.
#[derive(Debug, Default)]
pub struct PrintHooks;

impl BoardHooks for PrintHooks {
    fn draw_remote_stroke(&mut self, stroke: &Value) {
        emit("stroke", stroke);
    }

    fn apply_patch(&mut self, patch: &Value) {
        emit("patch", patch);
    }

    fn import_state(&mut self, state: &Value) {
        emit("state", state);
    }

    fn reset_board_for_snapshot(&mut self) {
        emit("reset", &Value::Null);
    }

    fn update_remote_cursor(&mut self, cursor: &Value) {
        emit("cursor", cursor);
    }

    fn apply_grid_state(&mut self, grid: &GridState) {
        emit("grid", &json!({ "gridSize": grid.grid_size, "kind": grid.kind }));
    }
}

impl SignalHandler for PrintHooks {
    fn on_server_message(&mut self, message: &Value) {
        emit("message", message);
    }

    fn on_call_signal(&mut self, signal: &Value) {
        emit("call", signal);
    }

    fn on_offer(&mut self, offer: &Value) {
        emit("offer", offer);
    }

    fn on_answer(&mut self, answer: &Value) {
        emit("answer", answer);
    }

    fn on_ice_candidate(&mut self, candidate: &Value) {
        emit("ice", candidate);
    }

    fn on_chat_read(&mut self, receipt: &Value) {
        emit("chat_read", receipt);
    }

    fn on_chat_read_state(&mut self, state: &Value) {
        emit("chat_read_state", state);
    }
}

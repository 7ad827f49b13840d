//! Inbound message routing.
//!
//! Every frame is decoded, checked for local echo, handed to the handler for
//! its kind, then delivered to listeners registered under its `type`. The
//! kind → handler table is an exhaustive match, so a new [`MessageKind`]
//! does not compile until it is routed.

use frames::{Frame, GridState, MessageKind, decode_frame};
use serde_json::Value;
use tracing::{debug, warn};

use crate::session::Session;

/// Outcome of [`Session::on_frame`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Routed to its handler and listeners.
    Dispatched(MessageKind),
    /// Relay of this session's own send; dropped.
    Echo,
    /// Not a JSON object; dropped.
    Malformed,
    /// Object without a known `type`; dropped.
    Unrecognized,
}

type Handler = fn(&mut Session, &Frame);

pub(crate) fn route(session: &mut Session, text: &str) -> Disposition {
    let frame = match decode_frame(text) {
        Ok(frame) => frame,
        Err(error) if error.is_malformed() => {
            warn!(error = %error, len = text.len(), "dropping malformed frame");
            return Disposition::Malformed;
        }
        Err(error) => {
            warn!(error = %error, "ignoring frame without recognized type");
            return Disposition::Unrecognized;
        }
    };

    if is_echo(session, &frame) {
        debug!(kind = %frame.kind, "dropping local echo");
        return Disposition::Echo;
    }

    handler(frame.kind)(session, &frame);
    session.listeners.emit(frame.kind.as_str(), &frame.to_value());
    Disposition::Dispatched(frame.kind)
}

/// A frame stamped with our client id, or a signal the server relayed back
/// with our own user id as `from_id`.
fn is_echo(session: &Session, frame: &Frame) -> bool {
    if frame.sender() == Some(session.client_id()) {
        return true;
    }
    if !frame.kind.is_signal() || frame.client_id.is_some() {
        return false;
    }
    match (&session.user().user_id, frame.get("from_id").and_then(id_string)) {
        (Some(me), Some(from)) => *me == from,
        _ => false,
    }
}

fn handler(kind: MessageKind) -> Handler {
    match kind {
        MessageKind::Snapshot => snapshot,
        MessageKind::SnapshotRequest => ignore,
        MessageKind::ElementAdd => element_add,
        MessageKind::ElementUpdate => element_update,
        MessageKind::ElementRemove => element_remove,
        MessageKind::Patch => patch,
        MessageKind::Stroke => stroke,
        MessageKind::Cursor => cursor,
        MessageKind::ChatMessage | MessageKind::PresenceUpdate | MessageKind::AudioMode => {
            server_message
        }
        MessageKind::ChatRead => chat_read,
        MessageKind::ChatReadState => chat_read_state,
        MessageKind::CallSignal
        | MessageKind::VoiceRing
        | MessageKind::VoiceEnd
        | MessageKind::VoiceBusy => call_signal,
        MessageKind::VoiceOffer | MessageKind::WebrtcOffer => offer,
        MessageKind::VoiceAnswer | MessageKind::WebrtcAnswer => answer,
        MessageKind::VoiceIce | MessageKind::WebrtcIceCandidate => ice_candidate,
        MessageKind::GridState => grid_state,
    }
}

// =============================================================================
// DOCUMENT
// =============================================================================

fn snapshot(session: &mut Session, frame: &Frame) {
    if let Some(elements) = frame.get("elements").and_then(Value::as_array) {
        session.store.apply_snapshot(elements);
    }

    if let Some(patches) = frame.get("patches").and_then(Value::as_array) {
        session.hooks.reset_board_for_snapshot();
        session.patch_log.clone_from(patches);
        for patch in patches {
            session.hooks.apply_patch(patch);
        }
        debug!(patches = patches.len(), "patch log replaced from snapshot");
    }

    if let Some(state) = frame.get("state").filter(|state| !state.is_null()) {
        session.hooks.import_state(state);
    }

    if let Some(grid) = frame.get("grid_state").and_then(Value::as_object) {
        apply_grid(session, &GridState::from_fields(grid));
    }
}

fn element_add(session: &mut Session, frame: &Frame) {
    match frame.get("element") {
        Some(element) => {
            session.store.apply_remote_add(element);
        }
        None => debug!("element_add without element"),
    }
}

fn element_update(session: &mut Session, frame: &Frame) {
    match frame.get("element") {
        Some(element) => {
            session.store.apply_remote_update(element);
        }
        None => debug!("element_update without element"),
    }
}

fn element_remove(session: &mut Session, frame: &Frame) {
    let id = frame
        .get("id")
        .and_then(id_string)
        .or_else(|| frame.get("element").and_then(|e| e.get("id")).and_then(id_string));
    match id {
        Some(id) => {
            session.store.apply_remote_remove(&id);
        }
        None => debug!("element_remove without id"),
    }
}

fn patch(session: &mut Session, frame: &Frame) {
    let Some(payload) = frame.get("payload").or_else(|| frame.get("patch")) else {
        debug!("patch without payload");
        return;
    };
    session.patch_log.push(payload.clone());
    session.hooks.apply_patch(payload);
}

fn grid_state(session: &mut Session, frame: &Frame) {
    apply_grid(session, &GridState::from_fields(&frame.data));
}

fn apply_grid(session: &mut Session, grid: &GridState) {
    if !session.grid_sync() {
        debug!(grid_size = grid.grid_size, "grid sync disabled; grid state ignored");
        return;
    }
    session.hooks.apply_grid_state(grid);
}

// =============================================================================
// PRESENCE
// =============================================================================

fn stroke(session: &mut Session, frame: &Frame) {
    if let Some(stroke) = frame.get("stroke") {
        session.hooks.draw_remote_stroke(stroke);
    }
}

fn cursor(session: &mut Session, frame: &Frame) {
    if let Some(cursor) = frame.get("cursor") {
        session.hooks.update_remote_cursor(cursor);
    }
}

fn ignore(_session: &mut Session, frame: &Frame) {
    debug!(kind = %frame.kind, "not handled by clients");
}

// =============================================================================
// CHAT & SIGNALING
// =============================================================================

fn server_message(session: &mut Session, frame: &Frame) {
    session.signals.on_server_message(&frame.to_value());
}

fn chat_read(session: &mut Session, frame: &Frame) {
    session.signals.on_chat_read(&frame.to_value());
}

fn chat_read_state(session: &mut Session, frame: &Frame) {
    session.signals.on_chat_read_state(&frame.to_value());
}

fn call_signal(session: &mut Session, frame: &Frame) {
    if let Some(message) = addressed(session, frame) {
        session.signals.on_call_signal(&message);
    }
}

fn offer(session: &mut Session, frame: &Frame) {
    if let Some(message) = addressed(session, frame) {
        session.signals.on_offer(&message);
    }
}

fn answer(session: &mut Session, frame: &Frame) {
    if let Some(message) = addressed(session, frame) {
        session.signals.on_answer(&message);
    }
}

fn ice_candidate(session: &mut Session, frame: &Frame) {
    if let Some(message) = addressed(session, frame) {
        session.signals.on_ice_candidate(&message);
    }
}

/// The full message, unless it carries a `to_id` naming another user.
fn addressed(session: &Session, frame: &Frame) -> Option<Value> {
    if let Some(to_id) = frame.get("to_id").and_then(id_string)
        && let Some(me) = &session.user().user_id
        && *me != to_id
    {
        debug!(kind = %frame.kind, %to_id, "signal addressed to another user");
        return None;
    }
    Some(frame.to_value())
}

/// Ids arrive as strings or numbers depending on the sender.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

#[cfg(test)]
#[path = "router_test.rs"]
mod router_test;

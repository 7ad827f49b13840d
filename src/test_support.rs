//! Recording doubles shared by the unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use frames::GridState;
use serde_json::Value;

use crate::config::{RealtimeConfig, RoomSources, UserIdentity};
use crate::hooks::{BoardHooks, SignalHandler};
use crate::session::Session;
use crate::transport::{Transport, TransportError};

pub(crate) const CLIENT_ID: &str = "me";
pub(crate) const USER_ID: &str = "7";

/// Config for room `r1`, client `me`, user `7`.
pub(crate) fn config() -> RealtimeConfig {
    RealtimeConfig {
        room: RoomSources {
            explicit: Some("r1".to_owned()),
            ..RoomSources::default()
        },
        client_id: Some(CLIENT_ID.to_owned()),
        user: UserIdentity {
            user_id: Some(USER_ID.to_owned()),
            ..UserIdentity::default()
        },
        ..RealtimeConfig::default()
    }
}

/// Closed session whose hooks and signal handler record into `calls`.
pub(crate) fn recording_session(config: &RealtimeConfig, calls: &Calls) -> Session {
    match Session::new(config) {
        Ok(session) => session
            .with_hooks(RecordingHooks::new(calls))
            .with_signals(RecordingHooks::new(calls)),
        Err(error) => panic!("test config must build a session: {error}"),
    }
}

/// Open `session` on a fresh recording wire.
pub(crate) fn open(session: &mut Session) -> Wire {
    let wire = Wire::default();
    session.connect();
    session.on_open(Box::new(wire.transport()));
    wire
}

/// Observer side of a [`RecordingTransport`].
#[derive(Clone, Debug, Default)]
pub(crate) struct Wire {
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl Wire {
    pub(crate) fn transport(&self) -> RecordingTransport {
        RecordingTransport {
            wire: self.clone(),
            limit: None,
        }
    }

    /// A transport that closes itself after accepting `limit` frames.
    pub(crate) fn transport_with_limit(&self, limit: usize) -> RecordingTransport {
        RecordingTransport {
            wire: self.clone(),
            limit: Some(limit),
        }
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub(crate) fn sent_values(&self) -> Vec<Value> {
        self.sent()
            .iter()
            .map(|text| serde_json::from_str(text).unwrap_or(Value::Null))
            .collect()
    }

    pub(crate) fn sent_types(&self) -> Vec<String> {
        self.sent_values()
            .iter()
            .map(|value| value["type"].as_str().unwrap_or_default().to_owned())
            .collect()
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub(crate) struct RecordingTransport {
    wire: Wire,
    limit: Option<usize>,
}

impl Transport for RecordingTransport {
    fn is_open(&self) -> bool {
        !self.wire.closed.load(Ordering::SeqCst)
    }

    fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        let mut sent = self.wire.sent.lock().unwrap_or_else(PoisonError::into_inner);
        sent.push(text.to_owned());
        if self.limit.is_some_and(|limit| sent.len() >= limit) {
            self.wire.close();
        }
        Ok(())
    }
}

/// Shared log of `(hook name, payload)` calls.
#[derive(Clone, Debug, Default)]
pub(crate) struct Calls(Arc<Mutex<Vec<(String, Value)>>>);

impl Calls {
    fn push(&self, name: &str, payload: Value) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name.to_owned(), payload));
    }

    pub(crate) fn all(&self) -> Vec<(String, Value)> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.all().into_iter().map(|(name, _)| name).collect()
    }

    pub(crate) fn named(&self, name: &str) -> Vec<Value> {
        self.all()
            .into_iter()
            .filter(|(call, _)| call == name)
            .map(|(_, payload)| payload)
            .collect()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
    }
}

/// Board hooks and signal handler that record every call.
pub(crate) struct RecordingHooks {
    pub(crate) calls: Calls,
    pub(crate) exported: Option<Value>,
}

impl RecordingHooks {
    pub(crate) fn new(calls: &Calls) -> Self {
        Self {
            calls: calls.clone(),
            exported: None,
        }
    }
}

impl BoardHooks for RecordingHooks {
    fn draw_remote_stroke(&mut self, stroke: &Value) {
        self.calls.push("draw_remote_stroke", stroke.clone());
    }

    fn apply_patch(&mut self, patch: &Value) {
        self.calls.push("apply_patch", patch.clone());
    }

    fn import_state(&mut self, state: &Value) {
        self.calls.push("import_state", state.clone());
    }

    fn export_state(&mut self) -> Option<Value> {
        self.calls.push("export_state", Value::Null);
        self.exported.clone()
    }

    fn reset_board_for_snapshot(&mut self) {
        self.calls.push("reset_board_for_snapshot", Value::Null);
    }

    fn update_remote_cursor(&mut self, cursor: &Value) {
        self.calls.push("update_remote_cursor", cursor.clone());
    }

    fn apply_grid_state(&mut self, grid: &GridState) {
        self.calls.push(
            "apply_grid_state",
            serde_json::to_value(grid).unwrap_or(Value::Null),
        );
    }
}

impl SignalHandler for RecordingHooks {
    fn on_server_message(&mut self, message: &Value) {
        self.calls.push("on_server_message", message.clone());
    }

    fn on_call_signal(&mut self, signal: &Value) {
        self.calls.push("on_call_signal", signal.clone());
    }

    fn on_offer(&mut self, offer: &Value) {
        self.calls.push("on_offer", offer.clone());
    }

    fn on_answer(&mut self, answer: &Value) {
        self.calls.push("on_answer", answer.clone());
    }

    fn on_ice_candidate(&mut self, candidate: &Value) {
        self.calls.push("on_ice_candidate", candidate.clone());
    }

    fn on_chat_read(&mut self, receipt: &Value) {
        self.calls.push("on_chat_read", receipt.clone());
    }

    fn on_chat_read_state(&mut self, state: &Value) {
        self.calls.push("on_chat_read_state", state.clone());
    }
}

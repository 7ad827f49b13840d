//! One realtime session: connection state, outbound path and local API.
//!
//! The session is a synchronous state machine. It never performs IO itself:
//! the driver in [`crate::connection`] feeds it socket events (`on_open`,
//! `on_frame`, `on_close`, `on_transport_error`) and acts on the reconnect
//! delays it returns. Each method call is one atomic step; nothing else can
//! touch the session in between.
//!
//! LIFECYCLE
//! =========
//! `Closed` → `connect()` → `Connecting` → `on_open()` → `Open` →
//! `on_close()`/`on_transport_error()` → `Closed` (reconnect scheduled).
//! Sends in any state other than `Open` land in the outbound queue and are
//! flushed, oldest first, by the next `on_open()`.

use std::fmt;
use std::time::{Duration, Instant};

use frames::{Element, Frame, GridState, MessageKind, encode_frame, frame_from_value};
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::config::{RealtimeConfig, UserIdentity, endpoint_url};
use crate::error::RealtimeError;
use crate::hooks::{BoardHooks, NoopHooks, NoopSignals, SignalHandler};
use crate::listeners::{CallbackResult, ListenerId, ListenerRegistry};
use crate::queue::OutboundQueue;
use crate::router::{self, Disposition};
use crate::store::{DocStore, SubscriptionId};
use crate::throttle::Throttle;
use crate::transport::Transport;

/// Listener event emitted after every successful open.
pub const EVENT_OPEN: &str = "open";
/// Listener event emitted after every close.
pub const EVENT_CLOSE: &str = "close";

const DEFAULT_VOICE_MODE: &str = "audio";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        })
    }
}

/// What happened to an outbound frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the open transport.
    Sent,
    /// Held in the outbound queue until the next open.
    Queued,
}

pub struct Session {
    room_id: String,
    client_id: String,
    endpoint: String,
    user: UserIdentity,
    grid_sync: bool,
    voice_mode: String,
    state: ConnectionState,
    transport: Option<Box<dyn Transport>>,
    backoff: Backoff,
    reconnect_pending: bool,
    queue: OutboundQueue,
    cursor_throttle: Throttle,
    pub(crate) store: DocStore,
    pub(crate) patch_log: Vec<Value>,
    pub(crate) listeners: ListenerRegistry,
    pub(crate) hooks: Box<dyn BoardHooks>,
    pub(crate) signals: Box<dyn SignalHandler>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("room_id", &self.room_id)
            .field("client_id", &self.client_id)
            .field("state", &self.state)
            .field("queued", &self.queue.len())
            .field("elements", &self.store.len())
            .field("patches", &self.patch_log.len())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Build a closed session from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::RoomUnresolved`] when no room id is available
    /// and [`RealtimeError::InvalidBaseUrl`] when the endpoint cannot be built.
    pub fn new(config: &RealtimeConfig) -> Result<Self, RealtimeError> {
        let room_id = config.room_id()?;
        let endpoint = endpoint_url(&config.base_url, &room_id)?;
        let backoff = Backoff::new(config.backoff.sanitized());
        Ok(Self {
            client_id: config.client_id_or_generate(),
            room_id,
            endpoint,
            user: config.user.clone(),
            grid_sync: config.grid_sync,
            voice_mode: DEFAULT_VOICE_MODE.to_owned(),
            state: ConnectionState::Closed,
            transport: None,
            backoff,
            reconnect_pending: false,
            queue: OutboundQueue::new(config.queue_capacity),
            cursor_throttle: Throttle::new(config.cursor_interval),
            store: DocStore::new(),
            patch_log: Vec::new(),
            listeners: ListenerRegistry::new(),
            hooks: Box::new(NoopHooks),
            signals: Box::new(NoopSignals),
        })
    }

    /// Install board hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: impl BoardHooks + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    /// Install a chat/voice signal handler.
    #[must_use]
    pub fn with_signals(mut self, signals: impl SignalHandler + 'static) -> Self {
        self.signals = Box::new(signals);
        self
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Room socket URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[must_use]
    pub fn user(&self) -> &UserIdentity {
        &self.user
    }

    #[must_use]
    pub fn grid_sync(&self) -> bool {
        self.grid_sync
    }

    /// Current audio/video mode carried on signals.
    #[must_use]
    pub fn voice_mode(&self) -> &str {
        &self.voice_mode
    }

    /// Frames waiting for the next open.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Whether a reconnect has been scheduled and not yet started.
    #[must_use]
    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    // =========================================================================
    // CONNECTION EVENTS
    // =========================================================================

    /// Begin a connection attempt. Clears any pending reconnect and returns
    /// the endpoint to dial.
    pub fn connect(&mut self) -> &str {
        self.reconnect_pending = false;
        self.state = ConnectionState::Connecting;
        info!(room_id = %self.room_id, endpoint = %self.endpoint, "connecting");
        &self.endpoint
    }

    /// The socket is open. Resets backoff, flushes the outbound queue, then
    /// notifies `open` listeners.
    pub fn on_open(&mut self, transport: Box<dyn Transport>) {
        self.state = ConnectionState::Open;
        self.reconnect_pending = false;
        self.backoff.reset();
        let transport = self.transport.insert(transport);
        let flushed = self.queue.flush(transport.as_mut());
        info!(
            room_id = %self.room_id,
            client_id = %self.client_id,
            flushed,
            queue_dropped = self.queue.dropped(),
            "connected"
        );

        let payload = json!({ "room_id": self.room_id, "client_id": self.client_id });
        self.listeners.emit(EVENT_OPEN, &payload);
    }

    /// The socket closed. Returns the reconnect delay, or `None` when a
    /// reconnect is already pending.
    pub fn on_close(&mut self, reason: &str) -> Option<Duration> {
        self.transport = None;
        self.state = ConnectionState::Closed;
        info!(room_id = %self.room_id, reason, queued = self.queue.len(), "disconnected");

        let payload = json!({ "room_id": self.room_id, "reason": reason });
        self.listeners.emit(EVENT_CLOSE, &payload);
        self.schedule_reconnect()
    }

    /// Connecting failed or the socket errored. Returns the reconnect delay,
    /// or `None` when a reconnect is already pending.
    pub fn on_transport_error(&mut self, error: &dyn fmt::Display) -> Option<Duration> {
        warn!(room_id = %self.room_id, error = %error, "transport error");
        self.transport = None;
        self.state = ConnectionState::Closed;
        self.schedule_reconnect()
    }

    /// The host closed the session on purpose. Unlike [`Self::on_close`] no
    /// reconnect is scheduled.
    pub fn on_shutdown(&mut self) {
        self.transport = None;
        self.state = ConnectionState::Closed;
        self.reconnect_pending = false;
        info!(room_id = %self.room_id, queued = self.queue.len(), "session shut down");

        let payload = json!({ "room_id": self.room_id, "reason": "shutdown" });
        self.listeners.emit(EVENT_CLOSE, &payload);
    }

    fn schedule_reconnect(&mut self) -> Option<Duration> {
        if self.reconnect_pending {
            debug!(room_id = %self.room_id, "reconnect already pending");
            return None;
        }
        self.reconnect_pending = true;
        let delay = self.backoff.next_delay();
        info!(
            room_id = %self.room_id,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "reconnect scheduled"
        );
        Some(delay)
    }

    /// Put frames a dead socket never wrote back at the head of the queue.
    pub fn requeue_unsent(&mut self, payloads: Vec<String>) {
        if payloads.is_empty() {
            return;
        }
        debug!(count = payloads.len(), "requeueing unsent frames");
        self.queue.requeue_front(payloads);
    }

    /// Handle one inbound text frame.
    pub fn on_frame(&mut self, text: &str) -> Disposition {
        router::route(self, text)
    }

    // =========================================================================
    // OUTBOUND
    // =========================================================================

    /// Stamp `clientId` and transmit, or queue while not open.
    pub fn send(&mut self, frame: Frame) -> Delivery {
        let frame = frame.with_client_id(self.client_id.clone());
        let kind = frame.kind;
        let payload = encode_frame(&frame);

        let Some(transport) = self.transport.as_mut().filter(|t| t.is_open()) else {
            debug!(%kind, "not connected; queueing frame");
            self.queue.enqueue(payload);
            return Delivery::Queued;
        };

        if !self.queue.is_empty() {
            self.queue.enqueue(payload);
            self.queue.flush(transport.as_mut());
            return if self.queue.is_empty() { Delivery::Sent } else { Delivery::Queued };
        }

        match transport.send_text(&payload) {
            Ok(()) => Delivery::Sent,
            Err(error) => {
                warn!(%kind, error = %error, "send failed; queueing frame");
                self.queue.enqueue(payload);
                Delivery::Queued
            }
        }
    }

    /// Send a raw JSON message. Returns `None` for anything that is not an
    /// object with a known `type`.
    pub fn send_value(&mut self, message: Value) -> Option<Delivery> {
        match frame_from_value(message) {
            Ok(frame) => Some(self.send(frame)),
            Err(error) => {
                warn!(error = %error, "rejected outbound message");
                None
            }
        }
    }

    // =========================================================================
    // LISTENERS & DOCUMENT
    // =========================================================================

    /// Register a listener for an event name (a message `type`, `open` or `close`).
    pub fn on<F>(&mut self, event: impl Into<String>, listener: F) -> ListenerId
    where
        F: FnMut(&Value) -> CallbackResult + Send + 'static,
    {
        self.listeners.on(event, listener)
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.listeners.off(id)
    }

    #[must_use]
    pub fn store(&self) -> &DocStore {
        &self.store
    }

    pub fn subscribe<F>(&mut self, subscriber: F) -> SubscriptionId
    where
        F: FnMut(&[Element]) -> CallbackResult + Send + 'static,
    {
        self.store.subscribe(subscriber)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.store.unsubscribe(id)
    }

    /// Apply a local edit to the store without broadcasting it.
    pub fn upsert_local(&mut self, element: Element) -> bool {
        self.store.upsert_local(element)
    }

    /// Apply a local delete to the store without broadcasting it.
    pub fn remove_local(&mut self, id: &str) -> bool {
        self.store.remove_local(id)
    }

    /// Every patch seen by this session, local and remote, in order.
    #[must_use]
    pub fn patch_log(&self) -> &[Value] {
        &self.patch_log
    }

    // =========================================================================
    // BOARD OPERATIONS
    // =========================================================================

    /// Store a new element locally and broadcast `element_add`.
    pub fn broadcast_element_add(&mut self, element: Element) -> bool {
        self.broadcast_element(MessageKind::ElementAdd, element)
    }

    /// Store a changed element locally and broadcast `element_update`.
    pub fn broadcast_element_update(&mut self, element: Element) -> bool {
        self.broadcast_element(MessageKind::ElementUpdate, element)
    }

    fn broadcast_element(&mut self, kind: MessageKind, element: Element) -> bool {
        let value = element.to_value();
        if !self.store.upsert_local(element) {
            return false;
        }
        self.send(Frame::new(kind).with_data("element", value));
        true
    }

    /// Delete an element locally and broadcast `element_remove`.
    pub fn broadcast_element_remove(&mut self, id: &str) -> bool {
        if id.is_empty() {
            warn!("element_remove needs an id");
            return false;
        }
        self.store.remove_local(id);
        self.send(Frame::new(MessageKind::ElementRemove).with_data("id", id));
        true
    }

    /// Append an opaque operation to the patch log and broadcast it.
    pub fn send_patch(&mut self, patch: Value) -> Delivery {
        self.patch_log.push(patch.clone());
        self.send(Frame::new(MessageKind::Patch).with_data("payload", patch))
    }

    /// Broadcast a finished stroke.
    pub fn send_stroke(&mut self, stroke: Value) -> Delivery {
        self.send(Frame::new(MessageKind::Stroke).with_data("stroke", stroke))
    }

    /// Ask the server to resend the room snapshot.
    pub fn request_snapshot(&mut self) -> Delivery {
        self.send(Frame::new(MessageKind::SnapshotRequest))
    }

    /// Broadcast this session's full state as a `snapshot`: every stored
    /// element plus the host's exported board state, if any.
    pub fn publish_state(&mut self) -> Delivery {
        let elements = self
            .store
            .get_elements_array()
            .iter()
            .map(Element::to_value)
            .collect::<Vec<_>>();
        let mut frame = Frame::new(MessageKind::Snapshot).with_data("elements", elements);
        if let Some(state) = self.hooks.export_state() {
            frame = frame.with_data("state", state);
        }
        self.send(frame)
    }

    /// Broadcast grid size and style. Refused while grid sync is disabled.
    pub fn send_grid_state(&mut self, grid: GridState) -> bool {
        if !self.grid_sync {
            debug!("grid sync disabled; not sending grid_state");
            return false;
        }
        self.send(grid.into_frame(Frame::new(MessageKind::GridState)));
        true
    }

    // =========================================================================
    // PRESENCE & CURSOR
    // =========================================================================

    /// Broadcast a cursor position, at most once per throttle window.
    ///
    /// `fields` override the default `label` and `color`; `id` is always this
    /// session's client id. Calls inside the window are dropped.
    pub fn send_cursor(&mut self, fields: Map<String, Value>) -> bool {
        self.send_cursor_at(fields, Instant::now())
    }

    /// [`Self::send_cursor`] at an explicit instant.
    pub fn send_cursor_at(&mut self, fields: Map<String, Value>, now: Instant) -> bool {
        if !self.cursor_throttle.try_acquire_at(now) {
            debug!("cursor throttled");
            return false;
        }
        let mut cursor = Map::new();
        cursor.insert("label".to_owned(), Value::String(self.user.label.clone()));
        cursor.insert("color".to_owned(), Value::String(self.user.color.clone()));
        cursor.extend(fields);
        cursor.insert("id".to_owned(), Value::String(self.client_id.clone()));

        self.send(Frame::new(MessageKind::Cursor).with_data("cursor", cursor));
        true
    }

    /// Announce this participant's status (e.g. `online`, `away`).
    pub fn send_presence(&mut self, status: &str) -> Delivery {
        let frame = Frame::new(MessageKind::PresenceUpdate)
            .with_data("user_id", self.user_id_value())
            .with_data("role", self.user.role.clone())
            .with_data("label", self.user.label.clone())
            .with_data("color", self.user.color.clone())
            .with_data("status", status);
        self.send(frame)
    }

    /// Switch audio/video mode; later signals carry the new mode.
    pub fn send_audio_mode(&mut self, mode: &str) -> bool {
        let mode = mode.trim();
        if mode.is_empty() {
            return false;
        }
        mode.clone_into(&mut self.voice_mode);
        let frame = self.signal_frame(MessageKind::AudioMode, None);
        self.send(frame);
        true
    }

    // =========================================================================
    // CHAT
    // =========================================================================

    /// Send a chat line. Surrounding whitespace is trimmed; empty text is dropped.
    pub fn send_chat_message(&mut self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        self.send(Frame::new(MessageKind::ChatMessage).with_data("text", text));
        true
    }

    /// Mark chat read up to `message_id`.
    pub fn send_chat_read(&mut self, message_id: impl Into<Value>) -> Delivery {
        let frame = Frame::new(MessageKind::ChatRead)
            .with_data("message_id", message_id)
            .with_data("user_id", self.user_id_value());
        self.send(frame)
    }

    // =========================================================================
    // CALL SIGNALING
    // =========================================================================

    /// Legacy `call_signal` with an `action` (`ring`, `end`, `accept`, ...).
    pub fn send_call_signal(&mut self, action: &str, to_id: Option<&str>) -> Delivery {
        let frame = self
            .signal_frame(MessageKind::CallSignal, to_id)
            .with_data("action", action);
        self.send(frame)
    }

    /// Ring: sent both as `voice:ring` and as legacy `call_signal`.
    pub fn voice_ring(&mut self, to_id: Option<&str>) {
        let frame = self.signal_frame(MessageKind::VoiceRing, to_id);
        self.send(frame);
        self.send_call_signal("ring", to_id);
    }

    /// Hang up: sent both as `voice:end` and as legacy `call_signal`.
    pub fn voice_end(&mut self, to_id: Option<&str>) {
        let frame = self.signal_frame(MessageKind::VoiceEnd, to_id);
        self.send(frame);
        self.send_call_signal("end", to_id);
    }

    pub fn voice_busy(&mut self, to_id: Option<&str>) -> Delivery {
        let frame = self.signal_frame(MessageKind::VoiceBusy, to_id);
        self.send(frame)
    }

    pub fn voice_offer(&mut self, sdp: Value, to_id: Option<&str>) -> Delivery {
        let frame = self.signal_frame(MessageKind::VoiceOffer, to_id).with_data("sdp", sdp);
        self.send(frame)
    }

    pub fn voice_answer(&mut self, sdp: Value, to_id: Option<&str>) -> Delivery {
        let frame = self.signal_frame(MessageKind::VoiceAnswer, to_id).with_data("sdp", sdp);
        self.send(frame)
    }

    pub fn voice_ice(&mut self, candidate: Value, to_id: Option<&str>) -> Delivery {
        let frame = self
            .signal_frame(MessageKind::VoiceIce, to_id)
            .with_data("candidate", candidate);
        self.send(frame)
    }

    /// Signal envelope: `room_id`, `from_id`, `from_role`, `mode`, optional `to_id`.
    fn signal_frame(&self, kind: MessageKind, to_id: Option<&str>) -> Frame {
        let frame = Frame::new(kind)
            .with_data("room_id", self.room_id.clone())
            .with_data("from_id", self.user_id_value())
            .with_data("from_role", self.user.role.clone())
            .with_data("mode", self.voice_mode.clone());
        match to_id {
            Some(to_id) => frame.with_data("to_id", to_id),
            None => frame,
        }
    }

    fn user_id_value(&self) -> Value {
        self.user
            .user_id
            .as_ref()
            .map_or(Value::Null, |id| Value::String(id.clone()))
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

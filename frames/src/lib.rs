//! Shared frame model and JSON codec for the Aliboard realtime wire.
//!
//! Every message on the room socket is a JSON text frame: a flat object with a
//! `type` tag, an optional `clientId` naming the sending session, and
//! type-specific fields. This crate owns that representation so the session
//! core and the CLI agree on field names. Payloads stay flexible
//! (`serde_json::Value`) because the server relays most of them verbatim.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Frame key carrying the message kind.
pub const FIELD_TYPE: &str = "type";

/// Frame key carrying the sender session id.
pub const FIELD_CLIENT_ID: &str = "clientId";

/// Older sender key still emitted by the first protocol revision.
pub const FIELD_SENDER_ID: &str = "sender_id";

/// Error returned by [`decode_frame`] and [`frame_from_value`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text is not valid JSON.
    #[error("failed to parse JSON frame: {0}")]
    Json(#[from] serde_json::Error),
    /// The JSON value is not an object.
    #[error("frame is not a JSON object")]
    NotAnObject,
    /// The object carries no string `type` field.
    #[error("frame has no `type` field")]
    MissingType,
    /// The `type` field names a kind this client does not know.
    #[error("unknown frame type: {0}")]
    UnknownType(String),
}

impl CodecError {
    /// True when the payload could not be read at all, as opposed to being a
    /// well-formed object with an unusable `type`.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Json(_) | Self::NotAnObject)
    }
}

/// Every message kind the room protocol carries, in either direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Full board state: element list, patch log, opaque state, grid.
    Snapshot,
    /// Client asks the server to resend the room snapshot.
    SnapshotRequest,
    /// One element created.
    ElementAdd,
    /// One element replaced.
    ElementUpdate,
    /// One element deleted by id.
    ElementRemove,
    /// Opaque board operation, appended to the patch log.
    Patch,
    /// Finished freehand stroke.
    Stroke,
    /// Ephemeral pointer position.
    Cursor,
    /// Chat line.
    ChatMessage,
    /// Chat read receipt.
    ChatRead,
    /// Server-side chat read bookkeeping.
    ChatReadState,
    /// Legacy call signal with an `action` field.
    CallSignal,
    /// Incoming call.
    VoiceRing,
    /// WebRTC SDP offer.
    VoiceOffer,
    /// WebRTC SDP answer.
    VoiceAnswer,
    /// WebRTC ICE candidate.
    VoiceIce,
    /// Call hung up.
    VoiceEnd,
    /// Callee already in a call.
    VoiceBusy,
    /// Server relay shape of an SDP offer.
    WebrtcOffer,
    /// Server relay shape of an SDP answer.
    WebrtcAnswer,
    /// Server relay shape of an ICE candidate.
    WebrtcIceCandidate,
    /// Participant presence change.
    PresenceUpdate,
    /// Audio/video mode switch.
    AudioMode,
    /// Background grid size and style.
    GridState,
}

impl MessageKind {
    /// All kinds, in wire-table order.
    pub const ALL: [Self; 24] = [
        Self::Snapshot,
        Self::SnapshotRequest,
        Self::ElementAdd,
        Self::ElementUpdate,
        Self::ElementRemove,
        Self::Patch,
        Self::Stroke,
        Self::Cursor,
        Self::ChatMessage,
        Self::ChatRead,
        Self::ChatReadState,
        Self::CallSignal,
        Self::VoiceRing,
        Self::VoiceOffer,
        Self::VoiceAnswer,
        Self::VoiceIce,
        Self::VoiceEnd,
        Self::VoiceBusy,
        Self::WebrtcOffer,
        Self::WebrtcAnswer,
        Self::WebrtcIceCandidate,
        Self::PresenceUpdate,
        Self::AudioMode,
        Self::GridState,
    ];

    /// The `type` string used on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::SnapshotRequest => "snapshot_request",
            Self::ElementAdd => "element_add",
            Self::ElementUpdate => "element_update",
            Self::ElementRemove => "element_remove",
            Self::Patch => "patch",
            Self::Stroke => "stroke",
            Self::Cursor => "cursor",
            Self::ChatMessage => "chat_message",
            Self::ChatRead => "chat_read",
            Self::ChatReadState => "chat_read_state",
            Self::CallSignal => "call_signal",
            Self::VoiceRing => "voice:ring",
            Self::VoiceOffer => "voice:offer",
            Self::VoiceAnswer => "voice:answer",
            Self::VoiceIce => "voice:ice",
            Self::VoiceEnd => "voice:end",
            Self::VoiceBusy => "voice:busy",
            Self::WebrtcOffer => "webrtc_offer",
            Self::WebrtcAnswer => "webrtc_answer",
            Self::WebrtcIceCandidate => "webrtc_ice_candidate",
            Self::PresenceUpdate => "presence:update",
            Self::AudioMode => "audio_mode",
            Self::GridState => "grid_state",
        }
    }

    /// Look up a kind by its wire string.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    /// Voice and call signaling kinds, relayed to the signal handler.
    #[must_use]
    pub fn is_signal(self) -> bool {
        matches!(
            self,
            Self::CallSignal
                | Self::VoiceRing
                | Self::VoiceOffer
                | Self::VoiceAnswer
                | Self::VoiceIce
                | Self::VoiceEnd
                | Self::VoiceBusy
                | Self::WebrtcOffer
                | Self::WebrtcAnswer
                | Self::WebrtcIceCandidate
        )
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message on the room socket.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Message kind (`type` on the wire).
    pub kind: MessageKind,
    /// Sending session (`clientId` on the wire), if stamped.
    pub client_id: Option<String>,
    /// Remaining top-level fields.
    pub data: Map<String, Value>,
}

impl Frame {
    /// Create an empty frame of the given kind.
    #[must_use]
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            client_id: None,
            data: Map::new(),
        }
    }

    /// Stamp the sending session id.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set one top-level field.
    #[must_use]
    pub fn with_data(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_owned(), value.into());
        self
    }

    /// Field lookup.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// String field lookup.
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Sender session id: `clientId`, or the older `sender_id`.
    #[must_use]
    pub fn sender(&self) -> Option<&str> {
        self.client_id
            .as_deref()
            .or_else(|| self.str_field(FIELD_SENDER_ID))
    }

    /// Full JSON object form, including `type` and `clientId`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = self.data.clone();
        map.insert(FIELD_TYPE.to_owned(), Value::String(self.kind.as_str().to_owned()));
        if let Some(client_id) = &self.client_id {
            map.insert(FIELD_CLIENT_ID.to_owned(), Value::String(client_id.clone()));
        }
        Value::Object(map)
    }
}

/// Encode a frame as JSON text.
#[must_use]
pub fn encode_frame(frame: &Frame) -> String {
    frame.to_value().to_string()
}

/// Decode JSON text into a frame.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for invalid JSON and the errors of
/// [`frame_from_value`] for objects that do not describe a known kind.
pub fn decode_frame(text: &str) -> Result<Frame, CodecError> {
    let value = serde_json::from_str::<Value>(text)?;
    frame_from_value(value)
}

/// Convert an already-parsed JSON value into a frame.
///
/// # Errors
///
/// Returns [`CodecError::NotAnObject`], [`CodecError::MissingType`] or
/// [`CodecError::UnknownType`].
pub fn frame_from_value(value: Value) -> Result<Frame, CodecError> {
    let Value::Object(mut data) = value else {
        return Err(CodecError::NotAnObject);
    };

    let kind = match data.remove(FIELD_TYPE) {
        Some(Value::String(name)) => MessageKind::parse(&name).ok_or(CodecError::UnknownType(name))?,
        _ => return Err(CodecError::MissingType),
    };

    let client_id = match data.remove(FIELD_CLIENT_ID) {
        Some(Value::String(id)) if !id.is_empty() => Some(id),
        _ => None,
    };

    Ok(Frame { kind, client_id, data })
}

/// Error for JSON that does not describe a valid [`Element`].
#[derive(Debug, thiserror::Error)]
#[error("element needs a non-empty `id` (string or number) and `type`")]
pub struct InvalidElement;

/// A board document node.
///
/// Identity is `id`; `type` names the node kind. Everything else (`pageIndex`,
/// geometry, kind-specific props) rides along in `fields` untouched. Serde goes
/// through [`Element::from_value`]/[`Element::to_value`], so deserializing
/// enforces the same rules as the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Element {
    /// Unique element id.
    pub id: String,
    /// Element kind (`type` on the wire).
    pub kind: String,
    /// Free-form remaining fields.
    pub fields: Map<String, Value>,
}

impl TryFrom<Value> for Element {
    type Error = InvalidElement;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(&value).ok_or(InvalidElement)
    }
}

impl From<Element> for Value {
    fn from(element: Element) -> Self {
        element.to_value()
    }
}

impl Element {
    /// Create an element with no extra fields.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    /// Set one extra field.
    #[must_use]
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_owned(), value.into());
        self
    }

    /// Parse an element from JSON, rejecting anything without a non-empty
    /// `id` and `type`. Numeric ids are accepted and kept in string form.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let id = match object.get("id")? {
            Value::String(id) if !id.is_empty() => id.clone(),
            Value::Number(id) => id.to_string(),
            _ => return None,
        };
        let kind = object
            .get(FIELD_TYPE)
            .and_then(Value::as_str)
            .filter(|kind| !kind.is_empty())?
            .to_owned();

        let fields = object
            .iter()
            .filter(|(key, _)| key.as_str() != "id" && key.as_str() != FIELD_TYPE)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Some(Self { id, kind, fields })
    }

    /// Whether the element satisfies the store invariant.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty() && !self.kind.is_empty()
    }

    /// Numeric field lookup (`x`, `y`, `w`, `h`, `pageIndex`, ...).
    #[must_use]
    pub fn number(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(Value::as_f64)
    }

    /// JSON object form.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = self.fields.clone();
        map.insert("id".to_owned(), Value::String(self.id.clone()));
        map.insert(FIELD_TYPE.to_owned(), Value::String(self.kind.clone()));
        Value::Object(map)
    }
}

/// Board background grid, synced through `grid_state`.
///
/// Serde reads and writes the same `gridSize`/`kind` object as
/// [`GridState::from_fields`], defaulting missing or mistyped fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct GridState {
    /// Cell size in board units; `0` hides the grid.
    pub grid_size: f64,
    /// Grid style, e.g. `"grid"` or `"dots"`.
    pub kind: String,
}

fn default_grid_kind() -> String {
    "grid".to_owned()
}

impl Default for GridState {
    fn default() -> Self {
        Self {
            grid_size: 0.0,
            kind: default_grid_kind(),
        }
    }
}

impl GridState {
    /// Read `gridSize`/`kind` from an object, defaulting missing fields.
    #[must_use]
    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        Self {
            grid_size: fields.get("gridSize").and_then(Value::as_f64).unwrap_or(0.0),
            kind: fields
                .get("kind")
                .and_then(Value::as_str)
                .map_or_else(default_grid_kind, str::to_owned),
        }
    }

    /// Write `gridSize`/`kind` into a frame.
    #[must_use]
    pub fn into_frame(self, mut frame: Frame) -> Frame {
        frame.data.extend(Map::from(self));
        frame
    }
}

impl From<Map<String, Value>> for GridState {
    fn from(fields: Map<String, Value>) -> Self {
        Self::from_fields(&fields)
    }
}

impl From<GridState> for Map<String, Value> {
    fn from(grid: GridState) -> Self {
        let mut fields = Map::new();
        fields.insert("gridSize".to_owned(), Value::from(grid.grid_size));
        fields.insert("kind".to_owned(), Value::String(grid.kind));
        fields
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;

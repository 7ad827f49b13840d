//! Session configuration: room resolution, identity, timing knobs.
//!
//! Everything can be loaded from `ALIBOARD_*` environment variables with
//! [`RealtimeConfig::from_env`]; unset or unparsable values fall back to the
//! defaults below. An empty string counts as unset.

use std::time::Duration;

use uuid::Uuid;

use crate::backoff::{BackoffPolicy, DEFAULT_FACTOR, DEFAULT_INITIAL_MS, DEFAULT_MAX_MS};
use crate::error::RealtimeError;
use crate::queue::DEFAULT_QUEUE_CAPACITY;
use crate::throttle::DEFAULT_CURSOR_INTERVAL_MS;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_ROOM_FALLBACK: &str = "local-test";
pub const DEFAULT_USER_ROLE: &str = "student";
pub const DEFAULT_USER_LABEL: &str = "Guest";
pub const DEFAULT_USER_COLOR: &str = "#2563eb";

/// Query-string keys checked, in order, for a room id in the page URL.
const ROOM_QUERY_KEYS: [&str; 2] = ["room_id", "room"];

// =============================================================================
// ROOM RESOLUTION
// =============================================================================

/// The places a room id can come from, highest priority first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoomSources {
    /// Explicit host configuration.
    pub explicit: Option<String>,
    /// `data-room-id` attribute value handed in by the host page.
    pub attribute: Option<String>,
    /// Page URL whose query string may carry `room_id` or `room`.
    pub page_url: Option<String>,
    /// Literal used when nothing else resolves.
    pub fallback: Option<String>,
}

impl RoomSources {
    /// First non-empty room id in priority order.
    #[must_use]
    pub fn resolve(&self) -> Option<String> {
        non_empty(self.explicit.as_deref())
            .or_else(|| non_empty(self.attribute.as_deref()))
            .or_else(|| self.page_url.as_deref().and_then(room_from_query))
            .or_else(|| non_empty(self.fallback.as_deref()))
            .map(str::to_owned)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Room id from a URL query string (`?room_id=..` or `?room=..`).
#[must_use]
pub fn room_from_query(url: &str) -> Option<&str> {
    let url = url.split_once('#').map_or(url, |(url, _)| url);
    let (_, query) = url.split_once('?')?;
    ROOM_QUERY_KEYS.iter().find_map(|wanted| {
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| key == wanted)
            .and_then(|(_, value)| non_empty(Some(value)))
    })
}

// =============================================================================
// ENDPOINT
// =============================================================================

/// Room socket URL: `{ws|wss}://{host}/ws/aliboard/{room}/`.
///
/// `https`/`wss` bases map to `wss`, `http`/`ws` to `ws`. Any path on the
/// base URL is ignored; only the host (and port) is kept.
///
/// # Errors
///
/// Returns [`RealtimeError::InvalidBaseUrl`] for other schemes or a missing host.
pub fn endpoint_url(base_url: &str, room_id: &str) -> Result<String, RealtimeError> {
    let (scheme, rest) = if let Some(rest) = base_url.strip_prefix("https://") {
        ("wss", rest)
    } else if let Some(rest) = base_url.strip_prefix("wss://") {
        ("wss", rest)
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        ("ws", rest)
    } else if let Some(rest) = base_url.strip_prefix("ws://") {
        ("ws", rest)
    } else {
        return Err(RealtimeError::InvalidBaseUrl(base_url.to_owned()));
    };

    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() {
        return Err(RealtimeError::InvalidBaseUrl(base_url.to_owned()));
    }
    Ok(format!("{scheme}://{host}/ws/aliboard/{room_id}/"))
}

// =============================================================================
// IDENTITY
// =============================================================================

/// Who this session speaks for in cursors and signals.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserIdentity {
    /// Account id; directed signals addressed to someone else are dropped.
    pub user_id: Option<String>,
    pub role: String,
    /// Cursor label.
    pub label: String,
    /// Cursor color.
    pub color: String,
}

impl Default for UserIdentity {
    fn default() -> Self {
        Self {
            user_id: None,
            role: DEFAULT_USER_ROLE.to_owned(),
            label: DEFAULT_USER_LABEL.to_owned(),
            color: DEFAULT_USER_COLOR.to_owned(),
        }
    }
}

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Clone, Debug)]
pub struct RealtimeConfig {
    /// HTTP(S) or WS(S) base URL of the board server.
    pub base_url: String,
    /// Room id sources.
    pub room: RoomSources,
    /// Session id stamped on outbound frames; generated when `None`.
    pub client_id: Option<String>,
    pub user: UserIdentity,
    /// Apply and send `grid_state`. Off by default.
    pub grid_sync: bool,
    /// Reconnect delay policy.
    pub backoff: BackoffPolicy,
    /// Minimum spacing between transmitted cursors.
    pub cursor_interval: Duration,
    /// Maximum frames held while disconnected.
    pub queue_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            room: RoomSources {
                fallback: Some(DEFAULT_ROOM_FALLBACK.to_owned()),
                ..RoomSources::default()
            },
            client_id: None,
            user: UserIdentity::default(),
            grid_sync: false,
            backoff: BackoffPolicy::default(),
            cursor_interval: Duration::from_millis(DEFAULT_CURSOR_INTERVAL_MS),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl RealtimeConfig {
    /// Load configuration from `ALIBOARD_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        let user = UserIdentity {
            user_id: env.string("ALIBOARD_USER_ID"),
            role: env.string_or("ALIBOARD_USER_ROLE", DEFAULT_USER_ROLE),
            label: env.string_or("ALIBOARD_USER_LABEL", DEFAULT_USER_LABEL),
            color: env.string_or("ALIBOARD_USER_COLOR", DEFAULT_USER_COLOR),
        };
        let backoff = BackoffPolicy {
            initial: Duration::from_millis(env.parse("ALIBOARD_RECONNECT_INITIAL_MS", DEFAULT_INITIAL_MS)),
            factor: env.parse("ALIBOARD_RECONNECT_FACTOR", DEFAULT_FACTOR),
            max: Duration::from_millis(env.parse("ALIBOARD_RECONNECT_MAX_MS", DEFAULT_MAX_MS)),
        }
        .sanitized();

        Self {
            base_url: env.string_or("ALIBOARD_BASE_URL", DEFAULT_BASE_URL),
            room: RoomSources {
                explicit: env.string("ALIBOARD_ROOM_ID"),
                attribute: env.string("ALIBOARD_ROOM_ATTR"),
                page_url: env.string("ALIBOARD_PAGE_URL"),
                fallback: Some(env.string_or("ALIBOARD_ROOM_FALLBACK", DEFAULT_ROOM_FALLBACK)),
            },
            client_id: env.string("ALIBOARD_CLIENT_ID"),
            user,
            grid_sync: env.flag("ALIBOARD_GRID_SYNC", false),
            backoff,
            cursor_interval: Duration::from_millis(
                env.parse("ALIBOARD_CURSOR_INTERVAL_MS", DEFAULT_CURSOR_INTERVAL_MS),
            ),
            queue_capacity: env.parse("ALIBOARD_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY),
        }
    }

    /// Resolved room id.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::RoomUnresolved`] when every source is empty.
    pub fn room_id(&self) -> Result<String, RealtimeError> {
        self.room.resolve().ok_or(RealtimeError::RoomUnresolved)
    }

    /// Configured client id, or a fresh UUID v4.
    #[must_use]
    pub fn client_id_or_generate(&self) -> String {
        self.client_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        self.string(key).unwrap_or_else(|| default.to_owned())
    }

    fn parse<T>(&self, key: &str, default: T) -> T
    where
        T: std::str::FromStr + Copy,
    {
        self.string(key)
            .and_then(|value| value.parse::<T>().ok())
            .unwrap_or(default)
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        match self.string(key).map(|value| value.to_ascii_lowercase()).as_deref() {
            Some("1" | "true" | "yes" | "on") => true,
            Some("0" | "false" | "no" | "off") => false,
            _ => default,
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use super::*;
use std::collections::HashMap;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map = pairs
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect::<HashMap<_, _>>();
    move |key| map.get(key).cloned()
}

fn sources(explicit: Option<&str>, attribute: Option<&str>, page_url: Option<&str>, fallback: Option<&str>) -> RoomSources {
    RoomSources {
        explicit: explicit.map(str::to_owned),
        attribute: attribute.map(str::to_owned),
        page_url: page_url.map(str::to_owned),
        fallback: fallback.map(str::to_owned),
    }
}

// =============================================================================
// room resolution
// =============================================================================

#[test]
fn explicit_room_wins() {
    let room = sources(Some("cfg"), Some("attr"), Some("/board?room_id=q"), Some("local-test"));
    assert_eq!(room.resolve().as_deref(), Some("cfg"));
}

#[test]
fn attribute_beats_query_and_fallback() {
    let room = sources(None, Some("attr"), Some("/board?room_id=q"), Some("local-test"));
    assert_eq!(room.resolve().as_deref(), Some("attr"));
}

#[test]
fn query_beats_fallback() {
    let room = sources(None, None, Some("https://x.test/board?room=q"), Some("local-test"));
    assert_eq!(room.resolve().as_deref(), Some("q"));
}

#[test]
fn empty_values_fall_through() {
    let room = sources(Some(""), Some("  "), Some("/board?room_id="), Some("demo"));
    assert_eq!(room.resolve().as_deref(), Some("demo"));
}

#[test]
fn nothing_resolves_to_none() {
    let room = sources(None, Some(""), Some("/board"), None);
    assert_eq!(room.resolve(), None);
}

#[test]
fn query_prefers_room_id_over_room() {
    assert_eq!(room_from_query("/b?room=second&room_id=first"), Some("first"));
    assert_eq!(room_from_query("/b?x=1&room=only#frag"), Some("only"));
    assert_eq!(room_from_query("/b?room_id=abc#room_id=zzz"), Some("abc"));
    assert_eq!(room_from_query("/b#?room=x"), None);
}

// =============================================================================
// endpoint
// =============================================================================

#[test]
fn endpoint_maps_http_schemes_to_ws() {
    assert_eq!(
        endpoint_url("http://127.0.0.1:8000", "r1").unwrap(),
        "ws://127.0.0.1:8000/ws/aliboard/r1/"
    );
    assert_eq!(
        endpoint_url("https://board.example.com", "r1").unwrap(),
        "wss://board.example.com/ws/aliboard/r1/"
    );
}

#[test]
fn endpoint_keeps_only_host() {
    assert_eq!(
        endpoint_url("https://board.example.com/panel/lesson?x=1", "abc").unwrap(),
        "wss://board.example.com/ws/aliboard/abc/"
    );
    assert_eq!(
        endpoint_url("ws://localhost:9000/", "abc").unwrap(),
        "ws://localhost:9000/ws/aliboard/abc/"
    );
}

#[test]
fn endpoint_rejects_unknown_scheme_or_missing_host() {
    assert!(matches!(
        endpoint_url("ftp://x", "r"),
        Err(RealtimeError::InvalidBaseUrl(_))
    ));
    assert!(matches!(
        endpoint_url("https:///path", "r"),
        Err(RealtimeError::InvalidBaseUrl(_))
    ));
}

// =============================================================================
// env loading
// =============================================================================

#[test]
fn defaults_when_environment_is_empty() {
    let config = RealtimeConfig::from_lookup(lookup(&[]));
    assert_eq!(config.base_url, DEFAULT_BASE_URL);
    assert_eq!(config.room_id().unwrap(), DEFAULT_ROOM_FALLBACK);
    assert_eq!(config.user, UserIdentity::default());
    assert!(!config.grid_sync);
    assert_eq!(config.backoff, BackoffPolicy::default());
    assert_eq!(config.cursor_interval, Duration::from_millis(80));
    assert_eq!(config.queue_capacity, 1000);
    assert!(config.client_id.is_none());
}

#[test]
fn environment_overrides_defaults() {
    let config = RealtimeConfig::from_lookup(lookup(&[
        ("ALIBOARD_BASE_URL", "https://board.example.com"),
        ("ALIBOARD_ROOM_ID", "lesson-7"),
        ("ALIBOARD_CLIENT_ID", "client-a"),
        ("ALIBOARD_USER_ID", "42"),
        ("ALIBOARD_USER_ROLE", "teacher"),
        ("ALIBOARD_USER_LABEL", "Ann"),
        ("ALIBOARD_USER_COLOR", "#ff0000"),
        ("ALIBOARD_GRID_SYNC", "true"),
        ("ALIBOARD_RECONNECT_INITIAL_MS", "250"),
        ("ALIBOARD_RECONNECT_FACTOR", "2"),
        ("ALIBOARD_RECONNECT_MAX_MS", "4000"),
        ("ALIBOARD_CURSOR_INTERVAL_MS", "40"),
        ("ALIBOARD_QUEUE_CAPACITY", "16"),
    ]));

    assert_eq!(config.room_id().unwrap(), "lesson-7");
    assert_eq!(config.client_id_or_generate(), "client-a");
    assert_eq!(config.user.user_id.as_deref(), Some("42"));
    assert_eq!(config.user.role, "teacher");
    assert_eq!(config.user.label, "Ann");
    assert_eq!(config.user.color, "#ff0000");
    assert!(config.grid_sync);
    assert_eq!(config.backoff.initial, Duration::from_millis(250));
    assert!((config.backoff.factor - 2.0).abs() < f64::EPSILON);
    assert_eq!(config.backoff.max, Duration::from_millis(4000));
    assert_eq!(config.cursor_interval, Duration::from_millis(40));
    assert_eq!(config.queue_capacity, 16);
}

#[test]
fn unparsable_and_empty_values_use_defaults() {
    let config = RealtimeConfig::from_lookup(lookup(&[
        ("ALIBOARD_RECONNECT_INITIAL_MS", "soon"),
        ("ALIBOARD_USER_LABEL", ""),
        ("ALIBOARD_GRID_SYNC", "maybe"),
        ("ALIBOARD_QUEUE_CAPACITY", "-3"),
    ]));
    assert_eq!(config.backoff.initial, Duration::from_millis(1000));
    assert_eq!(config.user.label, "Guest");
    assert!(!config.grid_sync);
    assert_eq!(config.queue_capacity, 1000);
}

#[test]
fn room_chain_reads_attribute_and_page_url() {
    let config = RealtimeConfig::from_lookup(lookup(&[
        ("ALIBOARD_PAGE_URL", "https://x.test/tablica?room_id=from-url"),
        ("ALIBOARD_ROOM_FALLBACK", "demo"),
    ]));
    assert_eq!(config.room_id().unwrap(), "from-url");

    let config = RealtimeConfig::from_lookup(lookup(&[
        ("ALIBOARD_ROOM_ATTR", "from-attr"),
        ("ALIBOARD_PAGE_URL", "https://x.test/tablica?room_id=from-url"),
    ]));
    assert_eq!(config.room_id().unwrap(), "from-attr");
}

#[test]
fn unresolved_room_is_an_error() {
    let config = RealtimeConfig {
        room: RoomSources::default(),
        ..RealtimeConfig::default()
    };
    assert!(matches!(config.room_id(), Err(RealtimeError::RoomUnresolved)));
}

#[test]
fn generated_client_ids_are_unique() {
    let config = RealtimeConfig::default();
    assert_ne!(config.client_id_or_generate(), config.client_id_or_generate());
}

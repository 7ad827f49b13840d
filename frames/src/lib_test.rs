use super::*;
use serde_json::json;

#[test]
fn kind_wire_names_are_unique() {
    let mut names = MessageKind::ALL.iter().map(|kind| kind.as_str()).collect::<Vec<_>>();
    names.sort_unstable();
    names.dedup();
    assert_eq!(names.len(), MessageKind::ALL.len());
}

#[test]
fn kind_parse_matches_as_str_for_every_kind() {
    for kind in MessageKind::ALL {
        assert_eq!(MessageKind::parse(kind.as_str()), Some(kind));
    }
}

#[test]
fn kind_parse_rejects_unknown_names() {
    assert_eq!(MessageKind::parse("board.update"), None);
    assert_eq!(MessageKind::parse(""), None);
    assert_eq!(MessageKind::parse("Snapshot"), None);
}

#[test]
fn kind_display_uses_wire_name() {
    assert_eq!(MessageKind::VoiceRing.to_string(), "voice:ring");
    assert_eq!(MessageKind::PresenceUpdate.to_string(), "presence:update");
}

#[test]
fn signal_kinds_cover_voice_and_legacy_relay() {
    assert!(MessageKind::CallSignal.is_signal());
    assert!(MessageKind::VoiceIce.is_signal());
    assert!(MessageKind::WebrtcAnswer.is_signal());
    assert!(!MessageKind::ChatMessage.is_signal());
    assert!(!MessageKind::Cursor.is_signal());
}

#[test]
fn decode_frame_splits_type_and_client_id_from_data() {
    let frame = decode_frame(r#"{"type":"element_add","clientId":"c-1","element":{"id":"a","type":"img"}}"#)
        .expect("frame should decode");
    assert_eq!(frame.kind, MessageKind::ElementAdd);
    assert_eq!(frame.client_id.as_deref(), Some("c-1"));
    assert!(frame.get("type").is_none());
    assert!(frame.get("clientId").is_none());
    assert_eq!(frame.get("element"), Some(&json!({"id":"a","type":"img"})));
}

#[test]
fn decode_frame_rejects_invalid_json() {
    let err = decode_frame("{not json").expect_err("should fail");
    assert!(matches!(err, CodecError::Json(_)));
    assert!(err.is_malformed());
}

#[test]
fn decode_frame_rejects_non_object() {
    let err = decode_frame("[1,2,3]").expect_err("should fail");
    assert!(matches!(err, CodecError::NotAnObject));
    assert!(err.is_malformed());
}

#[test]
fn decode_frame_rejects_missing_or_non_string_type() {
    assert!(matches!(decode_frame(r#"{"x":1}"#), Err(CodecError::MissingType)));
    assert!(matches!(decode_frame(r#"{"type":7}"#), Err(CodecError::MissingType)));
}

#[test]
fn decode_frame_reports_unknown_type_by_name() {
    let err = decode_frame(r#"{"type":"board.update","payload":{}}"#).expect_err("should fail");
    assert!(matches!(err, CodecError::UnknownType(ref name) if name == "board.update"));
    assert!(!err.is_malformed());
}

#[test]
fn decode_frame_treats_empty_or_null_client_id_as_absent() {
    let frame = decode_frame(r#"{"type":"cursor","clientId":""}"#).expect("decode");
    assert_eq!(frame.client_id, None);
    let frame = decode_frame(r#"{"type":"cursor","clientId":null}"#).expect("decode");
    assert_eq!(frame.client_id, None);
}

#[test]
fn encode_then_decode_preserves_frame() {
    let frame = Frame::new(MessageKind::Patch)
        .with_client_id("c-9")
        .with_data("payload", json!({"op":"move","dx":3}));
    let decoded = decode_frame(&encode_frame(&frame)).expect("decode");
    assert_eq!(decoded, frame);
}

#[test]
fn to_value_overrides_conflicting_type_in_data() {
    let mut frame = Frame::new(MessageKind::Stroke);
    frame.data.insert("type".to_owned(), json!("bogus"));
    assert_eq!(frame.to_value()["type"], json!("stroke"));
}

#[test]
fn sender_falls_back_to_legacy_sender_id() {
    let frame = decode_frame(r#"{"type":"patch","sender_id":"client-abc","payload":{}}"#).expect("decode");
    assert_eq!(frame.sender(), Some("client-abc"));

    let frame = frame.with_client_id("c-2");
    assert_eq!(frame.sender(), Some("c-2"));
}

#[test]
fn element_from_value_requires_id_and_type() {
    assert!(Element::from_value(&json!({"id":"a"})).is_none());
    assert!(Element::from_value(&json!({"type":"img"})).is_none());
    assert!(Element::from_value(&json!({"id":"","type":"img"})).is_none());
    assert!(Element::from_value(&json!({"id":"a","type":""})).is_none());
    assert!(Element::from_value(&json!({"id":null,"type":"img"})).is_none());
    assert!(Element::from_value(&json!("a")).is_none());
}

#[test]
fn element_from_value_keeps_extra_fields() {
    let element = Element::from_value(&json!({"id":"e1","type":"note","x":10,"pageIndex":2}))
        .expect("valid element");
    assert_eq!(element.id, "e1");
    assert_eq!(element.kind, "note");
    assert_eq!(element.number("x"), Some(10.0));
    assert_eq!(element.number("pageIndex"), Some(2.0));
    assert!(!element.fields.contains_key("id"));
    assert!(!element.fields.contains_key("type"));
}

#[test]
fn element_from_value_accepts_numeric_id() {
    let element = Element::from_value(&json!({"id":42,"type":"img"})).expect("valid element");
    assert_eq!(element.id, "42");
}

#[test]
fn element_serde_flattens_fields_and_renames_type() {
    let element = Element::new("e1", "img").with_field("w", 200);
    let value = serde_json::to_value(&element).expect("serialize");
    assert_eq!(value, json!({"id":"e1","type":"img","w":200}));
    assert_eq!(element.to_value(), value);

    let back: Element = serde_json::from_value(value).expect("deserialize");
    assert_eq!(back, element);
}

#[test]
fn element_deserialize_applies_store_rules() {
    assert!(serde_json::from_value::<Element>(json!({"id":"","type":""})).is_err());
    assert!(serde_json::from_value::<Element>(json!({"id":"a"})).is_err());
    assert!(serde_json::from_str::<Element>("[1]").is_err());

    let element = serde_json::from_value::<Element>(json!({"id":5,"type":"note"})).expect("numeric id");
    assert_eq!(element.id, "5");
    assert_eq!(Element::from_value(&json!({"id":5,"type":"note"})), Some(element));
}

#[test]
fn grid_state_serde_matches_wire_fields() {
    let grid: GridState = serde_json::from_value(json!({"gridSize": "big"})).expect("lenient");
    assert_eq!(grid, GridState::default());

    let grid = GridState {
        grid_size: 24.0,
        kind: "dots".to_owned(),
    };
    assert_eq!(serde_json::to_value(&grid).expect("serialize"), json!({"gridSize": 24.0, "kind": "dots"}));
}

#[test]
fn grid_state_from_fields_defaults_missing_values() {
    let grid = GridState::from_fields(&Map::new());
    assert_eq!(grid, GridState::default());
    assert_eq!(grid.kind, "grid");

    let fields = json!({"gridSize": 40, "kind": "dots"});
    let grid = GridState::from_fields(fields.as_object().expect("object"));
    assert!((grid.grid_size - 40.0).abs() < f64::EPSILON);
    assert_eq!(grid.kind, "dots");
}

#[test]
fn grid_state_into_frame_writes_wire_keys() {
    let grid = GridState {
        grid_size: 20.0,
        kind: "grid".to_owned(),
    };
    let frame = grid.into_frame(Frame::new(MessageKind::GridState));
    assert_eq!(frame.get("gridSize"), Some(&json!(20.0)));
    assert_eq!(frame.str_field("kind"), Some("grid"));
}

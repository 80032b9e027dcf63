use super::*;
use crate::state::EntityUpdate;

fn decoder() -> MessageDecoder {
    MessageDecoder::new("radar_debug")
}

#[test]
fn test_valid_report_decodes() {
    let decoded = decoder()
        .decode("radar_debug", br#"{"pos":[1.0,2.0],"id":3,"msg":"ok"}"#)
        .unwrap();

    assert_eq!(
        decoded,
        Decoded::Update(EntityUpdate {
            id: 3,
            position: (1.0, 2.0),
            label: "ok".to_string(),
        })
    );
}

#[test]
fn test_integer_coordinates_accepted() {
    let decoded = decoder()
        .decode("radar_debug", br#"{"pos":[4,5],"id":104,"msg":""}"#)
        .unwrap();

    match decoded {
        Decoded::Update(update) => {
            assert_eq!(update.position, (4.0, 5.0));
            assert_eq!(update.id, 104);
        }
        other => panic!("Expected update, got {:?}", other),
    }
}

#[test]
fn test_extra_components_and_fields_ignored() {
    let decoded = decoder()
        .decode(
            "radar_debug",
            br#"{"pos":[1.5,2.5,0.3],"id":9,"msg":"z","conf":0.9}"#,
        )
        .unwrap();

    match decoded {
        Decoded::Update(update) => assert_eq!(update.position, (1.5, 2.5)),
        other => panic!("Expected update, got {:?}", other),
    }
}

#[test]
fn test_decode_is_idempotent() {
    let payload = br#"{"pos":[10.25,7.75],"id":42,"msg":"tracking"}"#;
    let d = decoder();

    let first = d.decode("radar_debug", payload).unwrap();
    let second = d.decode("radar_debug", payload).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_other_topic_is_irrelevant() {
    // Well-formed payload, but not on the draw topic
    let decoded = decoder()
        .decode("radar_raw", br#"{"pos":[1.0,2.0],"id":3,"msg":"ok"}"#)
        .unwrap();
    assert_eq!(decoded, Decoded::Irrelevant);

    // Garbage on another topic is not even parsed
    let decoded = decoder().decode("camera", b"\xff\x00binary").unwrap();
    assert_eq!(decoded, Decoded::Irrelevant);
}

#[test]
fn test_topic_match_is_exact() {
    let d = decoder();
    assert!(d.is_draw_topic("radar_debug"));
    assert!(!d.is_draw_topic("radar_debug/extra"));
    assert!(!d.is_draw_topic("Radar_debug"));
    assert!(!d.is_draw_topic(""));
}

#[test]
fn test_missing_id_fails() {
    let result = decoder().decode("radar_debug", br#"{"pos":[1.0,2.0],"msg":"ok"}"#);
    assert!(matches!(result, Err(DecodeError::Malformed(_))));
}

#[test]
fn test_negative_id_fails() {
    let result = decoder().decode("radar_debug", br#"{"pos":[1.0,2.0],"id":-1,"msg":"ok"}"#);
    assert!(matches!(result, Err(DecodeError::Malformed(_))));
}

#[test]
fn test_wrong_types_fail() {
    let d = decoder();
    for payload in [
        &br#"{"pos":"1,2","id":1,"msg":"ok"}"#[..],
        &br#"{"pos":[1.0,2.0],"id":"1","msg":"ok"}"#[..],
        &br#"{"pos":[1.0,2.0],"id":1,"msg":5}"#[..],
        &br#"{"pos":[1.0,"2"],"id":1,"msg":"ok"}"#[..],
        &br#"{"pos":[1.0,2.0],"id":1.5,"msg":"ok"}"#[..],
    ] {
        let result = d.decode("radar_debug", payload);
        assert!(result.is_err(), "Expected error for {:?}", String::from_utf8_lossy(payload));
    }
}

#[test]
fn test_invalid_json_fails() {
    let result = decoder().decode("radar_debug", b"{not json");
    assert!(matches!(result, Err(DecodeError::Malformed(_))));

    let result = decoder().decode("radar_debug", b"");
    assert!(matches!(result, Err(DecodeError::Malformed(_))));
}

#[test]
fn test_decode_error_display() {
    assert_eq!(
        DecodeError::ShortPosition(1).to_string(),
        "pos must have at least 2 components, got 1"
    );
}

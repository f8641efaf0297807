//! Unit tests for text frame encoding and tolerant decoding.

use cobalt_stomp::Headers;
use cobalt_stomp::codec::{
    decode, encode_frame, encode_lines, encode_lines_with_headers, to_payload, unwrap_sockjs,
};
use cobalt_stomp::frame::Frame;

// =============================================================================
// Encoding
// =============================================================================

#[test]
fn encode_command_headers_body() {
    let text = encode_lines("SEND", &["destination:/q/a"], Some("hi"));
    assert_eq!(text, "SEND\ndestination:/q/a\n\nhi");
}

#[test]
fn encode_without_body_ends_with_blank_line() {
    let text = encode_lines("UNSUBSCRIBE", &["id:sub-0"], None);
    assert_eq!(text, "UNSUBSCRIBE\nid:sub-0\n\n");
}

#[test]
fn encode_keeps_placeholder_lines() {
    let text = encode_lines("X", &["a:1", "", "b:2"], None);
    assert_eq!(text, "X\na:1\n\nb:2\n\n");
}

#[test]
fn extra_headers_come_before_positional_lines() {
    let mut extra = Headers::new();
    extra.append("content-type", "text/plain");
    extra.append("priority", "9");
    let text = encode_lines_with_headers(
        "SEND",
        Some(&extra),
        &["destination:/topic/t"],
        Some("body"),
    );
    assert_eq!(
        text,
        "SEND\ncontent-type:text/plain\npriority:9\ndestination:/topic/t\n\nbody"
    );
}

#[test]
fn payload_appends_one_nul() {
    let text = encode_lines("ACK", &["id:1"], None);
    let payload = to_payload(&text);
    assert_eq!(payload.len(), text.len() + 1);
    assert_eq!(&payload[..text.len()], text.as_bytes());
    assert_eq!(payload[text.len()], 0);
}

#[test]
fn encode_frame_matches_encode_lines() {
    let frame = Frame::new("SEND")
        .header("destination", "/q/a")
        .header("receipt", "5")
        .set_body("payload");
    assert_eq!(
        encode_frame(&frame),
        encode_lines("SEND", &["destination:/q/a", "receipt:5"], Some("payload"))
    );
}

// =============================================================================
// Decoding
// =============================================================================

#[test]
fn encode_then_decode_send() {
    let text = encode_lines("SEND", &["destination:/q/a"], Some("hi"));
    let frame = decode(&text);
    assert_eq!(frame.command, "SEND");
    assert_eq!(frame.headers.get("destination"), "/q/a");
    assert_eq!(frame.body, "hi");
}

#[test]
fn decode_strips_nul_terminator() {
    let frame = decode("MESSAGE\nsubscription:sub-0\n\nhello\0");
    assert_eq!(frame.command, "MESSAGE");
    assert_eq!(frame.body, "hello");
}

#[test]
fn decode_connected_without_body() {
    let frame = decode("CONNECTED\nheart-beat:0,0\n\n");
    assert_eq!(frame.command, "CONNECTED");
    assert_eq!(frame.get_header("heart-beat"), "0,0");
    assert!(frame.body.is_empty());
}

#[test]
fn decode_splits_header_at_first_colon() {
    let frame = decode("MESSAGE\ndestination:/queue/a:b:c\n\n");
    assert_eq!(frame.get_header("destination"), "/queue/a:b:c");
}

#[test]
fn decode_drops_lines_without_colon() {
    let frame = decode("MESSAGE\ngarbage\nmessage-id:7\n\nbody");
    assert_eq!(frame.headers.len(), 1);
    assert_eq!(frame.get_header("message-id"), "7");
    assert_eq!(frame.body, "body");
}

#[test]
fn decode_preserves_duplicate_headers() {
    let frame = decode("MESSAGE\nfoo:first\nfoo:second\n\n");
    assert_eq!(frame.headers.len(), 2);
    assert_eq!(frame.get_header("foo"), "first");
    assert_eq!(frame.headers.entry_at(1), Some(("foo", "second")));
}

#[test]
fn decode_body_is_kept_verbatim() {
    let frame = decode("MESSAGE\na:1\n\nline one\n\nline three\n");
    assert_eq!(frame.body, "line one\n\nline three\n");
}

#[test]
fn decode_does_not_unescape_header_values() {
    let frame = decode("MESSAGE\nkey:a\\cb\\nc\\\\d\n\n");
    assert_eq!(frame.get_header("key"), "a\\cb\\nc\\\\d");
}

#[test]
fn decode_tolerates_crlf() {
    let frame = decode("RECEIPT\r\nreceipt-id:9\r\n\r\n");
    assert_eq!(frame.command, "RECEIPT");
    assert_eq!(frame.get_header("receipt-id"), "9");
}

#[test]
fn decode_skips_leading_heartbeats() {
    let frame = decode("\n\nRECEIPT\nreceipt-id:1\n\n");
    assert_eq!(frame.command, "RECEIPT");
}

#[test]
fn decode_heartbeat_has_empty_command() {
    let frame = decode("\n");
    assert_eq!(frame.command, "");
    assert!(frame.headers.is_empty());
}

#[test]
fn decode_empty_input() {
    let frame = decode("");
    assert_eq!(frame.command, "");
    assert!(frame.body.is_empty());
}

#[test]
fn decode_passes_unknown_commands_through() {
    let frame = decode("WHATEVER\nx:y\n\n");
    assert_eq!(frame.command, "WHATEVER");
}

// =============================================================================
// SockJS
// =============================================================================

#[test]
fn unwrap_sockjs_json_array() {
    let frames = unwrap_sockjs(r#"["CONNECTED\nversion:1.1\n\n\u0000","MESSAGE\n\n\u0000"]"#);
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0], "CONNECTED\nversion:1.1\n\n\0");
    let frame = decode(&frames[0]);
    assert_eq!(frame.command, "CONNECTED");
    assert_eq!(frame.get_header("version"), "1.1");
}

#[test]
fn unwrap_sockjs_falls_back_to_raw() {
    let frames = unwrap_sockjs("RECEIPT\nreceipt-id:3\n\n");
    assert_eq!(frames, vec!["RECEIPT\nreceipt-id:3\n\n".to_string()]);
}

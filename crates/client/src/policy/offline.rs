//! Responses synthesized when neither the network nor the cache can answer.

use vokabel_core::ResponseSnapshot;

/// 503 JSON body `{"error": message}` for content requested while offline.
pub fn unavailable_json(message: &str) -> ResponseSnapshot {
    let body = serde_json::json!({ "error": message }).to_string();
    ResponseSnapshot::new(503, body).with_header("Content-Type", "application/json")
}

/// Plain-text 503 for any other resource requested while offline.
pub fn service_unavailable() -> ResponseSnapshot {
    ResponseSnapshot::new(503, "Offline")
        .with_status_text("Service Unavailable")
        .with_header("Content-Type", "text/plain;charset=UTF-8")
}

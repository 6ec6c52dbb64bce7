//! MASTER Response Classifier
//!
//! The MASTER prints free-form text, so responses are classified by keyword.
//! Rules are checked in a fixed order and the first match wins. CAN bus
//! recovery telemetry (`EFLG`, `TEC=`/`REC=` counters, "CAN recover") is
//! normal output and is forced to [`ResponseType::Data`] before the error
//! keywords are consulted.

use mixlink_core::{ResponseType, SerialResponse};

/// Classify a single line
pub fn classify(line: &str) -> ResponseType {
    if line.trim().is_empty() {
        return ResponseType::Unknown;
    }

    let lower = line.to_lowercase();

    if is_can_recovery(&lower) {
        return ResponseType::Data;
    }
    if contains_any(&lower, &["error", "fail", "invalid"]) {
        return ResponseType::Error;
    }
    if contains_any(&lower, &["ok", "success", "ack"]) {
        return ResponseType::Ack;
    }
    if contains_any(&lower, &["log raw:", "event"]) {
        return ResponseType::Log;
    }
    if lower.contains("id") && lower.contains("uid") && lower.contains('|') {
        return ResponseType::Table;
    }

    ResponseType::Data
}

/// Build a timestamped response from a framed line
pub fn parse_response(line: &str) -> SerialResponse {
    SerialResponse::new(line, classify(line))
}

fn is_can_recovery(lower: &str) -> bool {
    lower.contains("eflg")
        || lower.contains("can recover")
        || (lower.contains("tec=") && lower.contains("rec="))
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

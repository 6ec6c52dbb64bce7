//! Connection lifecycle tests against an in-memory backend

mod common;

use common::{data_lines, error_messages, fast_settings, wait_until, EventLog, MockBackend};
use mixlink_communication::{Command, SerialManager, SerialPortInfo};
use mixlink_core::{ConnectionError, ConnectionState, ResponseType, SerialEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn manager_with(backend: &MockBackend) -> (SerialManager, EventLog) {
    let manager = SerialManager::new(Arc::new(backend.clone()), fast_settings());
    let events: EventLog = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    manager.add_fn_listener(move |event| sink.lock().push(event.clone()));
    (manager, events)
}

fn mega_ports() -> Vec<SerialPortInfo> {
    vec![
        SerialPortInfo::new("COM1", "USB Serial"),
        SerialPortInfo::new("COM4", "CH340 clone"),
    ]
}

#[test]
fn test_connect_emits_connected() {
    let backend = MockBackend::new();
    let (mut manager, events) = manager_with(&backend);

    manager.connect("COM3").unwrap();

    assert!(manager.is_connected());
    assert_eq!(manager.state(), ConnectionState::Connected);
    assert_eq!(manager.current_port_name(), Some("COM3"));
    assert_eq!(*events.lock(), vec![SerialEvent::Connected("COM3".to_string())]);
}

#[test]
fn test_connect_auto_uses_discovery() {
    let backend = MockBackend::with_ports(mega_ports());
    let (mut manager, _events) = manager_with(&backend);

    manager.connect_auto().unwrap();

    assert_eq!(manager.current_port_name(), Some("COM4"));
}

#[test]
fn test_connect_auto_without_ports() {
    let backend = MockBackend::new();
    let (mut manager, events) = manager_with(&backend);

    let err = manager.connect_auto().unwrap_err();

    assert_eq!(
        err.as_connection_error(),
        Some(&ConnectionError::PortNotFound {
            port: "auto".to_string()
        })
    );
    assert_eq!(error_messages(&events), vec!["No Arduino port detected"]);
    assert!(!manager.is_connected());
    assert_eq!(backend.opens(), 0);
}

#[test]
fn test_connect_empty_name_is_not_found() {
    let backend = MockBackend::new();
    let (mut manager, events) = manager_with(&backend);

    let err = manager.connect("  ").unwrap_err();

    assert!(matches!(
        err.as_connection_error(),
        Some(ConnectionError::PortNotFound { .. })
    ));
    assert_eq!(error_messages(&events).len(), 1);
}

#[test]
fn test_open_failure_reports_port_in_use() {
    let backend = MockBackend::new();
    backend.refuse("COM3");
    let (mut manager, events) = manager_with(&backend);

    let err = manager.connect("COM3").unwrap_err();

    assert!(matches!(
        err.as_connection_error(),
        Some(ConnectionError::FailedToOpen { port, .. }) if port == "COM3"
    ));
    let errors = error_messages(&events);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("may be in use by another application"));
    assert!(!events
        .lock()
        .iter()
        .any(|e| matches!(e, SerialEvent::Connected(_))));
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(manager.current_port_name(), None);
}

#[test]
fn test_stale_handle_is_released_before_open() {
    let backend = MockBackend::new();
    backend.leave_stale_handle("COM3");
    let (mut manager, _events) = manager_with(&backend);

    manager.connect("COM3").unwrap();

    assert_eq!(backend.releases(), 1);
    assert!(manager.is_connected());
}

#[test]
fn test_stuck_handle_wait_is_bounded() {
    let backend = MockBackend::new();
    backend.leave_stale_handle("COM3");
    backend.make_release_stuck();
    let (mut manager, _events) = manager_with(&backend);

    let start = Instant::now();
    manager.connect("COM3").unwrap();
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_millis(50));
    assert!(elapsed < Duration::from_secs(1));
}

#[test]
fn test_second_manager_takes_over_held_port() {
    let backend = MockBackend::new();
    let (mut first, first_events) = manager_with(&backend);
    let (mut second, second_events) = manager_with(&backend);
    first.connect("COM3").unwrap();

    second.connect("COM3").unwrap();

    assert_eq!(backend.releases(), 1);
    assert!(second.is_connected());
    assert!(wait_until(|| !error_messages(&first_events).is_empty()));
    assert!(!first.is_connected());
    assert!(error_messages(&first_events)[0].starts_with("Read failed"));

    backend.push_incoming(b"pong 0x12\n");
    assert!(wait_until(|| data_lines(&second_events) == vec!["pong 0x12"]));

    first.disconnect();
    assert!(!first_events.lock().contains(&SerialEvent::Disconnected));
    assert!(second.is_connected());
    assert_eq!(backend.open_handles(), 1);
}

#[test]
fn test_send_command_appends_terminator() {
    let backend = MockBackend::new();
    let (mut manager, _events) = manager_with(&backend);
    manager.connect("COM3").unwrap();

    manager.send_command(&Command::pulse_uid("0x12", 7, 500)).unwrap();
    manager.send_raw("help\n").unwrap();

    assert_eq!(backend.written(), "pulse_uid 0x12 7 500\nhelp\n");
}

#[test]
fn test_send_while_disconnected() {
    let backend = MockBackend::new();
    let (manager, events) = manager_with(&backend);

    let err = manager.send_command(&Command::help()).unwrap_err();

    assert_eq!(err.as_connection_error(), Some(&ConnectionError::NotConnected));
    assert_eq!(*events.lock(), vec![SerialEvent::Error("Not connected to Arduino".to_string())]);
    assert_eq!(manager.pending_bytes(), 0);
    assert!(backend.written().is_empty());
}

#[test]
fn test_partial_write_is_reported_not_retried() {
    let backend = MockBackend::new();
    backend.limit_writes(3);
    let (mut manager, events) = manager_with(&backend);
    manager.connect("COM3").unwrap();

    let err = manager.send_raw("help").unwrap_err();

    assert_eq!(
        err.as_connection_error(),
        Some(&ConnectionError::WriteIncomplete {
            written: 3,
            expected: 5
        })
    );
    assert_eq!(backend.written(), "hel");
    assert_eq!(
        error_messages(&events),
        vec!["Failed to write complete command. Wrote 3 of 5 bytes"]
    );
}

#[test]
fn test_lines_are_framed_in_arrival_order() {
    let backend = MockBackend::new();
    let (mut manager, events) = manager_with(&backend);
    manager.connect("COM3").unwrap();

    backend.push_incoming(b"A\nB\nC");
    assert!(wait_until(|| data_lines(&events).len() == 2));
    assert_eq!(data_lines(&events), vec!["A", "B"]);
    assert_eq!(manager.pending_bytes(), 1);

    backend.push_incoming(b"\n");
    assert!(wait_until(|| data_lines(&events).len() == 3));
    assert_eq!(data_lines(&events), vec!["A", "B", "C"]);
    assert_eq!(manager.pending_bytes(), 0);
}

#[test]
fn test_responses_are_classified() {
    let backend = MockBackend::new();
    let (mut manager, events) = manager_with(&backend);
    manager.connect("COM3").unwrap();

    backend.push_incoming(b"OK\r\nCAN ERROR EFLG=0x15\r\nERROR: bad uid\r\n");
    assert!(wait_until(|| data_lines(&events).len() == 3));

    let types: Vec<ResponseType> = events
        .lock()
        .iter()
        .filter_map(|e| match e {
            SerialEvent::DataReceived(r) => Some(r.response_type()),
            _ => None,
        })
        .collect();
    assert_eq!(types, vec![ResponseType::Ack, ResponseType::Data, ResponseType::Error]);
}

#[test]
fn test_reconnect_resets_buffer() {
    let backend = MockBackend::new();
    let (mut manager, events) = manager_with(&backend);
    manager.connect("COM3").unwrap();

    backend.push_incoming(b"partial");
    assert!(wait_until(|| manager.pending_bytes() == 7));

    manager.connect("COM3").unwrap();
    assert_eq!(manager.pending_bytes(), 0);

    backend.push_incoming(b"fresh\n");
    assert!(wait_until(|| !data_lines(&events).is_empty()));
    assert_eq!(data_lines(&events), vec!["fresh"]);

    let lifecycle: Vec<SerialEvent> = events
        .lock()
        .iter()
        .filter(|e| !matches!(e, SerialEvent::DataReceived(_)))
        .cloned()
        .collect();
    assert_eq!(
        lifecycle,
        vec![
            SerialEvent::Connected("COM3".to_string()),
            SerialEvent::Disconnected,
            SerialEvent::Connected("COM3".to_string()),
        ]
    );
    assert_eq!(backend.open_handles(), 1);
}

#[test]
fn test_disconnect_twice_emits_one_event() {
    let backend = MockBackend::new();
    let (mut manager, events) = manager_with(&backend);
    manager.connect("COM3").unwrap();

    manager.disconnect();
    manager.disconnect();

    let disconnects = events
        .lock()
        .iter()
        .filter(|e| **e == SerialEvent::Disconnected)
        .count();
    assert_eq!(disconnects, 1);
    assert!(!manager.is_connected());
    assert_eq!(manager.current_port_name(), None);
    assert_eq!(backend.open_handles(), 0);
}

#[test]
fn test_disconnect_waits_out_close_settle() {
    let backend = MockBackend::new();
    let (mut manager, _events) = manager_with(&backend);
    manager.connect("COM3").unwrap();

    let start = Instant::now();
    manager.disconnect();

    assert!(start.elapsed() >= fast_settings().close_settle);
    assert_eq!(backend.open_handles(), 0);

    let start = Instant::now();
    manager.disconnect();
    assert!(start.elapsed() < fast_settings().close_settle);
}

#[test]
fn test_disconnect_without_connection_is_silent() {
    let backend = MockBackend::new();
    let (mut manager, events) = manager_with(&backend);

    manager.disconnect();

    assert!(events.lock().is_empty());
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

#[test]
fn test_panicking_listener_does_not_block_others() {
    let backend = MockBackend::new();
    let manager_events: EventLog = Arc::new(Mutex::new(Vec::new()));
    let order = Arc::new(Mutex::new(Vec::new()));
    let mut manager = SerialManager::new(Arc::new(backend.clone()), fast_settings());

    let first_order = order.clone();
    manager.add_fn_listener(move |event| {
        first_order.lock().push(format!("first: {}", event));
        if matches!(event, SerialEvent::DataReceived(_)) {
            panic!("listener failure");
        }
    });
    let second_order = order.clone();
    let sink = manager_events.clone();
    manager.add_fn_listener(move |event| {
        second_order.lock().push(format!("second: {}", event));
        sink.lock().push(event.clone());
    });

    manager.connect("COM3").unwrap();
    backend.push_incoming(b"pong 0x12\n");
    assert!(wait_until(|| data_lines(&manager_events).len() == 1));
    manager.disconnect();

    let order = order.lock();
    assert_eq!(order[0], "first: Connected to COM3");
    assert_eq!(order[1], "second: Connected to COM3");
    assert!(order[2].starts_with("first: ") && order[2].ends_with("pong 0x12"));
    assert!(order[3].starts_with("second: ") && order[3].ends_with("pong 0x12"));
    assert_eq!(order[4], "first: Disconnected");
    assert_eq!(order[5], "second: Disconnected");
}

#[test]
fn test_read_failure_closes_link() {
    let backend = MockBackend::new();
    let (mut manager, events) = manager_with(&backend);
    manager.connect("COM3").unwrap();

    backend.fail_reads();
    assert!(wait_until(|| !error_messages(&events).is_empty()));
    assert!(!manager.is_connected());

    let errors = error_messages(&events);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Read failed"));

    let err = manager.send_raw("help").unwrap_err();
    assert_eq!(err.as_connection_error(), Some(&ConnectionError::NotConnected));

    manager.disconnect();
    assert!(!events.lock().contains(&SerialEvent::Disconnected));
}

#[test]
fn test_removed_listener_stops_receiving() {
    let backend = MockBackend::new();
    let (mut manager, events) = manager_with(&backend);
    let extra: EventLog = Arc::new(Mutex::new(Vec::new()));
    let sink = extra.clone();
    let handle = manager.add_fn_listener(move |event| sink.lock().push(event.clone()));

    assert!(manager.remove_listener(&handle));
    manager.connect("COM3").unwrap();

    assert!(extra.lock().is_empty());
    assert_eq!(events.lock().len(), 1);

    manager.clear_listeners();
    manager.disconnect();
    assert_eq!(events.lock().len(), 1);
}

#[test]
fn test_subscriber_receives_events() {
    let backend = MockBackend::new();
    let (mut manager, _events) = manager_with(&backend);
    let mut rx = manager.subscribe();

    manager.connect("COM3").unwrap();

    assert_eq!(rx.try_recv().unwrap(), SerialEvent::Connected("COM3".to_string()));
}

#[test]
fn test_drop_closes_port() {
    let backend = MockBackend::new();
    {
        let (mut manager, _events) = manager_with(&backend);
        manager.connect("COM3").unwrap();
        assert_eq!(backend.open_handles(), 1);
    }
    assert_eq!(backend.open_handles(), 0);
}

//! Loading a config file and watching the association log its traffic.

use logging::{LogLevel, Logger};
use sctp::{Association, MemoryAf, OutputConfig, Route, SctpError};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

#[test]
fn test_config_file_drives_fragmentation_and_logging() {
    let file = write_config(
        r#"{
            "nodelay": true,
            "default_pathmtu": 1280,
            "outbound_streams": 4,
            "sack_delay_ms": 50
        }"#,
    );
    let config = OutputConfig::load_from_file(file.path()).unwrap();
    assert_eq!(config.default_pathmtu, 1280);
    assert_eq!(config.sack_delay(), Duration::from_millis(50));

    let (logger, capture) = Logger::in_memory(LogLevel::Debug);
    let af = MemoryAf::with_default_route(Route::new(1280));
    let mut assoc = Association::new(&config, af, &logger, 7000, 7001).unwrap();
    let id = assoc.add_transport("[2001:db8::1]:7001".parse().unwrap());
    assoc.establish(0x1234, 65536, 100);

    // 1280 minus the IPv6, common and DATA headers.
    assert_eq!(assoc.frag_point(), 1212);
    assoc.send_message(3, 0, &[0xEE; 3000], false).unwrap();
    assert!(assoc.send_message(4, 0, b"x", false).is_err());

    let report = assoc.flush(id).unwrap();
    assert_eq!(report.data_sent, 3);

    let sent = &assoc.af().sent;
    assert_eq!(sent.len(), 3);
    // IPv6 header is not part of the datagram bytes.
    assert!(sent.iter().all(|d| d.bytes.len() + 40 <= 1280));
    assert_eq!(assoc.mib().out_packets, 3);
    assert_eq!(assoc.mib().out_data_chunks, 3);

    assert!(capture.wait_for("[SCTP]", Duration::from_secs(1)));
    assert!(capture.wait_for("transmitting 1 chunks", Duration::from_secs(1)));
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let file = write_config(r#"{ "auth_enabled": true, "auth_hmac": "sha1" }"#);
    let err = OutputConfig::load_from_file(file.path()).unwrap_err();
    assert!(matches!(err, SctpError::Config(_)));

    let file = write_config(r#"{ "no_such_option": 1 }"#);
    assert!(OutputConfig::load_from_file(file.path()).is_err());
}

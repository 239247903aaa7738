//! End-to-end checks of packet assembly against an in-memory egress.

use logging::{LogLevel, Logger};
use sctp::auth;
use sctp::{
    AddressFamily, Association, ChunkType, ControlChunk, DataChunk, DataChunkRef, DataMessage,
    MemoryAf, OutboundChunk, OutboundData, OutputConfig, Packet, ParsedPacket, Route, SctpChunk,
    TransportId, XmitStatus,
};
use std::time::Instant;

const PEER_VTAG: u32 = 0xCAFE;
const PEER_RWND: u32 = 65536;
/// IPv4 plus common header.
const V4_OVERHEAD: u32 = 32;

fn established(config: OutputConfig) -> (Association<MemoryAf>, TransportId) {
    let (logger, _capture) = Logger::in_memory(LogLevel::Info);
    let af = MemoryAf::with_default_route(Route::new(config.default_pathmtu));
    let mut assoc = Association::new(&config, af, &logger, 5000, 5001).unwrap();
    let id = assoc.add_transport("192.0.2.7:5001".parse().unwrap());
    assoc.establish(PEER_VTAG, PEER_RWND, 1);
    (assoc, id)
}

fn nodelay() -> OutputConfig {
    OutputConfig {
        nodelay: true,
        ..OutputConfig::default()
    }
}

fn data(len: usize) -> DataChunkRef {
    OutboundData::new(
        DataChunk::new(0, 51, vec![0x5A; len]),
        DataMessage::new(false, false),
    )
    .unwrap()
    .into_ref()
}

#[test]
fn test_datagrams_stay_within_pmtu_unless_fragmentable() {
    let (mut assoc, id) = established(nodelay());
    assoc.transport_mut(id).unwrap().cwnd = u32::MAX;

    let sizes = [100, 700, 1452, 3, 900, 2000, 40, 800, 1452, 1];
    assoc.with_packet(id, |packet, assoc| {
        for len in sizes {
            packet
                .transmit_chunk(assoc, data(len).into(), false)
                .unwrap();
            assert!(packet.size() <= 1500 || packet.ipfragok());
        }
        packet.transmit(assoc).unwrap();
    });

    let sent = assoc.af_mut().take_sent();
    assert!(sent.len() >= 5);
    for datagram in &sent {
        let parsed = ParsedPacket::parse_verified(&datagram.bytes).unwrap();
        if datagram.ipfragok {
            // Only a DATA chunk that was alone could have been let through.
            assert_eq!(parsed.chunks.len(), 1);
            assert!(datagram.bytes.len() + 20 > 1500);
        } else {
            assert!(datagram.bytes.len() + 20 <= 1500);
        }
    }
    assert_eq!(sent.iter().filter(|d| d.ipfragok).count(), 1);
}

#[test]
fn test_tsns_follow_admission_order() {
    let (mut assoc, id) = established(nodelay());
    assoc.transport_mut(id).unwrap().cwnd = 100;
    let (first, deferred, later) = (data(100), data(100), data(100));

    assoc.with_packet(id, |packet, assoc| {
        packet.append_chunk(assoc, first.clone().into()).unwrap();
        let refused = packet
            .append_chunk(assoc, deferred.clone().into())
            .unwrap_err();
        assert_eq!(refused.status, XmitStatus::RwndFull);

        assoc.transport_mut(id).unwrap().cwnd = u32::MAX;
        packet.append_chunk(assoc, later.clone().into()).unwrap();
        packet.append_chunk(assoc, refused.chunk).unwrap();
    });

    let first = first.borrow().tsn().unwrap();
    let later = later.borrow().tsn().unwrap();
    let deferred = deferred.borrow().tsn().unwrap();
    assert_eq!(later.wrapping_sub(first), 1);
    assert_eq!(deferred.wrapping_sub(later), 1);
}

#[test]
fn test_flight_accounting_matches_admitted_data() {
    let (mut assoc, id) = established(nodelay());
    for len in [300, 500, 1200] {
        assoc.send_message(0, 51, &vec![1; len], false).unwrap();
    }

    let report = assoc.flush(id).unwrap();
    assert_eq!(report.data_sent, 3);
    assert_eq!(assoc.af().sent.len(), 2);
    assert_eq!(assoc.transport(id).unwrap().flight_size, 2000);
    assert_eq!(assoc.outq().outstanding_bytes(), 2000);
    assert_eq!(assoc.peer().rwnd, PEER_RWND - 2000);

    let first_tsn = assoc.outq().transmitted()[0].borrow().tsn().unwrap();
    assert!(assoc.mark_for_retransmit(first_tsn));
    assert_eq!(assoc.transport(id).unwrap().flight_size, 1700);
    assert_eq!(assoc.outq().outstanding_bytes(), 1700);

    let report = assoc.flush(id).unwrap();
    assert_eq!(report.retransmitted, 1);
    assert_eq!(assoc.transport(id).unwrap().flight_size, 2000);
    assert_eq!(assoc.outq().outstanding_bytes(), 2000);

    let last_tsn = assoc.next_tsn().wrapping_sub(1);
    assert_eq!(assoc.ack(last_tsn, PEER_RWND), 2000);
    assert_eq!(assoc.transport(id).unwrap().flight_size, 0);
    assert_eq!(assoc.outq().outstanding_bytes(), 0);
    assert_eq!(assoc.peer().rwnd, PEER_RWND);
    assert!(assoc.outq().transmitted().is_empty());
}

#[test]
fn test_auth_leads_authenticated_data() {
    let config = OutputConfig {
        auth_enabled: true,
        auth_hmac: "sha256".into(),
        auth_key_id: 3,
        auth_secret: "shared secret".into(),
        auth_chunks: vec!["DATA".into()],
        ..nodelay()
    };
    let (mut assoc, id) = established(config);
    assoc.send_message(1, 51, b"authenticated", false).unwrap();
    assoc.flush(id).unwrap();

    let sent = assoc.af_mut().take_sent();
    assert_eq!(sent.len(), 1);
    let bytes = &sent[0].bytes;
    let parsed = ParsedPacket::parse_verified(bytes).unwrap();
    assert_eq!(
        parsed.chunk_types(),
        vec![Some(ChunkType::Auth), Some(ChunkType::Data)]
    );
    let SctpChunk::Auth(auth_chunk) = &parsed.chunks[0] else {
        panic!("expected AUTH first");
    };
    assert_eq!(auth_chunk.shared_key_id, 3);
    assert_eq!(auth_chunk.hmac_id, 3);
    assert_eq!(auth_chunk.hmac.len(), 32);

    let offset = parsed.auth_offset().unwrap();
    assert_eq!(offset, 12);
    let key = assoc.auth_key().unwrap();
    assert!(auth::verify(key, bytes, offset).unwrap());

    let mut tampered = bytes.clone();
    let last = tampered.len() - 1;
    tampered[last] ^= 0xFF;
    assert!(!auth::verify(key, &tampered, offset).unwrap());
}

#[test]
fn test_auth_covers_bundled_sack() {
    let config = OutputConfig {
        auth_enabled: true,
        auth_secret: "shared secret".into(),
        auth_chunks: vec!["DATA".into()],
        ..nodelay()
    };
    let (mut assoc, id) = established(config);
    assoc.note_received_tsn(1, Instant::now());
    assoc.send_message(0, 51, b"reply", false).unwrap();
    assoc.flush(id).unwrap();

    let sent = assoc.af_mut().take_sent();
    let parsed = ParsedPacket::parse_verified(&sent[0].bytes).unwrap();
    assert_eq!(
        parsed.chunk_types(),
        vec![
            Some(ChunkType::Auth),
            Some(ChunkType::Sack),
            Some(ChunkType::Data)
        ]
    );
    let key = assoc.auth_key().unwrap();
    assert!(auth::verify(key, &sent[0].bytes, parsed.auth_offset().unwrap()).unwrap());
    assert!(!assoc.timers().sack.is_pending());
}

#[test]
fn test_packet_after_transmit_equals_fresh_packet() {
    let (mut assoc, id) = established(nodelay());
    for len in [10, 20, 30, 40] {
        assoc.send_message(0, 51, &vec![7; len], false).unwrap();
    }
    let control = ControlChunk::new(SctpChunk::Heartbeat(vec![0; 8])).unwrap();
    assoc.queue_control(control);
    let report = assoc.flush(id).unwrap();
    assert_eq!(report.control_sent, 1);
    assert_eq!(report.data_sent, 4);
    assert_eq!(assoc.af().sent.len(), 1);

    let mut fresh = Packet::new(id, AddressFamily::Ipv4, 5000, 5001);
    fresh.config(&mut assoc, PEER_VTAG, false);

    let packet = assoc.transport(id).unwrap().packet();
    assert_eq!(packet, &fresh);
    assert_eq!(packet.size(), V4_OVERHEAD);
    assert!(packet.is_empty());
    assert!(!(packet.has_data() || packet.has_sack() || packet.has_auth()));
    assert!(!packet.has_cookie_echo() && !packet.ipfragok());
}

#[test]
fn test_zero_window_admits_one_chunk() {
    let (mut assoc, id) = established(nodelay());
    assoc.peer_mut().rwnd = 0;

    assoc.with_packet(id, |packet, assoc| {
        packet.append_chunk(assoc, data(200).into()).unwrap();
        assert_eq!(assoc.outq().outstanding_bytes(), 200);
        assert_eq!(assoc.peer().rwnd, 0);

        let refused = packet.append_chunk(assoc, data(200).into()).unwrap_err();
        assert_eq!(refused.status, XmitStatus::RwndFull);
        assert_eq!(packet.len(), 1);
    });
}

#[test]
fn test_pmtu_boundary() {
    let (mut assoc, id) = established(nodelay());

    assoc.with_packet(id, |packet, assoc| {
        // 16 byte DATA header plus 1452 bytes fills 1500 exactly.
        packet.append_chunk(assoc, data(1452).into()).unwrap();
        assert_eq!(packet.size(), 1500);
        assert!(!packet.ipfragok());

        let refused = packet.append_chunk(assoc, data(1).into()).unwrap_err();
        assert_eq!(refused.status, XmitStatus::PmtuFull);
        assert_eq!(packet.size(), 1500);

        packet.transmit(assoc).unwrap();

        let cookie = ControlChunk::new(SctpChunk::CookieEcho(vec![0xC0; 1600])).unwrap();
        packet
            .append_chunk(assoc, OutboundChunk::Control(cookie))
            .unwrap();
        assert!(packet.ipfragok());
        assert!(packet.size() > 1500);
        packet.transmit(assoc).unwrap();
    });

    let sent = assoc.af_mut().take_sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].bytes.len(), 1500 - 20);
    assert!(!sent[0].ipfragok);
    assert!(sent[1].ipfragok);
    assert_eq!(
        ParsedPacket::parse_verified(&sent[1].bytes)
            .unwrap()
            .chunk_types(),
        vec![Some(ChunkType::CookieEcho)]
    );
}

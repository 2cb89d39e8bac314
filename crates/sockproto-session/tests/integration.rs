use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use sockproto_codec::{CodecError, FnCodec};
use sockproto_session::{
    connect_with_config, start_server_with_config, Fields, ServerConfig, Session, SessionConfig,
    SessionError, Value,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Short polls, long keep-alive: timing-neutral tests.
fn quick_config() -> SessionConfig {
    SessionConfig {
        read_poll: Duration::from_millis(20),
        send_poll: Duration::from_millis(10),
        ..SessionConfig::default()
    }
}

/// Aggressive keep-alive for liveness tests.
fn keepalive_config() -> SessionConfig {
    SessionConfig {
        ping_interval: Duration::from_millis(100),
        ack_timeout: Duration::from_millis(300),
        close_timeout: Duration::from_millis(500),
        ..quick_config()
    }
}

async fn session_pair(config: SessionConfig) -> (Session, Session) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
    (
        Session::from_stream_with_config(client.unwrap(), config.clone()),
        Session::from_stream_with_config(accepted.unwrap().0, config),
    )
}

/// A session on one end, a raw socket we script by hand on the other.
async fn session_with_raw_peer(config: SessionConfig) -> (Session, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
    (
        Session::from_stream_with_config(client.unwrap(), config),
        accepted.unwrap().0,
    )
}

fn fields(entries: impl IntoIterator<Item = (&'static str, Value)>) -> Fields {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect::<BTreeMap<_, _>>()
}

async fn read_raw_header(stream: &mut TcpStream) -> i32 {
    let mut buf = [0u8; 4];
    stream.read_exact(&mut buf).await.unwrap();
    i32::from_be_bytes(buf)
}

async fn read_raw_frame(stream: &mut TcpStream) -> Vec<u8> {
    let len = read_raw_header(stream).await;
    assert!(len >= 0, "expected a data frame, got signal {len}");
    let mut body = vec![0u8; len as usize];
    stream.read_exact(&mut body).await.unwrap();
    body
}

#[tokio::test]
async fn scalar_message_roundtrip() {
    let (client, server) = session_pair(quick_config()).await;

    client
        .send(fields([("data", Value::Int(42))]))
        .await
        .unwrap();

    let received = server.receive().await.unwrap();
    assert_eq!(received.get("data"), Some(&Value::Int(42)));

    client.close().await;
    server.close().await;
}

#[tokio::test]
async fn tuple_survives_the_wire_as_a_tuple() {
    let (client, server) = session_pair(quick_config()).await;

    let triple = Value::tuple(vec![1.into(), 2.into(), 3.into()]);
    client
        .send(fields([("data", triple.clone())]))
        .await
        .unwrap();

    let received = server.receive().await.unwrap();
    match received.get("data") {
        Some(value @ Value::Tuple(items)) => {
            assert_eq!(items.len(), 3);
            assert_eq!(value, &triple);
        }
        other => panic!("expected a tuple, got {other:?}"),
    }

    client.close().await;
    server.close().await;
}

fn point_codec() -> Arc<FnCodec<(i64, i64)>> {
    Arc::new(FnCodec::new(
        "demo.point",
        |point: &(i64, i64)| Ok(json!([point.0, point.1])),
        |wire| {
            let coords = wire
                .as_array()
                .ok_or_else(|| CodecError::Malformed("point payload".into()))?;
            Ok((
                coords[0]
                    .as_i64()
                    .ok_or_else(|| CodecError::Malformed("point x".into()))?,
                coords[1]
                    .as_i64()
                    .ok_or_else(|| CodecError::Malformed("point y".into()))?,
            ))
        },
    ))
}

#[tokio::test]
async fn custom_codec_roundtrip_across_connection() {
    let (client, server) = session_pair(quick_config()).await;
    client.add_serializer(point_codec()).await.unwrap();
    server.add_serializer(point_codec()).await.unwrap();

    client
        .send(fields([("data", Value::custom("demo.point", (3i64, 4i64)))]))
        .await
        .unwrap();

    let received = server.receive().await.unwrap();
    match received.get("data") {
        Some(Value::Custom(custom)) => {
            assert_eq!(custom.type_id(), "demo.point");
            assert_eq!(custom.downcast_ref::<(i64, i64)>(), Some(&(3, 4)));
        }
        other => panic!("expected custom value, got {other:?}"),
    }

    client.close().await;
    server.close().await;
}

#[tokio::test]
async fn unsupported_type_fails_locally_and_connection_survives() {
    let (client, server) = session_pair(quick_config()).await;

    let err = client
        .send(fields([("data", Value::custom("no.such.type", 1u8))]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::Codec(CodecError::UnsupportedType { .. })
    ));

    // The same session still works.
    client
        .send(fields([("data", Value::Str("still alive".into()))]))
        .await
        .unwrap();
    let received = server.receive().await.unwrap();
    assert_eq!(
        received.get("data"),
        Some(&Value::Str("still alive".into()))
    );

    client.close().await;
    server.close().await;
}

#[tokio::test]
async fn acknowledgments_resolve_sends_in_fifo_order() {
    let (client, mut peer) = session_with_raw_peer(quick_config()).await;
    let client = Arc::new(client);
    let completions: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));

    let mut tasks = Vec::new();
    for index in 0..3usize {
        let client = Arc::clone(&client);
        let completions = Arc::clone(&completions);
        tasks.push(tokio::spawn(async move {
            client
                .send(fields([("seq", Value::Int(index as i64))]))
                .await
                .unwrap();
            completions.lock().unwrap().push(index);
        }));
        // Keep enqueue order deterministic.
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    // All three frames are on the wire before any acknowledgment.
    for _ in 0..3 {
        read_raw_frame(&mut peer).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(completions.lock().unwrap().is_empty());

    // Release acknowledgments one at a time.
    for expected in 0..3usize {
        peer.write_all(&(-100i32).to_be_bytes()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let seen = completions.lock().unwrap().clone();
        assert_eq!(seen, (0..=expected).collect::<Vec<_>>());
    }

    for task in tasks {
        task.await.unwrap();
    }
    client.close().await;
}

#[tokio::test]
async fn unsolicited_acknowledge_aborts_the_session() {
    let (client, mut peer) = session_with_raw_peer(quick_config()).await;
    assert!(client.is_connected());

    // Nothing was sent, so no packet is awaiting this acknowledge.
    peer.write_all(&(-100i32).to_be_bytes()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(!client.is_connected());
    assert!(matches!(
        client.send(fields([("data", Value::Int(1))])).await,
        Err(SessionError::Disconnected)
    ));
}

#[tokio::test]
async fn close_stays_bounded_when_peer_stops_reading() {
    let config = SessionConfig {
        close_timeout: Duration::from_millis(500),
        ..quick_config()
    };
    let (client, _peer) = session_with_raw_peer(config).await;
    let client = Arc::new(client);

    // Saturate the socket buffers: large sends that nobody reads,
    // leaving the send activity blocked mid-write.
    for _ in 0..8 {
        let client = Arc::clone(&client);
        tokio::spawn(async move {
            let _ = client
                .send(fields([("data", Value::Str("x".repeat(1024 * 1024)))]))
                .await;
        });
    }
    tokio::time::sleep(Duration::from_millis(200)).await;

    tokio::time::timeout(Duration::from_secs(3), client.close())
        .await
        .expect("close must finish within its configured bound");
}

#[tokio::test]
async fn silent_peer_aborts_the_session() {
    let (client, _peer) = session_with_raw_peer(keepalive_config()).await;
    assert!(client.is_connected());

    // The peer never acknowledges the keep-alive ping.
    tokio::time::sleep(Duration::from_millis(1000)).await;

    assert!(!client.is_connected());
    let err = client
        .send(fields([("data", Value::Int(1))]))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Disconnected));
}

#[tokio::test]
async fn idle_connection_exchanges_pings_automatically() {
    let (client, mut peer) = session_with_raw_peer(keepalive_config()).await;

    // Script the peer: acknowledge every ping it sees.
    let mut pings = 0u32;
    let deadline = tokio::time::Instant::now() + Duration::from_millis(800);
    while pings < 2 && tokio::time::Instant::now() < deadline {
        let code = read_raw_header(&mut peer).await;
        assert_eq!(code, -200, "expected a ping while idle");
        peer.write_all(&(-100i32).to_be_bytes()).await.unwrap();
        pings += 1;
    }

    assert!(pings >= 2);
    assert!(client.is_connected());
    client.close().await;
}

#[tokio::test]
async fn idle_session_pair_keeps_itself_alive() {
    let (client, server) = session_pair(keepalive_config()).await;

    // Several keep-alive rounds with no application traffic.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(client.is_connected());
    assert!(server.is_connected());

    // And the connection still carries data afterwards.
    client
        .send(fields([("data", Value::Bool(true))]))
        .await
        .unwrap();
    assert_eq!(
        server.receive().await.unwrap().get("data"),
        Some(&Value::Bool(true))
    );

    client.close().await;
    server.close().await;
}

#[tokio::test]
async fn closed_peer_fails_send_and_receive_fast() {
    let (client, server) = session_pair(quick_config()).await;
    server.close().await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(!client.is_connected());
    assert!(matches!(
        client.send(fields([("data", Value::Int(1))])).await,
        Err(SessionError::Disconnected)
    ));
    assert!(matches!(
        client.receive().await,
        Err(SessionError::Disconnected)
    ));

    // close stays idempotent on both ends.
    client.close().await;
    server.close().await;
}

#[tokio::test]
async fn server_binds_first_free_candidate_port() {
    let busy = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let busy_port = busy.local_addr().unwrap().port();
    let free_port = {
        let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
        probe.local_addr().unwrap().port()
    };

    let server = start_server_with_config(
        &[busy_port, free_port],
        |session: Session| async move {
            let _ = session.receive().await;
        },
        ServerConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(server.port(), free_port);
    server.close().await;
}

#[tokio::test]
async fn server_fails_when_all_candidate_ports_are_busy() {
    let busy = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let busy_port = busy.local_addr().unwrap().port();

    let err = start_server_with_config(
        &[busy_port],
        |_session: Session| async move {},
        ServerConfig::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, SessionError::PortsBusy { ports } if ports == vec![busy_port]));
}

#[tokio::test]
async fn server_echoes_through_the_full_stack() {
    let free_port = {
        let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
        probe.local_addr().unwrap().port()
    };

    let config = ServerConfig {
        session: quick_config(),
        ..ServerConfig::default()
    };
    let server = start_server_with_config(
        &[free_port],
        |session: Session| async move {
            while let Ok(message) = session.receive().await {
                if session.send(message).await.is_err() {
                    break;
                }
            }
        },
        config,
    )
    .await
    .unwrap();

    let client = connect_with_config("127.0.0.1", server.port(), quick_config())
        .await
        .unwrap();

    client
        .send(fields([("data", Value::Int(42))]))
        .await
        .unwrap();
    let echoed = client.receive().await.unwrap();
    assert_eq!(echoed.get("data"), Some(&Value::Int(42)));

    client.close().await;
    server.close().await;
}

//! Minimal client/server roundtrip: the server echoes every message back,
//! the client sends a scalar, a tuple and a custom-typed value.
//!
//! Run with: `cargo run -p sockproto-session --example roundtrip`

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use sockproto_codec::CodecError;
use sockproto_session::{connect, start_server, Fields, FnCodec, Session, Value};

fn fields(key: &str, value: Value) -> Fields {
    BTreeMap::from([(key.to_string(), value)])
}

fn timestamp_codec() -> Arc<FnCodec<std::time::Duration>> {
    Arc::new(FnCodec::new(
        "demo.timestamp",
        |value: &std::time::Duration| Ok(json!(value.as_secs_f64())),
        |wire| {
            wire.as_f64()
                .map(std::time::Duration::from_secs_f64)
                .ok_or_else(|| CodecError::Malformed("timestamp must be a number".into()))
        },
    ))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let server = start_server(&[9990, 9991, 9992], |session: Session| async move {
        if let Err(err) = session.add_serializer(timestamp_codec()).await {
            tracing::warn!(error = %err, "codec registration failed");
            return;
        }
        while let Ok(message) = session.receive().await {
            if session.send(message).await.is_err() {
                break;
            }
        }
    })
    .await?;
    tracing::info!(port = server.port(), "echo server up");

    let client = connect("127.0.0.1", server.port()).await?;
    client.add_serializer(timestamp_codec()).await?;

    for message in [
        fields("data", Value::Int(42)),
        fields("data", Value::tuple(vec![1.into(), 2.into(), 3.into()])),
        fields(
            "data",
            Value::custom("demo.timestamp", std::time::Duration::from_secs(90)),
        ),
    ] {
        client.send(message).await?;
        let echoed = client.receive().await?;
        tracing::info!(?echoed, "echo received");
    }

    client.close().await;
    server.close().await;
    Ok(())
}

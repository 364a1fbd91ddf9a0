mod command;
mod config;
mod device;

use anyhow::{Context, Result};
use command::{encode_response, undecodable_request, DirectiveExecutor, InvocationContext};
use config::AdapterConfig;
use device::{AcceptAllGrants, FileStateStore, MemoryStateStore, MqttCommandChannel, StateStore};
use skillbridge_shared::{codec, ResponseEnvelope};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use uuid::Uuid;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries responses
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = AdapterConfig::from_env().context("loading configuration")?;
    let grace = config.collaborator_timeout;

    info!("Skillbridge starting");
    info!("  MQTT broker: {}:{}", config.mqtt.host, config.mqtt.port);
    info!("  Bound endpoints: {}", config.devices.len());

    let store: Arc<dyn StateStore> = match &config.state_file {
        Some(path) => {
            info!("  State store: {}", path.display());
            Arc::new(FileStateStore::new(path))
        }
        None => {
            info!("  State store: in-memory (empty)");
            Arc::new(MemoryStateStore::new())
        }
    };
    let channel = Arc::new(MqttCommandChannel::connect(&config.mqtt, config.thing_names()));

    let executor = DirectiveExecutor::new(config, store, channel.clone(), Arc::new(AcceptAllGrants));
    info!(
        "  Collaborator timeout: {}ms",
        executor.config().collaborator_timeout.as_millis()
    );

    let mut stdout = tokio::io::stdout();

    match std::env::args().nth(1) {
        Some(path) => {
            let raw = tokio::fs::read(&path)
                .await
                .with_context(|| format!("reading request {}", path))?;
            let response = handle_document(&executor, &raw).await;
            write_response(&mut stdout, &response).await?;
        }
        None => {
            // One request document per line
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                if line.trim().is_empty() {
                    continue;
                }
                let response = handle_document(&executor, line.as_bytes()).await;
                write_response(&mut stdout, &response).await?;
            }
        }
    }

    channel.shutdown(grace).await;
    Ok(())
}

/// Decode one request document and run it through the executor
async fn handle_document(executor: &DirectiveExecutor, raw: &[u8]) -> ResponseEnvelope {
    let context = InvocationContext {
        request_id: Uuid::new_v4().to_string(),
        function_name: Some(env!("CARGO_PKG_NAME").into()),
        remaining_time_ms: None,
    };

    match codec::decode_request(raw) {
        Ok(request) => executor.handle(&request, Some(&context)).await,
        Err(e) => {
            error!("Request {} rejected: {}", context.request_id, e);
            undecodable_request(e)
        }
    }
}

async fn write_response(stdout: &mut Stdout, response: &ResponseEnvelope) -> Result<()> {
    let encoded = encode_response(response).context("encoding response")?;
    stdout.write_all(&encoded).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

//! Call demo binary
//!
//! Starts one real-time call against a VoxFlow backend and prints status
//! transitions until the call ends or ctrl-c is pressed.
//!
//! # Usage
//!
//! ```bash
//! # WebSocket (trickle) signaling, default microphone
//! cargo run --bin call -- \
//!   --api-base-url https://api.voxflow.dev \
//!   --token $VOXFLOW_TOKEN \
//!   --workflow-id wf-1 --workflow-run-id run-1
//!
//! # HTTP offer/answer signaling with a selected input device
//! cargo run --bin call -- \
//!   --api-base-url http://localhost:8000 \
//!   --token dev-token \
//!   --workflow-id wf-1 --workflow-run-id run-1 \
//!   --signaling http --device "USB Microphone" \
//!   --context customer_name=Ada
//! ```

use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use voxflow_rtc::auth::{AuthPrincipal, AuthSession, LocalUser};
use voxflow_rtc::{CallContext, CallController, ConnectionStatus, RtcClientConfig, SignalingMode};

/// VoxFlow call client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Backend base URL
    #[arg(long, default_value = "http://localhost:8000", env = "VOXFLOW_API_BASE_URL")]
    api_base_url: String,

    /// Bearer access token
    #[arg(long, env = "VOXFLOW_TOKEN")]
    token: String,

    /// Target workflow id
    #[arg(long)]
    workflow_id: String,

    /// Target workflow run id
    #[arg(long)]
    workflow_run_id: String,

    /// Signaling strategy: 'websocket' (trickle) or 'http'
    #[arg(long, default_value = "websocket")]
    signaling: String,

    /// Input device label (system default when omitted)
    #[arg(long)]
    device: Option<String>,

    /// Call context variables as KEY=VALUE (repeatable)
    #[arg(long, value_parser = parse_context_var)]
    context: Vec<(String, String)>,
}

fn parse_context_var(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let signaling = match args.signaling.as_str() {
        "http" => SignalingMode::Http,
        "websocket" => SignalingMode::WebSocket,
        other => anyhow::bail!("unknown signaling mode '{}'", other),
    };

    let config = RtcClientConfig::default()
        .with_api_base_url(&args.api_base_url)
        .with_signaling(signaling);

    let auth = Arc::new(AuthSession::new(AuthPrincipal::Local(LocalUser {
        username: whoami(),
        access_token: Some(args.token.clone()),
    })));

    let calls = CallController::new(config, auth)?;

    if let Err(e) = calls.devices().refresh() {
        info!("Device enumeration unavailable: {}", e);
    }
    if let Some(device) = &args.device {
        calls.devices().select(device)?;
    }

    let context = CallContext::from(
        args.context
            .iter()
            .cloned()
            .collect::<std::collections::HashMap<_, _>>(),
    );

    let mut status = calls.subscribe();
    let started = calls
        .start(&args.workflow_id, &args.workflow_run_id, context)
        .await;
    if let Err(e) = started {
        anyhow::bail!("{}", e.user_message());
    }

    println!("status: {:?}", calls.status());
    loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow();
                println!("status: {:?}", current);
                match current {
                    ConnectionStatus::Failed => {
                        if let Some(message) = calls.error_message() {
                            eprintln!("error: {}", message);
                        }
                        break;
                    }
                    ConnectionStatus::Idle => {
                        println!("call ended");
                        break;
                    }
                    _ => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("stopping...");
                calls.stop().await;
                break;
            }
        }
    }

    Ok(())
}

fn whoami() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "caller".to_string())
}

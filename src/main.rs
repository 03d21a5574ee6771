//! fetch-gate CLI

use anyhow::Context;
use clap::Parser;
use serde_json::Value;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fetch_gate::config::{Args, Command};
use fetch_gate::{
    Body, DispatchGate, DownloadRequest, LocalFile, Payload, Query, RequestOptions,
    SignedTransfer, UploadRequest,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("fetch_gate={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let config = args.gate_config()?;
    info!(
        env = %config.env,
        origin = config.origin.as_ref().map(|o| o.as_str()).unwrap_or("-"),
        demo = config.env.is_demo(),
        "request gate ready"
    );
    let gate = DispatchGate::new(config)?;

    match args.command {
        Command::Request {
            route,
            method,
            headers,
            query,
            json,
            data,
            mock,
        } => {
            let mut options = RequestOptions::new().method(method);
            for (name, value) in headers {
                options = options.header(name, value);
            }
            if !query.is_empty() {
                options = options.query(Query::params(query));
            }
            if let Some(json) = json {
                let value: Value = serde_json::from_str(&json).context("--json is not valid JSON")?;
                options = options.body(Body::Json(value));
            } else if let Some(data) = data {
                options = options.body(Body::Text(data));
            }

            let mock = mock
                .map(|raw| serde_json::from_str::<Value>(&raw).map(Payload::Json))
                .transpose()
                .context("--mock is not valid JSON")?;

            let payload = gate.dispatch_payload(route, options, mock).await?;
            print_payload(&payload)?;
        }
        Command::Upload {
            route,
            file,
            content_type,
            query,
        } => {
            let transfer = SignedTransfer::new(gate);
            let mut request = UploadRequest::new(route, LocalFile::from_path(&file, content_type));
            if !query.is_empty() {
                request = request.with_options(Query::params(query));
            }

            let storage_path = transfer
                .upload_file(request)
                .await
                .with_context(|| format!("upload of {} failed", file.display()))?;
            println!("{}", storage_path);
        }
        Command::DownloadUrl {
            route,
            file_path,
            query,
        } => {
            let transfer = SignedTransfer::new(gate);
            let mut request = DownloadRequest::new(file_path, route);
            if !query.is_empty() {
                request = request.with_options(Query::params(query));
            }

            let url = transfer.download_url(request).await?;
            println!("{}", url);
        }
    }

    Ok(())
}

fn print_payload(payload: &Payload) -> anyhow::Result<()> {
    match payload {
        Payload::Json(value) => println!("{}", serde_json::to_string_pretty(value)?),
        Payload::Text(text) => println!("{}", text),
        Payload::Empty => {}
    }
    Ok(())
}

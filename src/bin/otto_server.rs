//! HTTP front for the Otto agent
//! Minimal HTTP/1.1 handling over tokio: one request per connection.

use anyhow::Context;
use clap::Parser;
use otto_agent::{OttoConfig, OttoServices, OttoSystem, QueryContext, UserIdentity};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const MAX_REQUEST_BYTES: usize = 1 << 20;

#[derive(Parser, Debug)]
#[command(name = "otto_server", about = "Serve Otto ticket questions over HTTP")]
struct Args {
    #[arg(long, default_value_t = 8080)]
    port: u16,

    #[arg(long, default_value = "0.0.0.0")]
    host: String,
}

#[derive(Deserialize)]
struct QueryBody {
    query: String,
    #[serde(default)]
    context: Option<QueryContext>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserProfile {
    user_id: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = OttoConfig::from_env().context("loading configuration")?;
    let services = Arc::new(
        OttoServices::from_config(config)
            .await
            .context("connecting model and data store")?,
    );

    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr).await.with_context(|| format!("binding {}", addr))?;
    info!(%addr, "otto server listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let services = services.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, services).await {
                warn!(%peer, error = %e, "connection failed");
            }
        });
    }
}

struct Request {
    method: String,
    path: String,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

async fn read_request(stream: &mut TcpStream) -> anyhow::Result<Option<Request>> {
    let mut buf = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        anyhow::ensure!(buf.len() <= MAX_REQUEST_BYTES, "request headers too large");
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or("/").split('?').next().unwrap_or("/").to_string();

    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
        .collect();

    let content_length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    anyhow::ensure!(content_length <= MAX_REQUEST_BYTES, "request body too large");

    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);

    Ok(Some(Request { method, path, headers, body }))
}

async fn handle_connection(mut stream: TcpStream, services: Arc<OttoServices>) -> anyhow::Result<()> {
    let Some(request) = read_request(&mut stream).await? else {
        return Ok(());
    };
    let (status, body) = route(&request, services).await;
    stream.write_all(create_response(status, &body).as_bytes()).await?;
    Ok(())
}

async fn route(request: &Request, services: Arc<OttoServices>) -> (u16, Value) {
    let path = match request.path.trim_end_matches('/') {
        "" => "/",
        p => p,
    };
    match (request.method.as_str(), path) {
        ("GET", "/health") => (200, json!({ "status": "ok" })),
        ("OPTIONS", _) => (204, Value::Null),
        ("POST", "/") | ("POST", "/otto") => handle_query(request, services).await,
        _ => (404, json!({ "data": null, "error": "Not found" })),
    }
}

async fn handle_query(request: &Request, services: Arc<OttoServices>) -> (u16, Value) {
    let identity = match request
        .headers
        .get("x-user-profile")
        .map(|raw| serde_json::from_str::<UserProfile>(raw))
    {
        Some(Ok(profile)) => match UserIdentity::new(profile.user_id) {
            Ok(identity) => identity,
            Err(e) => return (401, json!({ "data": null, "error": e.to_string() })),
        },
        Some(Err(_)) => return (400, json!({ "data": null, "error": "Invalid X-User-Profile header" })),
        None => return (401, json!({ "data": null, "error": "Missing X-User-Profile header" })),
    };

    let body: QueryBody = match serde_json::from_slice(&request.body) {
        Ok(body) => body,
        Err(e) => return (400, json!({ "data": null, "error": format!("Invalid request body: {}", e) })),
    };

    let otto = OttoSystem::new(services, identity);
    let response = otto.query(&body.query, body.context).await;
    if let Some(err) = &response.error {
        error!(error = %err, "otto query failed");
        return (500, json!({ "data": null, "error": err }));
    }
    match serde_json::to_value(&response) {
        Ok(data) => (200, json!({ "data": data, "error": null })),
        Err(e) => (500, json!({ "data": null, "error": e.to_string() })),
    }
}

fn create_response(status: u16, body: &Value) -> String {
    let reason = match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        _ => "Internal Server Error",
    };
    let body = if body.is_null() { String::new() } else { body.to_string() };
    format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: application/json\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
         Access-Control-Allow-Headers: Content-Type, X-User-Profile\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    )
}

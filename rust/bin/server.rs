//! HTTP Server for the data source query engine
//! Simple HTTP server using tokio and basic HTTP handling

use easybi_engine::config::EngineConfig;
use easybi_engine::error::EngineError;
use easybi_engine::ingestion::Locator;
use easybi_engine::observability::init_tracing;
use easybi_engine::query::QueryParams;
use easybi_engine::registry::{DataSourceRegistry, NewDataSource};
use easybi_engine::time::TimeBucket;
use easybi_engine::QueryEngine;
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

const MAX_REQUEST_BYTES: usize = 1_000_000;

struct AppState {
    engine: QueryEngine,
    registry: RwLock<DataSourceRegistry>,
}

#[derive(Debug, Deserialize)]
struct PreviewUrlRequest {
    url: String,
    #[serde(rename = "type", default = "default_preview_type")]
    kind: String,
}

fn default_preview_type() -> String {
    "google_sheets".to_string()
}

#[derive(Debug, Deserialize)]
struct InvalidateRequest {
    locator: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();
    init_tracing();

    let config = EngineConfig::from_env()?;
    let registry = DataSourceRegistry::load(&config.registry_path)?;
    let engine = QueryEngine::new(&config)?;
    let state = Arc::new(AppState {
        engine,
        registry: RwLock::new(registry),
    });

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("Data source API listening on {}", config.bind_addr);

    loop {
        let (stream, addr) = listener.accept().await?;
        debug!("New connection from {}", addr);
        tokio::spawn(handle_connection(Arc::clone(&state), stream));
    }
}

async fn handle_connection(state: Arc<AppState>, mut stream: TcpStream) {
    use tokio::time::{timeout, Duration};

    // Read request with timeout to prevent hanging
    let mut buffer = Vec::new();
    let mut temp_buf = [0; 8192];

    let read_result = timeout(Duration::from_secs(5), async {
        loop {
            match stream.read(&mut temp_buf).await {
                Ok(0) => break,
                Ok(n) => {
                    buffer.extend_from_slice(&temp_buf[..n]);
                    if request_complete(&buffer, n < temp_buf.len()) || buffer.len() > MAX_REQUEST_BYTES {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed to read from stream: {}", e);
                    return Err(e);
                }
            }
        }
        Ok(())
    })
    .await;

    match read_result {
        Ok(Ok(())) => {}
        Ok(Err(_)) => return,
        Err(_) => {
            warn!("Request read timeout");
            return;
        }
    }

    if buffer.is_empty() {
        return;
    }

    let response = match String::from_utf8(buffer) {
        Ok(request) => handle_request(&state, &request).await,
        Err(_) => create_response(400, "Bad Request", r#"{"detail":"request is not valid UTF-8"}"#),
    };
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        warn!("Failed to write response: {}", e);
    }
}

/// Headers received and, when a body is announced, all of it.
fn request_complete(buffer: &[u8], short_read: bool) -> bool {
    let Ok(s) = std::str::from_utf8(buffer) else {
        return false;
    };
    let Some(headers_end) = s.find("\r\n\r\n").map(|i| i + 4) else {
        return false;
    };
    match extract_content_length(s) {
        Some(content_length) => buffer.len() >= headers_end + content_length,
        None => short_read,
    }
}

fn extract_content_length(request: &str) -> Option<usize> {
    for line in request.lines() {
        if line.to_lowercase().starts_with("content-length:") {
            if let Some(value) = line.split(':').nth(1) {
                return value.trim().parse().ok();
            }
        }
    }
    None
}

fn request_body(request: &str) -> &str {
    request
        .find("\r\n\r\n")
        .map(|i| request[i + 4..].trim())
        .unwrap_or("")
}

async fn handle_request(state: &AppState, request: &str) -> String {
    let Some(request_line) = request.lines().next() else {
        return create_response(400, "Bad Request", "{}");
    };
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 {
        return create_response(400, "Bad Request", "{}");
    }

    let method = parts[0];
    let url = match Url::parse(&format!("http://localhost{}", parts[1])) {
        Ok(url) => url,
        Err(_) => return create_response(400, "Bad Request", r#"{"detail":"malformed request path"}"#),
    };

    // Normalize path (remove trailing slash except for root)
    let mut path = url.path().trim_end_matches('/').to_string();
    if path.is_empty() {
        path = "/".to_string();
    }
    let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    debug!("Request: {} {}", method, path);

    match (method, path.as_str()) {
        ("OPTIONS", _) => create_response(204, "No Content", ""),
        ("GET", "/api/health") => {
            create_response(200, "OK", r#"{"status":"ok","service":"easybi-engine"}"#)
        }
        ("GET", "/api/datasources") => {
            let registry = state.registry.read().await;
            json_response(200, "OK", &json!(registry.list()))
        }
        ("POST", "/api/datasources") => create_datasource(state, request_body(request)).await,
        ("POST", "/api/datasources/preview-url") => preview_url(state, request_body(request)).await,
        ("POST", "/api/cache/invalidate") => invalidate(state, request_body(request)).await,
        ("GET", "/api/cache/stats") => {
            let entries = state.engine.cache().len();
            json_response(
                200,
                "OK",
                &json!({ "stats": state.engine.cache().stats(), "entries": entries }),
            )
        }
        ("GET", "/api/queries/recent") => {
            let limit = query
                .iter()
                .find(|(k, _)| k == "limit")
                .and_then(|(_, v)| v.parse().ok())
                .unwrap_or(20);
            json_response(200, "OK", &json!(state.engine.logger().recent(limit)))
        }
        (method, path) => match path.strip_prefix("/api/datasources/").map(|rest| rest.split_once('/')) {
            Some(Some((id, "data"))) if method == "GET" => query_datasource(state, id, &query).await,
            Some(None) if method == "DELETE" => {
                let id = path.trim_start_matches("/api/datasources/");
                delete_datasource(state, id).await
            }
            _ => create_response(404, "Not Found", r#"{"detail":"Not Found"}"#),
        },
    }
}

async fn query_datasource(state: &AppState, id: &str, query: &[(String, String)]) -> String {
    let (params, force_refresh) = parse_query_params(query);
    let locator = {
        let registry = state.registry.read().await;
        match registry.get(id) {
            Ok(ds) => ds.locator(),
            Err(e) => return error_response(&e),
        }
    };
    match state.engine.query_table(&locator, &params, force_refresh).await {
        Ok(result) => json_response(200, "OK", &json!(result)),
        Err(e) => error_response(&e),
    }
}

async fn create_datasource(state: &AppState, body: &str) -> String {
    let new: NewDataSource = match serde_json::from_str(body) {
        Ok(new) => new,
        Err(e) => return bad_request(&format!("invalid data source: {}", e)),
    };
    let mut registry = state.registry.write().await;
    let source = registry.register(new);
    if let Err(e) = registry.save() {
        error!("Failed to save registry: {}", e);
        return error_response(&e);
    }
    info!("Registered data source {} ({})", source.id, source.name);
    json_response(200, "OK", &json!(source))
}

async fn delete_datasource(state: &AppState, id: &str) -> String {
    let mut registry = state.registry.write().await;
    if let Err(e) = registry.remove(id) {
        return error_response(&e);
    }
    if let Err(e) = registry.save() {
        error!("Failed to save registry: {}", e);
        return error_response(&e);
    }
    json_response(200, "OK", &json!({ "message": "Datasource deleted" }))
}

async fn preview_url(state: &AppState, body: &str) -> String {
    let request: PreviewUrlRequest = match serde_json::from_str(body) {
        Ok(request) => request,
        Err(e) => return bad_request(&format!("invalid preview request: {}", e)),
    };
    debug!("Previewing {} source {}", request.kind, request.url);
    match state.engine.preview(&Locator::new(request.url.clone())).await {
        Ok(preview) => json_response(200, "OK", &json!({ "preview": preview, "url": request.url })),
        Err(e) => error_response(&e),
    }
}

async fn invalidate(state: &AppState, body: &str) -> String {
    let request: InvalidateRequest = match serde_json::from_str(body) {
        Ok(request) => request,
        Err(e) => return bad_request(&format!("invalid invalidate request: {}", e)),
    };
    let invalidated = state.engine.cache().invalidate(&Locator::new(request.locator));
    json_response(200, "OK", &json!({ "invalidated": invalidated }))
}

/// Query string to parameters plus the `force_refresh` flag. Unknown keys
/// and unknown `group_by` values are ignored.
fn parse_query_params(pairs: &[(String, String)]) -> (QueryParams, bool) {
    let mut params = QueryParams::default();
    let mut force_refresh = false;
    for (key, value) in pairs {
        let value = value.clone();
        match key.as_str() {
            "start_date" => params.start_date = Some(value),
            "end_date" => params.end_date = Some(value),
            "date_column" => params.date_column = Some(value),
            "filter_column" => params.filter_column = Some(value),
            "filter_value" => params.filter_value = Some(value),
            "x_column" => params.x_column = Some(value),
            "y_column" => params.y_column = Some(value),
            "y_column_2" => params.y_column_2 = Some(value),
            "breakdown_column" => params.breakdown_column = Some(value),
            "sort_by" => params.sort_by = Some(value),
            "group_by" => {
                params.group_by = TimeBucket::parse(&value);
                if params.group_by.is_none() && !value.trim().is_empty() {
                    warn!("Ignoring unknown group_by '{}'", value);
                }
            }
            "force_refresh" => force_refresh = matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
            _ => {}
        }
    }
    (params, force_refresh)
}

fn status_for(err: &EngineError) -> (u16, &'static str) {
    match err {
        EngineError::NotFound(_) => (404, "Not Found"),
        EngineError::UnsupportedFormat(_) | EngineError::InvalidSheetUrl(_) => (400, "Bad Request"),
        _ => (500, "Internal Server Error"),
    }
}

fn error_response(err: &EngineError) -> String {
    let (status, text) = status_for(err);
    if status == 500 {
        error!("Request failed: {}", err);
    }
    json_response(status, text, &json!({ "detail": err.to_string() }))
}

fn bad_request(detail: &str) -> String {
    json_response(400, "Bad Request", &json!({ "detail": detail }))
}

fn json_response(status: u16, status_text: &str, body: &serde_json::Value) -> String {
    create_response(status, status_text, &body.to_string())
}

fn create_response(status: u16, status_text: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: application/json\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, POST, PUT, DELETE, OPTIONS\r\n\
         Access-Control-Allow-Headers: Content-Type\r\n\
         Content-Length: {}\r\n\
         \r\n\
         {}",
        status,
        status_text,
        body.len(),
        body
    )
}

//! HTTP view of a running tablestat monitor.
//!
//! Serves the current load table as JSON and HTML, lists saved baselines and
//! accepts the same command keys as the terminal dashboard.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, Json},
    routing::{get, post},
};
use serde::Serialize;

use tablestat_core::{EntityKey, Error, LoadState, Metric, Monitor, SavedFile};

/// Shared server state.
struct AppState {
    monitor: Arc<Monitor>,
}

#[derive(Serialize)]
struct CellEntry {
    metric: &'static str,
    value: String,
    diff: String,
    text: String,
    changed: bool,
}

#[derive(Serialize)]
struct RowEntry {
    entity: String,
    changed: bool,
    cells: Vec<CellEntry>,
}

#[derive(Serialize)]
struct LoadResponse {
    level: &'static str,
    target: String,
    iterations: u64,
    timestamp_ms: u64,
    baseline_ms: u64,
    elapsed_ms: u64,
    sort: String,
    sort_key: char,
    diff_from_start: bool,
    show_changed_only: bool,
    show_rate: bool,
    paused: bool,
    rows: Vec<RowEntry>,
    summary: Vec<CellEntry>,
}

#[derive(Serialize)]
struct SavedResponse {
    files: Vec<SavedFile>,
    total: usize,
}

#[derive(Serialize)]
struct CommandResponse {
    success: bool,
    /// What the command did.
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    /// Error message if the command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    iterations: u64,
    paused: bool,
    entities: usize,
}

// ---------------------------------------------------------------------------
// Snapshot building (one lock acquisition per request)
// ---------------------------------------------------------------------------

fn entity_cells(state: &LoadState, entity: &EntityKey) -> Vec<CellEntry> {
    Metric::ALL
        .iter()
        .map(|&m| CellEntry {
            metric: m.name(),
            value: state.value_string(entity, m),
            diff: state.value_diff(entity, m),
            text: state.cell_text(entity, m),
            changed: state.is_value_changed(entity, m),
        })
        .collect()
}

fn summary_cells(state: &LoadState) -> Vec<CellEntry> {
    Metric::ALL
        .iter()
        .map(|&m| CellEntry {
            metric: m.name(),
            value: state.summary_value_string(m),
            diff: state.summary_diff(m),
            text: state.summary_cell_text(m),
            changed: state.is_summary_changed(m),
        })
        .collect()
}

fn build_load_response(monitor: &Monitor) -> LoadResponse {
    let state = monitor.state();
    let flags = state.flags();
    let rows = state
        .visible_entities()
        .into_iter()
        .map(|e| RowEntry {
            entity: e.to_string(),
            changed: state.is_record_changed(e),
            cells: entity_cells(&state, e),
        })
        .collect();

    LoadResponse {
        level: state.level().column_label(),
        target: monitor.config().target.clone(),
        iterations: state.iterations(),
        timestamp_ms: state.iteration_timestamp(),
        baseline_ms: state.baseline_timestamp(),
        elapsed_ms: state.elapsed_millis(),
        sort: state.sort_description(),
        sort_key: state.sort_spec().key(),
        diff_from_start: flags.diff_from_start,
        show_changed_only: flags.show_changed_only,
        show_rate: flags.show_rate,
        paused: monitor.is_paused(),
        rows,
        summary: summary_cells(&state),
    }
}

/// Client mistakes are 400, everything else (I/O, corrupt files) is 500.
fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::UnknownCommand(_)
        | Error::UnknownSortKey(_)
        | Error::InvalidSelector(_)
        | Error::SelectorOutOfRange { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn command_result(result: tablestat_core::Result<String>) -> (StatusCode, Json<CommandResponse>) {
    match result {
        Ok(message) => (
            StatusCode::OK,
            Json(CommandResponse {
                success: true,
                message: Some(message),
                error: None,
            }),
        ),
        Err(e) => {
            log::warn!("command failed: {e}");
            (
                status_for(&e),
                Json(CommandResponse {
                    success: false,
                    message: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn handle_load(State(state): State<Arc<AppState>>) -> Json<LoadResponse> {
    Json(build_load_response(&state.monitor))
}

async fn handle_saved(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SavedResponse>, (StatusCode, Json<CommandResponse>)> {
    match state.monitor.list_saved() {
        Ok(files) => {
            let total = files.len();
            Ok(Json(SavedResponse { files, total }))
        }
        Err(e) => Err(command_result(Err(e))),
    }
}

async fn handle_command(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> (StatusCode, Json<CommandResponse>) {
    command_result(state.monitor.execute_key(&key))
}

async fn handle_baseline(
    State(state): State<Arc<AppState>>,
    Path(index): Path<String>,
) -> (StatusCode, Json<CommandResponse>) {
    let result = state
        .monitor
        .load(&index)
        .map(|path| format!("baseline loaded from {}", path.display()));
    command_result(result)
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let monitor = &state.monitor;
    let (iterations, entities) = {
        let s = monitor.state();
        (s.iterations(), s.current().len())
    };
    Json(HealthResponse {
        status: if iterations > 0 { "healthy" } else { "starting" },
        iterations,
        paused: monitor.is_paused(),
        entities,
    })
}

async fn handle_view(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(render_html(&build_load_response(&state.monitor)))
}

async fn handle_index(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let config = state.monitor.config();
    Json(serde_json::json!({
        "name": "tablestat",
        "version": tablestat_core::VERSION,
        "target": config.target,
        "level": config.level.column_label(),
        "endpoints": {
            "/": "This API index",
            "/view": "Current load table as HTML",
            "/api/v1/load": "Current rows, summary and view flags as JSON",
            "/api/v1/saved": "Saved baselines for this target, most recent first",
            "/api/v1/command/{key}": {
                "method": "POST",
                "description": "Run a dashboard command",
                "keys": {
                    "d": "toggle diff from start",
                    "c": "toggle changed rows only",
                    "r": "toggle per-second rate",
                    "R": "reset the diff start point",
                    "S": "save the current iteration",
                    "p": "pause or resume polling",
                    "1-9, 0": "sort by value of metric 1..10",
                    "! @ # $ % ^ & * ( )": "sort by diff of metric 1..10",
                    "` ~": "natural order",
                },
            },
            "/api/v1/baseline/{index}": {
                "method": "POST",
                "description": "Load a saved baseline by index and diff from it",
            },
            "/health": "Health check",
        },
        "metrics": Metric::ALL.iter().map(|m| serde_json::json!({
            "ordinal": m.ordinal(),
            "name": m.name(),
        })).collect::<Vec<_>>(),
    }))
}

// ---------------------------------------------------------------------------
// HTML
// ---------------------------------------------------------------------------

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn render_cells(html: &mut String, cells: &[CellEntry]) {
    for cell in cells {
        let class = if cell.changed { " class=\"changed\"" } else { "" };
        html.push_str(&format!("<td{class}>{}</td>", escape_html(&cell.text)));
    }
}

fn render_html(load: &LoadResponse) -> String {
    let mut html = String::from(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>tablestat</title>\
         <style>body{font-family:monospace}td,th{padding:2px 8px;text-align:right}\
         td:first-child{text-align:left}.changed{color:#c00;font-weight:bold}\
         tfoot td{border-top:1px solid #888}</style></head><body>",
    );
    html.push_str(&format!(
        "<p>{} | sort: {} | diff from {} | rate {} | changed only {}{}</p>",
        escape_html(&load.target),
        escape_html(&load.sort),
        if load.diff_from_start { "start" } else { "previous" },
        if load.show_rate { "on" } else { "off" },
        if load.show_changed_only { "on" } else { "off" },
        if load.paused { " | paused" } else { "" },
    ));
    html.push_str("<table><thead><tr>");
    html.push_str(&format!("<th>{}</th>", load.level));
    for m in Metric::ALL {
        html.push_str(&format!("<th>{}:{}</th>", m.ordinal() % 10, m.name()));
    }
    html.push_str("</tr></thead><tbody>");
    for row in &load.rows {
        let class = if row.changed { " class=\"changed\"" } else { "" };
        html.push_str(&format!("<tr><td{class}>{}</td>", escape_html(&row.entity)));
        render_cells(&mut html, &row.cells);
        html.push_str("</tr>");
    }
    html.push_str("</tbody><tfoot><tr><td>Total</td>");
    render_cells(&mut html, &load.summary);
    html.push_str("</tr></tfoot></table></body></html>");
    html
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the axum router over a shared monitor.
pub fn build_router(monitor: Arc<Monitor>) -> Router {
    let state = Arc::new(AppState { monitor });

    Router::new()
        .route("/", get(handle_index))
        .route("/view", get(handle_view))
        .route("/api/v1/load", get(handle_load))
        .route("/api/v1/saved", get(handle_saved))
        .route("/api/v1/command/{key}", post(handle_command))
        .route("/api/v1/baseline/{index}", post(handle_baseline))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Serve the HTTP view until Ctrl+C, then stop the monitor's poll loop.
pub async fn run_server(monitor: Arc<Monitor>, host: &str, port: u16) -> std::io::Result<()> {
    let app = build_router(Arc::clone(&monitor));
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(monitor))
        .await
}

async fn shutdown_signal(monitor: Arc<Monitor>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("cannot listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    monitor.stop();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use json_depot_api::api::{
    CommandBody, CommandRequest, DataBody, Envelope, FilesBody, FilesInfo, HealthResponse,
    MessageBody, SplitBody, SplitIndex, DEFAULT_COMMAND_TIMEOUT_MS, MAX_OUTPUT_BYTES,
    ROUTE_NOT_FOUND,
};
use serde_json::error::Category;
use serde_json::Value;

use crate::config::Config;
use crate::error::ApiError;
use crate::process::Executor;
use crate::store::{Document, FileStore};

/// Everything the handlers need, built once from the [`Config`].
#[derive(Debug)]
pub struct AppState {
    pub store: FileStore,
    pub executor: Executor,
    pub started: Instant,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        AppState {
            store: FileStore::from_config(config),
            executor: Executor::new(MAX_OUTPUT_BYTES),
            started: Instant::now(),
        }
    }
}

type AppResult<T> = Result<Json<Envelope<T>>, ApiError>;

/// Routes under `/api`.
///
/// Unsupported methods on known paths are answered like unknown paths.
pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health).fallback(not_found))
        .route(
            "/data",
            get(read_primary).post(write_primary).fallback(not_found),
        )
        .route(
            "/data2",
            get(read_secondary).post(write_secondary).fallback(not_found),
        )
        .route("/data/:n", get(read_split).fallback(not_found))
        .route("/command", post(run_command).fallback(not_found))
        .route("/files", get(list_files).fallback(not_found))
        .with_state(state)
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound(String::from(ROUTE_NOT_FOUND))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: String::from("ok"),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        uptime: state.started.elapsed().as_secs_f64(),
    })
}

async fn read_primary(State(state): State<Arc<AppState>>) -> AppResult<DataBody> {
    read_document(&state.store, Document::Primary).await
}

async fn read_secondary(State(state): State<Arc<AppState>>) -> AppResult<DataBody> {
    read_document(&state.store, Document::Secondary).await
}

async fn write_primary(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> AppResult<MessageBody> {
    write_document(&state.store, Document::Primary, &body).await
}

async fn write_secondary(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> AppResult<MessageBody> {
    write_document(&state.store, Document::Secondary, &body).await
}

async fn read_document(store: &FileStore, document: Document) -> AppResult<DataBody> {
    // All read failures are 500 here.
    let data = store.read(document).await.map_err(ApiError::internal)?;
    Ok(Json(Envelope::ok(DataBody { data })))
}

async fn write_document(
    store: &FileStore,
    document: Document,
    body: &[u8],
) -> AppResult<MessageBody> {
    if is_blank(body) {
        return Err(ApiError::Validation(String::from(
            "Request body must be a JSON document",
        )));
    }
    let data: Value = parse_body(body)?;
    store
        .write(document, &data)
        .await
        .map_err(ApiError::internal)?;
    log::info!(file:display = store.file_name(document); "document updated");
    Ok(Json(Envelope::ok(MessageBody {
        message: String::from("Data updated successfully"),
    })))
}

async fn read_split(
    State(state): State<Arc<AppState>>,
    Path(n): Path<String>,
) -> AppResult<SplitBody> {
    // Anything that is not a number is as invalid as an index out of range.
    let n = n.trim().parse::<i64>().unwrap_or(0);
    let (index, data) = state.store.read_split(n).await?;
    Ok(Json(Envelope::ok(SplitBody::new(index, data))))
}

async fn run_command(State(state): State<Arc<AppState>>, body: Bytes) -> AppResult<CommandBody> {
    let request: CommandRequest = if is_blank(&body) {
        CommandRequest::default()
    } else {
        parse_body(&body)?
    };
    let Some(command) = request.command.filter(|c| !c.is_empty()) else {
        return Err(ApiError::Validation(String::from("Command is required")));
    };
    // Zero disables the timeout.
    let timeout = match request.timeout.unwrap_or(DEFAULT_COMMAND_TIMEOUT_MS) {
        0 => None,
        ms => Some(Duration::from_millis(ms)),
    };

    let id = fastrand::u64(..);
    log::warn!(id; "executing command: {command}");
    log::debug!(id; "timeout: {timeout:?}");

    match state.executor.execute(id, &command, timeout).await {
        Ok(output) => {
            log::info!(id; "command succeeded");
            Ok(Json(Envelope::ok(CommandBody {
                stdout: output.stdout,
                stderr: output.stderr,
                command,
            })))
        }
        Err(error) => {
            log::info!(id; "command failed: {error}");
            Err(ApiError::Execution { error, command })
        }
    }
}

async fn list_files(State(state): State<Arc<AppState>>) -> AppResult<FilesBody> {
    let store = &state.store;
    let files = store.list_json_files().await.map_err(ApiError::internal)?;
    let mut available_splits: Vec<SplitIndex> = files
        .iter()
        .filter_map(|file| store.split_index_of(file))
        .collect();
    available_splits.sort_unstable();

    Ok(Json(Envelope::ok(FilesBody {
        total_files: files.len(),
        split_files: available_splits.len(),
        files,
        available_splits,
        info: FilesInfo {
            primary: store.file_name(Document::Primary),
            secondary: store.file_name(Document::Secondary),
            split_pattern: store.split_pattern(),
            split_range: [SplitIndex::MIN, SplitIndex::MAX],
        },
    })))
}

fn is_blank(body: &[u8]) -> bool {
    body.iter().all(u8::is_ascii_whitespace)
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| match e.classify() {
            Category::Data => ApiError::Validation(format!("Invalid request body: {e}")),
            _ => ApiError::Validation(format!("Invalid JSON body: {e}")),
        })
}

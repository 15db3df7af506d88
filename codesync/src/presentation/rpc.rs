// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # JSON-RPC Tool Layer
//!
//! A JSON-RPC 2.0 server exposing `tools/list` and `tools/call` over stdio,
//! dispatching to the five tools named in §6: `sync_project_codebase`,
//! `search_project_code`, `get_project_sync_status`, `list_project_files`,
//! `get_file_content`. Each tool's `arguments` are validated against its
//! declared JSON Schema before dispatch; a schema mismatch is reported as
//! JSON-RPC error `-32602`.
//!
//! `search_project_code` is a substring scan over chunk text rather than a
//! vector similarity search — the knowledge store contract in §6 is explicit
//! that similarity search is the store's job and out of this system's scope,
//! so this tool exists for interface completeness, not as a search engine.

use std::sync::Arc;

use codesync_domain::SyncPriority;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, warn};

use super::http::AppState;

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct RpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

#[derive(Debug, Serialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcResponse {
    fn ok(id: Value, result: Value) -> Self {
        Self { jsonrpc: "2.0", id, result: Some(result), error: None }
    }

    fn err(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self { jsonrpc: "2.0", id, result: None, error: Some(RpcError { code, message: message.into() }) }
    }
}

struct ToolDef {
    name: &'static str,
    description: &'static str,
    schema: Value,
}

fn tool_definitions() -> Vec<ToolDef> {
    vec![
        ToolDef {
            name: "sync_project_codebase",
            description: "Trigger synchronization of a project's codebase to the knowledge base",
            schema: json!({
                "type": "object",
                "properties": {
                    "project_id": {"type": "string"},
                    "trigger": {"type": "string", "enum": ["manual", "auto", "git-hook"], "default": "manual"},
                    "changed_files": {"type": "array", "items": {"type": "string"}},
                },
                "required": ["project_id"],
            }),
        },
        ToolDef {
            name: "search_project_code",
            description: "Search for code within a project's synced codebase",
            schema: json!({
                "type": "object",
                "properties": {
                    "project_id": {"type": "string"},
                    "query": {"type": "string"},
                    "match_count": {"type": "integer", "default": 5},
                    "file_filter": {"type": "string"},
                },
                "required": ["project_id", "query"],
            }),
        },
        ToolDef {
            name: "get_project_sync_status",
            description: "Get synchronization status for a project",
            schema: json!({
                "type": "object",
                "properties": {"project_id": {"type": "string"}},
                "required": ["project_id"],
            }),
        },
        ToolDef {
            name: "list_project_files",
            description: "List all files in a synced project",
            schema: json!({
                "type": "object",
                "properties": {
                    "project_id": {"type": "string"},
                    "file_filter": {"type": "string"},
                },
                "required": ["project_id"],
            }),
        },
        ToolDef {
            name: "get_file_content",
            description: "Get content of a specific file from a synced project",
            schema: json!({
                "type": "object",
                "properties": {
                    "project_id": {"type": "string"},
                    "file_path": {"type": "string"},
                },
                "required": ["project_id", "file_path"],
            }),
        },
    ]
}

/// Matches `*`-wildcard glob patterns such as `"*.py"` against a relative
/// path. A pattern without `*` must match exactly.
fn glob_match(pattern: &str, text: &str) -> bool {
    let mut segments = pattern.split('*').peekable();
    let mut rest = text;

    let anchored_start = !pattern.starts_with('*');
    let anchored_end = !pattern.ends_with('*');

    if let Some(first) = segments.next() {
        if anchored_start {
            if !rest.starts_with(first) {
                return false;
            }
            rest = &rest[first.len()..];
        } else if let Some(pos) = rest.find(first) {
            rest = &rest[pos + first.len()..];
        } else if !first.is_empty() {
            return false;
        }
    }

    let mut last_matched_at_end = true;
    for segment in segments {
        if segment.is_empty() {
            continue;
        }
        match rest.find(segment) {
            Some(pos) => {
                rest = &rest[pos + segment.len()..];
                last_matched_at_end = rest.is_empty();
            }
            None => return false,
        }
    }

    !anchored_end || last_matched_at_end
}

pub struct RpcServer {
    state: AppState,
}

impl RpcServer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Reads newline-delimited JSON-RPC requests from `stdin`, dispatches
    /// each, and writes the response as a newline-terminated JSON line to
    /// `stdout`. Runs until stdin closes.
    pub async fn serve_stdio(&self) {
        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut lines = BufReader::new(stdin).lines();

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) => {
                    error!(%err, "json-rpc stdio read error");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            let response = self.handle_line(&line).await;
            let Ok(mut serialized) = serde_json::to_string(&response) else {
                error!("failed to serialize json-rpc response");
                continue;
            };
            serialized.push('\n');
            if let Err(err) = stdout.write_all(serialized.as_bytes()).await {
                error!(%err, "json-rpc stdio write error");
                break;
            }
            let _ = stdout.flush().await;
        }
    }

    async fn handle_line(&self, line: &str) -> RpcResponse {
        let request: RpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(err) => return RpcResponse::err(Value::Null, PARSE_ERROR, format!("parse error: {err}")),
        };
        self.handle(request).await
    }

    async fn handle(&self, request: RpcRequest) -> RpcResponse {
        if request.method.is_empty() {
            return RpcResponse::err(request.id, INVALID_REQUEST, "missing method");
        }

        match request.method.as_str() {
            "tools/list" => {
                let tools: Vec<Value> = tool_definitions()
                    .into_iter()
                    .map(|tool| json!({"name": tool.name, "description": tool.description, "inputSchema": tool.schema}))
                    .collect();
                RpcResponse::ok(request.id, json!({ "tools": tools }))
            }
            "tools/call" => self.handle_tool_call(request.id, request.params).await,
            other => RpcResponse::err(request.id, METHOD_NOT_FOUND, format!("unknown method: {other}")),
        }
    }

    async fn handle_tool_call(&self, id: Value, params: Value) -> RpcResponse {
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return RpcResponse::err(id, INVALID_PARAMS, "missing params.name");
        };
        let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

        let Some(tool) = tool_definitions().into_iter().find(|t| t.name == name) else {
            return RpcResponse::err(id, METHOD_NOT_FOUND, format!("unknown tool: {name}"));
        };

        if let Err(validation_err) = jsonschema::validate(&tool.schema, &arguments) {
            return RpcResponse::err(id, INVALID_PARAMS, format!("invalid arguments for {name}: {validation_err}"));
        }

        let result = match name {
            "sync_project_codebase" => self.sync_project_codebase(arguments).await,
            "search_project_code" => self.search_project_code(arguments).await,
            "get_project_sync_status" => self.get_project_sync_status(arguments).await,
            "list_project_files" => self.list_project_files(arguments).await,
            "get_file_content" => self.get_file_content(arguments).await,
            _ => unreachable!("tool name already matched against tool_definitions"),
        };

        match result {
            Ok(value) => RpcResponse::ok(id, value),
            Err(err) => RpcResponse::err(id, INTERNAL_ERROR, err),
        }
    }

    async fn sync_project_codebase(&self, args: Value) -> Result<Value, String> {
        let project_id = args["project_id"].as_str().ok_or("project_id must be a string")?.to_string();
        let trigger = args.get("trigger").and_then(Value::as_str).unwrap_or("manual");
        let priority = if trigger == "manual" { SyncPriority::Manual } else { SyncPriority::Auto };
        let changed_files = args.get("changed_files").and_then(Value::as_array).map(|files| {
            files.iter().filter_map(Value::as_str).map(std::path::PathBuf::from).collect::<Vec<_>>()
        });

        if let Err(err) = self.state.project_store.get(&project_id).await {
            return Ok(json!({ "success": false, "error": err.user_message() }));
        }

        self.state.sync_queue.enqueue(&project_id, changed_files, priority);
        let sync_engine = Arc::clone(&self.state.sync_engine);
        let outcome = self
            .state
            .sync_queue
            .execute_next(&project_id, move |project_id, changed_files| async move {
                sync_engine.sync_project(&project_id, changed_files).await
            })
            .await;

        match outcome {
            Some(Ok(stats)) => Ok(json!({ "success": true, "project_id": project_id, "result": stats })),
            Some(Err(err)) => Ok(json!({ "success": false, "error": err.user_message() })),
            None => Ok(json!({ "success": false, "error": format!("a sync for project {project_id} is already running") })),
        }
    }

    async fn get_project_sync_status(&self, args: Value) -> Result<Value, String> {
        let project_id = args["project_id"].as_str().ok_or("project_id must be a string")?.to_string();
        let project = match self.state.project_store.get(&project_id).await {
            Ok(project) => project,
            Err(_) => return Ok(json!({ "success": false, "error": "Project not synced yet" })),
        };

        let Some(source_id) = &project.source_id else {
            return Ok(json!({ "success": false, "error": "Project not synced yet" }));
        };

        let total_files = self.state.knowledge_store.count_unique_files(source_id).await.unwrap_or(0);
        let total_chunks =
            self.state.knowledge_store.select_chunk_handles(source_id).await.map(|h| h.len() as u64).unwrap_or(0);

        Ok(json!({
            "success": true,
            "status": {
                "project_id": project_id,
                "source_id": source_id,
                "last_synced": project.last_sync_at,
                "total_files": total_files,
                "total_chunks": total_chunks,
                "sync_enabled": project.auto_sync_enabled,
            }
        }))
    }

    async fn list_project_files(&self, args: Value) -> Result<Value, String> {
        let project_id = args["project_id"].as_str().ok_or("project_id must be a string")?.to_string();
        let file_filter = args.get("file_filter").and_then(Value::as_str);

        let project = match self.state.project_store.get(&project_id).await {
            Ok(project) => project,
            Err(_) => return Ok(json!({ "success": false, "error": "Project not synced yet" })),
        };
        let Some(source_id) = &project.source_id else {
            return Ok(json!({ "success": false, "error": "Project not synced yet" }));
        };

        let handles = match self.state.knowledge_store.select_chunk_handles(source_id).await {
            Ok(handles) => handles,
            Err(err) => return Ok(json!({ "success": false, "error": err.user_message() })),
        };

        let mut files: Vec<String> = handles
            .into_iter()
            .map(|handle| handle.metadata.relative_path)
            .filter(|path| file_filter.map(|pattern| glob_match(pattern, path)).unwrap_or(true))
            .collect();
        files.sort();
        files.dedup();

        Ok(json!({ "success": true, "files": files, "count": files.len() }))
    }

    async fn get_file_content(&self, args: Value) -> Result<Value, String> {
        let project_id = args["project_id"].as_str().ok_or("project_id must be a string")?.to_string();
        let file_path = args["file_path"].as_str().ok_or("file_path must be a string")?.to_string();

        let project = match self.state.project_store.get(&project_id).await {
            Ok(project) => project,
            Err(_) => return Ok(json!({ "success": false, "error": "Project not synced yet" })),
        };
        let Some(source_id) = &project.source_id else {
            return Ok(json!({ "success": false, "error": "Project not synced yet" }));
        };

        let absolute_path = project.local_path.join(&file_path).to_string_lossy().into_owned();
        let mut chunks = match self.state.knowledge_store.select_chunks_by_file(source_id, &absolute_path).await {
            Ok(chunks) => chunks,
            Err(err) => return Ok(json!({ "success": false, "error": err.user_message() })),
        };

        if chunks.is_empty() {
            return Ok(json!({ "success": false, "error": format!("File not found: {file_path}") }));
        }
        chunks.sort_by_key(|chunk| chunk.metadata.chunk_index);

        let language = chunks[0].metadata.language.clone();
        let content = chunks.iter().map(|chunk| chunk.text.as_str()).collect::<Vec<_>>().join("\n");

        Ok(json!({
            "success": true,
            "file_path": file_path,
            "content": content,
            "language": language,
            "chunks_count": chunks.len(),
        }))
    }

    async fn search_project_code(&self, args: Value) -> Result<Value, String> {
        let project_id = args["project_id"].as_str().ok_or("project_id must be a string")?.to_string();
        let query = args["query"].as_str().ok_or("query must be a string")?.to_lowercase();
        let match_count = args.get("match_count").and_then(Value::as_u64).unwrap_or(5) as usize;
        let file_filter = args.get("file_filter").and_then(Value::as_str);

        let project = match self.state.project_store.get(&project_id).await {
            Ok(project) => project,
            Err(_) => return Ok(json!({ "success": false, "error": "Project not synced yet" })),
        };
        let Some(source_id) = &project.source_id else {
            return Ok(json!({ "success": false, "error": "Project not synced yet" }));
        };

        let handles = match self.state.knowledge_store.select_chunk_handles(source_id).await {
            Ok(handles) => handles,
            Err(err) => return Ok(json!({ "success": false, "error": err.user_message() })),
        };

        let mut file_paths: Vec<String> =
            handles.into_iter().map(|handle| handle.metadata.file_path).collect::<std::collections::HashSet<_>>().into_iter().collect();
        file_paths.sort();

        let mut results = Vec::new();
        for file_path in file_paths {
            if results.len() >= match_count {
                break;
            }
            let chunks = match self.state.knowledge_store.select_chunks_by_file(source_id, &file_path).await {
                Ok(chunks) => chunks,
                Err(err) => {
                    warn!(project_id, file_path, %err, "search_project_code: failed to read chunks for file");
                    continue;
                }
            };
            for chunk in chunks {
                if results.len() >= match_count {
                    break;
                }
                if let Some(pattern) = file_filter {
                    if !glob_match(pattern, &chunk.metadata.relative_path) {
                        continue;
                    }
                }
                if chunk.text.to_lowercase().contains(&query) {
                    results.push(json!({
                        "file_path": chunk.metadata.relative_path,
                        "start_line": chunk.metadata.start_line,
                        "end_line": chunk.metadata.end_line,
                        "text": chunk.text,
                    }));
                }
            }
        }

        Ok(json!({ "success": true, "results": results, "count": results.len() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::batch_embedder::{BatchEmbedder, BatchEmbedderConfig};
    use crate::application::services::file_watcher::{FileWatcher, FileWatcherConfig};
    use crate::application::services::sync_engine::{SyncEngine, SyncEngineConfig};
    use crate::application::services::sync_queue::{SyncQueue, SyncQueueConfig};
    use crate::infrastructure::adapters::embedding_provider::FakeEmbeddingProvider;
    use crate::infrastructure::adapters::sqlite_store::SqliteStore;
    use crate::infrastructure::metrics::SyncMetrics;
    use crate::infrastructure::runtime::rate_limiter::{RateLimiter, RateLimiterConfig};
    use crate::application::services::health_monitor::HealthMetrics;
    use codesync_domain::{Project, ProjectStore, SyncMode, SystemClock};
    use parking_lot::Mutex;
    use std::collections::HashMap;

    async fn test_server() -> (RpcServer, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let batch_embedder = Arc::new(BatchEmbedder::new(
            Arc::new(FakeEmbeddingProvider::new(8)),
            RateLimiter::new(RateLimiterConfig::default()),
            BatchEmbedderConfig::default(),
        ));
        let sync_engine = Arc::new(SyncEngine::new(
            store.clone(),
            store.clone(),
            batch_embedder,
            Arc::new(SystemClock),
            SyncEngineConfig::default(),
        ));
        let (file_watcher, _events) = FileWatcher::new(FileWatcherConfig::default());
        let state = AppState {
            sync_engine,
            project_store: store.clone(),
            knowledge_store: store.clone(),
            analytics_store: store.clone(),
            file_watcher,
            sync_queue: Arc::new(SyncQueue::new(SyncQueueConfig::default())),
            metrics: Arc::new(SyncMetrics::default()),
            health_snapshot: Arc::new(|| HealthMetrics {
                healthy: true,
                running: true,
                restart_count: 0,
                failure_count: 0,
                cpu_percent: 0.0,
                memory_mb: 0.0,
                watched_projects: 0,
                pending_events: 0,
                time_since_heartbeat: None,
            }),
            last_sync_duration: Arc::new(Mutex::new(HashMap::new())),
        };
        (RpcServer::new(state), store)
    }

    #[tokio::test]
    async fn tools_list_returns_all_five_tools() {
        let (server, _store) = test_server().await;
        let response = server.handle(RpcRequest { id: json!(1), method: "tools/list".to_string(), params: Value::Null }).await;
        let tools = response.result.unwrap()["tools"].as_array().unwrap().len();
        assert_eq!(tools, 5);
    }

    #[tokio::test]
    async fn tools_call_rejects_missing_required_argument() {
        let (server, _store) = test_server().await;
        let params = json!({ "name": "get_file_content", "arguments": { "project_id": "p1" } });
        let response = server.handle(RpcRequest { id: json!(1), method: "tools/call".to_string(), params }).await;
        let error = response.error.unwrap();
        assert_eq!(error.code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn tools_call_rejects_an_unknown_tool() {
        let (server, _store) = test_server().await;
        let params = json!({ "name": "delete_everything", "arguments": {} });
        let response = server.handle(RpcRequest { id: json!(1), method: "tools/call".to_string(), params }).await;
        let error = response.error.unwrap();
        assert_eq!(error.code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn get_project_sync_status_reports_unsynced_projects() {
        let (server, store) = test_server().await;
        let dir = tempfile::tempdir().unwrap();
        let project = Project::new("p1", dir.path().to_path_buf(), SyncMode::Manual);
        store.upsert_project(&project).await.unwrap();

        let params = json!({ "name": "get_project_sync_status", "arguments": { "project_id": "p1" } });
        let response = server.handle(RpcRequest { id: json!(1), method: "tools/call".to_string(), params }).await;
        let result = response.result.unwrap();
        assert_eq!(result["success"], json!(false));
    }

    #[tokio::test]
    async fn unknown_method_returns_method_not_found() {
        let (server, _store) = test_server().await;
        let response = server.handle(RpcRequest { id: json!(1), method: "frobnicate".to_string(), params: Value::Null }).await;
        let error = response.error.unwrap();
        assert_eq!(error.code, METHOD_NOT_FOUND);
    }

    #[test]
    fn glob_match_handles_extension_wildcard() {
        assert!(glob_match("*.py", "src/main.py"));
        assert!(!glob_match("*.py", "src/main.rs"));
    }

    #[test]
    fn glob_match_handles_exact_pattern() {
        assert!(glob_match("src/main.py", "src/main.py"));
        assert!(!glob_match("src/main.py", "src/other.py"));
    }

    #[test]
    fn glob_match_handles_leading_and_trailing_wildcard() {
        assert!(glob_match("*main*", "src/main.py"));
        assert!(!glob_match("*main*", "src/other.py"));
    }
}

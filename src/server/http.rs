use crate::chat::QueryService;
use crate::config::Config;
use crate::error::{CampusRagError, Result};
use crate::history::{ChatHistory, Role};
use crate::store::StoreProvider;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    provider: Arc<StoreProvider>,
    service: Arc<QueryService>,
    history: Arc<Mutex<ChatHistory>>,
    /// `None` disables every admin endpoint
    admin_password: Option<String>,
    no_answer_message: String,
}

impl AppState {
    pub fn new(
        provider: Arc<StoreProvider>,
        service: Arc<QueryService>,
        history: ChatHistory,
        admin_password: Option<String>,
        no_answer_message: String,
    ) -> Self {
        Self {
            provider,
            service,
            history: Arc::new(Mutex::new(history)),
            admin_password,
            no_answer_message,
        }
    }
}

/// HTTP front end for chat and document administration
pub struct HttpServer {
    state: AppState,
    allowed_origins: Vec<String>,
    max_upload_bytes: usize,
}

impl HttpServer {
    pub fn new(
        config: &Config,
        provider: Arc<StoreProvider>,
        service: Arc<QueryService>,
    ) -> Self {
        let admin_password = std::env::var(&config.server.admin_password_env)
            .ok()
            .filter(|p| !p.is_empty());
        if admin_password.is_none() {
            log::warn!(
                "{} is not set; admin endpoints will reject every request",
                config.server.admin_password_env
            );
        }

        let history = ChatHistory::open(&config.app.history_file);
        Self {
            state: AppState::new(
                provider,
                service,
                history,
                admin_password,
                config.chat.no_answer_message.clone(),
            ),
            allowed_origins: config.server.allowed_origins.clone(),
            max_upload_bytes: config.server.max_upload_bytes,
        }
    }

    /// Run the HTTP server until the process is stopped
    pub async fn run(&self, port: u16) -> Result<()> {
        let addr = format!("0.0.0.0:{}", port);
        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            CampusRagError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to bind to {}: {}", addr, e),
            ))
        })?;
        log::info!("Campus RAG listening on http://{}", addr);

        axum::serve(listener, self.router())
            .await
            .map_err(|e| CampusRagError::Io(std::io::Error::other(format!("HTTP server error: {}", e))))?;
        Ok(())
    }

    pub fn router(&self) -> Router {
        let cors = if self.allowed_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<axum::http::HeaderValue> = self
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        router(self.state.clone(), self.max_upload_bytes).layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
    }
}

/// Routes without the outer CORS/trace layers
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/chat", post(handle_chat))
        .route("/history", get(handle_history))
        .route("/stats", get(handle_stats))
        .route("/upload", post(handle_upload))
        .route("/reset", post(handle_reset))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

fn status_for(err: &CampusRagError) -> StatusCode {
    match err {
        CampusRagError::InvalidInput(_) | CampusRagError::Extract(_) => StatusCode::BAD_REQUEST,
        CampusRagError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        CampusRagError::Embedding(_) | CampusRagError::Llm(_) => StatusCode::BAD_GATEWAY,
        CampusRagError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        CampusRagError::Database(_) | CampusRagError::Io(_) | CampusRagError::Config(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(err: CampusRagError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        log::error!("Request failed: {}", err);
    }
    (status, Json(serde_json::json!({ "error": err.to_string() }))).into_response()
}

/// Require `Authorization: Bearer <admin password>`
fn validate_admin(headers: &HeaderMap, expected: Option<&str>) -> Result<()> {
    let expected = expected
        .ok_or_else(|| CampusRagError::Unauthorized("admin access is not configured".to_string()))?;

    let provided = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| {
            CampusRagError::Unauthorized("use 'Authorization: Bearer <password>'".to_string())
        })?;

    if provided != expected {
        return Err(CampusRagError::Unauthorized("invalid admin password".to_string()));
    }
    Ok(())
}

async fn handle_health() -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "campus-rag",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
        .into_response()
}

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: String,
}

async fn handle_chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Response {
    let message = request.message.trim();
    if message.is_empty() {
        return error_response(CampusRagError::InvalidInput("message is empty".to_string()));
    }

    state.history.lock().await.add_message(Role::User, message, Vec::new());

    let answer = match state.service.answer(message).await {
        Ok(answer) => answer,
        Err(e) => return error_response(e),
    };
    let reply = answer.render(&state.no_answer_message);
    let sources = answer.sources().to_vec();

    state
        .history
        .lock()
        .await
        .add_message(Role::Assistant, &reply, sources.clone());

    Json(serde_json::json!({
        "reply": reply,
        "sources": sources,
        "found": answer.is_found(),
    }))
    .into_response()
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

async fn handle_history(State(state): State<AppState>, Query(query): Query<HistoryQuery>) -> Response {
    let history = state.history.lock().await;
    let entries = history.recent(query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT));
    Json(entries).into_response()
}

async fn handle_stats(State(state): State<AppState>) -> Response {
    match state.provider.stats().await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => error_response(e),
    }
}

async fn handle_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if let Err(e) = validate_admin(&headers, state.admin_password.as_deref()) {
        return error_response(e);
    }

    let mut upload = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return error_response(CampusRagError::InvalidInput(format!("Malformed upload: {}", e)))
            }
        };
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        match field.bytes().await {
            Ok(bytes) => upload = Some((name, bytes)),
            Err(e) => {
                return error_response(CampusRagError::InvalidInput(format!("Malformed upload: {}", e)))
            }
        }
        break;
    }

    let Some((name, bytes)) = upload else {
        return error_response(CampusRagError::InvalidInput("missing 'file' field".to_string()));
    };

    match state.provider.stage_and_ingest(&name, &bytes).await {
        Ok(upload) => Json(upload).into_response(),
        Err(e) => error_response(e),
    }
}

async fn handle_reset(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(e) = validate_admin(&headers, state.admin_password.as_deref()) {
        return error_response(e);
    }

    match state.provider.reset().await {
        Ok(report) => Json(report).into_response(),
        Err(e) => error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatMessage, ChatModel};
    use crate::embeddings::Embedder;
    use crate::store::sqlite::tests::LetterEmbedder;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct EchoModel;

    #[async_trait]
    impl ChatModel for EchoModel {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            Ok("Theo tài liệu, học phí là 20 triệu.".to_string())
        }

        fn model(&self) -> &str {
            "echo"
        }
    }

    async fn test_router(temp: &TempDir) -> (Router, Config) {
        let mut config = Config::from_toml_str(
            r#"
[app]
[embeddings]
provider = "openai"
model = "text-embedding-3-small"
api_key_env = "OPENAI_API_KEY"
batch_size = 16
dimensions = 26
"#,
        )
        .unwrap();
        config.app.pending_dir = temp.path().join("new_docs");
        config.app.committed_dir = temp.path().join("old_docs");
        config.app.store_dir = temp.path().join("kb");
        config.app.history_file = temp.path().join("chat_history.json");
        config.ensure_directories().unwrap();

        let embedder: Arc<dyn Embedder> = Arc::new(LetterEmbedder);
        let provider = Arc::new(StoreProvider::open(&config, Arc::clone(&embedder)).await.unwrap());
        let service = Arc::new(QueryService::new(
            Arc::clone(&provider),
            embedder,
            Arc::new(EchoModel),
            &config.chat,
        ));
        let state = AppState::new(
            provider,
            service,
            ChatHistory::open(&config.app.history_file),
            Some("secret".to_string()),
            config.chat.no_answer_message.clone(),
        );
        (router(state, 1024 * 1024), config)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn multipart_request(file_name: &str, content: &str, token: Option<&str>) -> Request<Body> {
        let boundary = "XBOUNDARYX";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: text/plain\r\n\r\n{c}\r\n--{b}--\r\n",
            b = boundary,
            f = file_name,
            c = content
        );
        let mut builder = Request::builder()
            .method("POST")
            .uri("/upload")
            .header("content-type", format!("multipart/form-data; boundary={}", boundary));
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&CampusRagError::InvalidInput("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&CampusRagError::Unauthorized("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(&CampusRagError::Llm("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_for(&CampusRagError::Database(rusqlite::Error::InvalidQuery)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validate_admin() {
        let mut headers = HeaderMap::new();
        assert!(validate_admin(&headers, Some("pw")).is_err());
        headers.insert("authorization", "Bearer pw".parse().unwrap());
        assert!(validate_admin(&headers, Some("pw")).is_ok());
        assert!(validate_admin(&headers, Some("other")).is_err());
        assert!(validate_admin(&headers, None).is_err());
    }

    #[tokio::test]
    async fn test_health() {
        let temp = TempDir::new().unwrap();
        let (app, _) = test_router(&temp).await;
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["service"], "campus-rag");
    }

    #[tokio::test]
    async fn test_upload_requires_admin() {
        let temp = TempDir::new().unwrap();
        let (app, config) = test_router(&temp).await;
        let response = app
            .oneshot(multipart_request("a.txt", "Hello PTIT", Some("wrong")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(!config.pending_dir().join("a.txt").exists());
    }

    #[tokio::test]
    async fn test_upload_then_chat() {
        let temp = TempDir::new().unwrap();
        let (app, config) = test_router(&temp).await;

        let response = app
            .clone()
            .oneshot(multipart_request("hocphi.txt", "hoc phi nam hoc", Some("secret")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["report"]["chunks_added"], 1);
        assert!(config.committed_dir().join("hocphi.txt").exists());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"message":"hoc phi"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["found"], true);
        assert_eq!(body["sources"][0], "hocphi.txt");

        let response = app
            .oneshot(Request::builder().uri("/history?limit=1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["role"], "assistant");
    }

    #[tokio::test]
    async fn test_chat_empty_message_is_bad_request() {
        let temp = TempDir::new().unwrap();
        let (app, _) = test_router(&temp).await;
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"message":"  "}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_without_documents_uses_fallback_sentence() {
        let temp = TempDir::new().unwrap();
        let (app, config) = test_router(&temp).await;
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"message":"diem chuan"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["found"], false);
        assert_eq!(body["reply"], config.chat.no_answer_message.as_str());
    }

    #[tokio::test]
    async fn test_upload_reports_sanitized_name() {
        let temp = TempDir::new().unwrap();
        let (app, config) = test_router(&temp).await;
        let response = app
            .oneshot(multipart_request("../../khoa/lich_thi.txt", "lich thi ca mot", Some("secret")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["file_name"], "lich_thi.txt");
        assert!(config.committed_dir().join("lich_thi.txt").exists());
    }

    #[tokio::test]
    async fn test_reset_and_stats() {
        let temp = TempDir::new().unwrap();
        let (app, config) = test_router(&temp).await;
        std::fs::write(config.committed_dir().join("a.txt"), "alpha").unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/reset")
                    .header("authorization", "Bearer secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["chunks_added"], 1);

        let response = app
            .oneshot(Request::builder().uri("/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["chunks"], 1);
        assert_eq!(body["committed_files"], 1);
    }
}

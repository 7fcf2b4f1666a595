//! HTTP surface.
//!
//! Routes:
//! - `GET /` health
//! - `GET /test-db` store round trip
//! - `GET /scrape-and-extract` ingest the newest feed article now
//! - `POST /chat` `{question, history}` -> answer from the graph
//! - `GET /graph` bounded export for visualization
//! - `GET /metrics` Prometheus text format
//!
//! Every response carries permissive CORS headers.

use std::convert::Infallible;
use std::error::Error as StdError;
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE,
};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::graphrag::{ArticleOutcome, IngestionPipeline, QaPipeline};
use crate::metrics;
use crate::models::ChatTurn;
use crate::store::GraphStore;
use crate::Result;

type HttpResponse = Response<Full<Bytes>>;

/// Largest accepted `/chat` request body.
pub const MAX_CHAT_BODY_BYTES: usize = 64 * 1024;

/// Shared handles for request handlers.
pub struct AppState {
    pub store: Arc<dyn GraphStore>,
    pub qa: QaPipeline,
    pub ingestion: IngestionPipeline,
    pub graph_export_limit: usize,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    question: String,
    #[serde(default)]
    history: Vec<ChatTurn>,
}

fn json_response(status: StatusCode, body: &Value) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn error_response(status: StatusCode, message: impl Display) -> HttpResponse {
    json_response(status, &json!({ "error": message.to_string() }))
}

fn with_cors(mut response: HttpResponse) -> HttpResponse {
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    response
}

fn route_label(path: &str) -> &'static str {
    match path {
        "/" => "/",
        "/test-db" => "/test-db",
        "/scrape-and-extract" => "/scrape-and-extract",
        "/chat" => "/chat",
        "/graph" => "/graph",
        "/metrics" => "/metrics",
        _ => "unknown",
    }
}

/// Route one request.
pub async fn handle_request<B>(state: Arc<AppState>, req: Request<B>) -> HttpResponse
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match (&method, path.as_str()) {
        (&Method::OPTIONS, _) => {
            let mut response = Response::new(Full::new(Bytes::new()));
            *response.status_mut() = StatusCode::NO_CONTENT;
            response
        }
        (&Method::GET, "/") => json_response(
            StatusCode::OK,
            &json!({ "status": "online", "message": "Graph Database System Ready" }),
        ),
        (&Method::GET, "/test-db") => test_db(&state).await,
        (&Method::GET, "/scrape-and-extract") => scrape_and_extract(&state).await,
        (&Method::POST, "/chat") => chat(&state, req).await,
        (&Method::GET, "/graph") => graph(&state).await,
        (&Method::GET, "/metrics") => metrics_response(),
        _ => error_response(StatusCode::NOT_FOUND, "Not found"),
    };

    metrics::record_http(route_label(&path), response.status().as_u16());
    with_cors(response)
}

async fn test_db(state: &AppState) -> HttpResponse {
    match state.store.ping().await {
        Ok(message) => json_response(StatusCode::OK, &json!({ "neo4j_response": message })),
        Err(e) => {
            error!("Store ping failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

async fn scrape_and_extract(state: &AppState) -> HttpResponse {
    let (article, outcome) = match state.ingestion.ingest_latest().await {
        Ok(Some(found)) => found,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "No articles found"),
        Err(e) => {
            error!("Manual ingestion failed: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e);
        }
    };

    info!(title = %article.title, outcome = outcome.label(), "🧠 Manual ingestion");
    match outcome {
        ArticleOutcome::Merged { fragment, result } => json_response(
            StatusCode::OK,
            &json!({
                "message": "Graph built successfully!",
                "article_title": article.title,
                "data": fragment,
                "merge": result,
            }),
        ),
        ArticleOutcome::Duplicate => json_response(
            StatusCode::OK,
            &json!({
                "message": "Article already ingested",
                "article_title": article.title,
            }),
        ),
        ArticleOutcome::ExtractionFailed(detail) => json_response(
            StatusCode::BAD_GATEWAY,
            &json!({ "error": "AI extraction failed", "detail": detail }),
        ),
        ArticleOutcome::MergeFailed(detail) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, detail)
        }
    }
}

async fn chat<B>(state: &AppState, req: Request<B>) -> HttpResponse
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let body = match Limited::new(req.into_body(), MAX_CHAT_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            return error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("body exceeds {} bytes", MAX_CHAT_BODY_BYTES),
            );
        }
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };
    let request: ChatRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("invalid body: {}", e)),
    };

    match state.qa.answer(&request.question, &request.history).await {
        Ok(answer) => json_response(
            StatusCode::OK,
            &json!({
                "entity": answer.entity_label(),
                "entities": answer.entities,
                "context": answer.context,
                "answer": answer.answer,
                "outcome": answer.outcome,
            }),
        ),
        Err(e) => {
            error!("Chat failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

async fn graph(state: &AppState) -> HttpResponse {
    let export = match state.store.export_graph(state.graph_export_limit).await {
        Ok(export) => export,
        Err(e) => {
            error!("Graph export failed: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e);
        }
    };
    match serde_json::to_value(&export) {
        Ok(value) => json_response(StatusCode::OK, &value),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

fn metrics_response() -> HttpResponse {
    match metrics::render() {
        Ok((content_type, buffer)) => {
            let mut response = Response::new(Full::new(Bytes::from(buffer)));
            if let Ok(value) = HeaderValue::from_str(&content_type) {
                response.headers_mut().insert(CONTENT_TYPE, value);
            }
            response
        }
        Err(err) => {
            error!("Failed to encode metrics: {}", err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "encode error")
        }
    }
}

/// Serve until `shutdown` turns `true` or its sender is dropped.
pub async fn serve(
    addr: SocketAddr,
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "🌐 HTTP server started");

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => accepted?,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        };

        let state = state.clone();
        let service = service_fn(move |req| {
            let state = state.clone();
            async move { Ok::<_, Infallible>(handle_request(state, req).await) }
        });
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(?peer, "HTTP connection error: {}", err);
            }
        });
    }

    info!("🛑 HTTP server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IngestConfig, QaConfig};
    use crate::feed::StaticSource;
    use crate::graphrag::Extractor;
    use crate::integrations::{LanguageModel, LlmRequest};
    use crate::models::{Article, Edge, Node, Sentiment};
    use crate::config::NodeTypePolicy;
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    /// Names nobody, extracts a single Apple node, answers "ok".
    struct QuietModel;

    #[async_trait]
    impl LanguageModel for QuietModel {
        async fn complete(&self, request: &LlmRequest) -> Result<String> {
            if request.system.contains("Knowledge Graph") {
                return Ok(r#"{"nodes": [{"id": "Apple Inc.", "type": "Company"}], "edges": []}"#.to_string());
            }
            if request.system.contains("Entity Extractor") {
                return Ok("None".to_string());
            }
            Ok("ok".to_string())
        }
    }

    fn state(store: Arc<MemoryStore>) -> Arc<AppState> {
        let model: Arc<dyn LanguageModel> = Arc::new(QuietModel);
        let source = StaticSource::new(vec![
            Article::new("Apple Introduces Apple Intelligence", "iOS").with_link("https://x/1"),
        ]);
        Arc::new(AppState {
            store: store.clone(),
            qa: QaPipeline::new(model.clone(), store.clone(), &QaConfig::default()),
            ingestion: IngestionPipeline::new(
                Arc::new(source),
                Extractor::new(model),
                store,
                &IngestConfig::default(),
                3,
            ),
            graph_export_limit: 500,
        })
    }

    fn request(method: Method, path: &str, body: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    async fn body_json(response: HttpResponse) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn root_reports_online_with_cors() {
        let response = handle_request(state(Arc::new(MemoryStore::new())), request(Method::GET, "/", "")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
        assert_eq!(body_json(response).await["status"], "online");
    }

    #[tokio::test]
    async fn preflight_is_accepted() {
        let response =
            handle_request(state(Arc::new(MemoryStore::new())), request(Method::OPTIONS, "/chat", "")).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.headers().contains_key(ACCESS_CONTROL_ALLOW_METHODS));
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let response =
            handle_request(state(Arc::new(MemoryStore::new())), request(Method::GET, "/nope", "")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_db_pings_store() {
        let response =
            handle_request(state(Arc::new(MemoryStore::new())), request(Method::GET, "/test-db", "")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_json(response).await["neo4j_response"].is_string());
    }

    #[tokio::test]
    async fn chat_rejects_malformed_body() {
        let response = handle_request(
            state(Arc::new(MemoryStore::new())),
            request(Method::POST, "/chat", "{\"history\": []}"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn chat_rejects_oversized_body() {
        let question = "x".repeat(MAX_CHAT_BODY_BYTES + 1);
        let body = json!({ "question": question }).to_string();

        let response = handle_request(
            state(Arc::new(MemoryStore::new())),
            request(Method::POST, "/chat", &body),
        )
        .await;

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(response.headers().contains_key(ACCESS_CONTROL_ALLOW_ORIGIN));
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn chat_on_empty_graph() {
        let response = handle_request(
            state(Arc::new(MemoryStore::new())),
            request(Method::POST, "/chat", r#"{"question": "What's happening in AI?"}"#),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["answer"], "The graph is currently empty.");
        assert_eq!(body["outcome"], "empty_graph");
        assert_eq!(body["entity"], "['Global Context']");
    }

    #[tokio::test]
    async fn scrape_and_extract_merges_first_article() {
        let store = Arc::new(MemoryStore::new());
        let app = state(store.clone());

        let response = handle_request(app.clone(), request(Method::GET, "/scrape-and-extract", "")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["article_title"], "Apple Introduces Apple Intelligence");
        assert_eq!(body["data"]["nodes"][0]["id"], "Apple");
        assert_eq!(store.node_count(), 1);

        let again = handle_request(app, request(Method::GET, "/scrape-and-extract", "")).await;
        assert_eq!(body_json(again).await["message"], "Article already ingested");
    }

    #[tokio::test]
    async fn graph_export_shape() {
        let store = Arc::new(MemoryStore::new());
        for node in [Node::new("Microsoft", "Company"), Node::new("OpenAI", "Company")] {
            store.upsert_node(&node, NodeTypePolicy::FirstWins).await.unwrap();
        }
        store
            .upsert_edge(&Edge::new("Microsoft", "OpenAI", "INVESTED_IN", Sentiment::Positive))
            .await
            .unwrap();

        let response = handle_request(state(store), request(Method::GET, "/graph", "")).await;
        let body = body_json(response).await;

        assert_eq!(body["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(body["nodes"][0]["group"], "Company");
        assert_eq!(body["links"][0]["relationship"], "INVESTED_IN");
        assert_eq!(body["links"][0]["sentiment"], "Positive");
    }

    #[tokio::test]
    async fn metrics_endpoint_exposes_text_format() {
        let response =
            handle_request(state(Arc::new(MemoryStore::new())), request(Method::GET, "/metrics", "")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&bytes).contains("insider_graph_"));
    }
}

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::{Map, Value};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::coordinator::{BoardSummary, PositionCoordinator};
use crate::engine::{EngineParameters, SearchEngine, TopMove};
use crate::error::{ConfigError, CoordinatorError};
use crate::moves::{MoveInfo, MoveRequest};

const DEFAULT_TOP_MOVES: usize = 3;
const MAX_TOP_MOVES: usize = 50;

type Shared<E> = State<Arc<PositionCoordinator<E>>>;
type ApiResult<T> = Result<Reply<T>, CoordinatorError>;

#[derive(Serialize)]
struct Envelope<T> {
    #[serde(rename = "App/Inf")]
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<T>,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    #[serde(rename = "App/Err")]
    message: String,
}

/// A successful answer, with or without a value.
pub struct Reply<T>(Option<T>);

impl Reply<()> {
    fn ok() -> Reply<()> {
        Reply(None)
    }
}

impl<T> Reply<T> {
    fn value(value: T) -> Reply<T> {
        Reply(Some(value))
    }
}

impl<T: Serialize> IntoResponse for Reply<T> {
    fn into_response(self) -> Response {
        let envelope = Envelope {
            status: "Ok",
            value: self.0,
        };

        (StatusCode::OK, Json(envelope)).into_response()
    }
}

impl CoordinatorError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CoordinatorError::InvalidPosition(_)
            | CoordinatorError::MalformedMove(_)
            | CoordinatorError::IllegalMove(_)
            | CoordinatorError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            CoordinatorError::SearchEngineUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoordinatorError::NotFound => StatusCode::NOT_FOUND,
            // existing clients expect 504 here
            CoordinatorError::UnsupportedMethod => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for CoordinatorError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!("{status}: {self}");
        } else {
            debug!("{status}: {self}");
        }

        let envelope = ErrorEnvelope {
            message: self.to_string(),
        };

        (status, Json(envelope)).into_response()
    }
}

/// Lets browser clients on `origin` call the api, `*` allows every origin.
pub fn cors_layer(origin: &str) -> Result<CorsLayer, ConfigError> {
    let allow_origin = if origin.trim() == "*" {
        AllowOrigin::any()
    } else {
        let origin = HeaderValue::from_str(origin.trim())
            .map_err(|_| ConfigError::CorsOrigin(origin.to_string()))?;
        AllowOrigin::exact(origin)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::PUT,
            Method::POST,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers(Any))
}

pub fn router<E: SearchEngine + 'static>(
    coordinator: Arc<PositionCoordinator<E>>,
    cors: CorsLayer,
) -> Router {
    Router::new()
        .route(
            "/fen",
            get(get_fen::<E>).put(put_fen::<E>).fallback(unsupported),
        )
        .route(
            "/move",
            get(get_move::<E>)
                .put(put_move::<E>)
                .delete(delete_move::<E>)
                .post(post_move::<E>)
                .fallback(unsupported),
        )
        .route("/moves", get(get_moves::<E>).fallback(unsupported))
        .route("/topMoves", get(get_top_moves::<E>).fallback(unsupported))
        .route(
            "/boardInformation",
            get(get_board_information::<E>)
                .delete(delete_board_information::<E>)
                .put(put_board_information::<E>)
                .fallback(unsupported),
        )
        .route(
            "/stockfishParameters",
            get(get_parameters::<E>)
                .patch(patch_parameters::<E>)
                .fallback(unsupported),
        )
        .fallback(not_found)
        .with_state(coordinator)
        .layer(cors)
}

pub async fn run_http<E: SearchEngine + 'static>(
    addr: &str,
    coordinator: Arc<PositionCoordinator<E>>,
    cors: CorsLayer,
) -> io::Result<()> {
    let app = router(coordinator, cors);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("could not listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn unsupported() -> CoordinatorError {
    CoordinatorError::UnsupportedMethod
}

async fn not_found() -> CoordinatorError {
    CoordinatorError::NotFound
}

async fn get_fen<E: SearchEngine>(State(coordinator): Shared<E>) -> ApiResult<String> {
    Ok(Reply::value(coordinator.get_fen().await))
}

async fn put_fen<E: SearchEngine>(State(coordinator): Shared<E>, fen: String) -> ApiResult<()> {
    coordinator.set_fen(&fen).await?;
    Ok(Reply::ok())
}

async fn get_move<E: SearchEngine>(State(coordinator): Shared<E>) -> ApiResult<Option<String>> {
    Ok(Reply::value(coordinator.get_best_move().await?))
}

async fn put_move<E: SearchEngine>(State(coordinator): Shared<E>, body: Bytes) -> ApiResult<()> {
    let request: MoveRequest = serde_json::from_slice(&body).map_err(|err| {
        CoordinatorError::MalformedMove(format!(
            "wrong from or to for move {}: {err}",
            String::from_utf8_lossy(&body)
        ))
    })?;

    coordinator.apply_move(&request).await?;
    Ok(Reply::ok())
}

async fn delete_move<E: SearchEngine>(
    State(coordinator): Shared<E>,
) -> ApiResult<Option<String>> {
    Ok(Reply::value(coordinator.undo_last_move().await?))
}

async fn post_move<E: SearchEngine>(State(coordinator): Shared<E>) -> ApiResult<Option<MoveInfo>> {
    Ok(Reply::value(coordinator.apply_engine_best_move().await?))
}

async fn get_moves<E: SearchEngine>(State(coordinator): Shared<E>) -> ApiResult<Vec<MoveInfo>> {
    Ok(Reply::value(coordinator.list_legal_moves().await))
}

async fn get_top_moves<E: SearchEngine>(
    State(coordinator): Shared<E>,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResult<Vec<TopMove>> {
    let count = match query.get("count") {
        None => DEFAULT_TOP_MOVES,
        Some(count) => count
            .parse::<usize>()
            .map_err(|_| CoordinatorError::InvalidParameter(format!("count = {count}")))?
            .clamp(1, MAX_TOP_MOVES),
    };

    Ok(Reply::value(coordinator.get_top_moves(count).await?))
}

async fn get_board_information<E: SearchEngine>(
    State(coordinator): Shared<E>,
) -> ApiResult<BoardSummary> {
    let summary = coordinator.get_board_summary().await;
    debug!("GET /boardInformation: {summary:?}");
    Ok(Reply::value(summary))
}

async fn delete_board_information<E: SearchEngine>(State(coordinator): Shared<E>) -> ApiResult<()> {
    coordinator.reset_to_start().await?;
    Ok(Reply::ok())
}

async fn put_board_information<E: SearchEngine>(State(coordinator): Shared<E>) -> ApiResult<()> {
    coordinator.mirror_board().await?;
    Ok(Reply::ok())
}

async fn get_parameters<E: SearchEngine>(
    State(coordinator): Shared<E>,
) -> ApiResult<EngineParameters> {
    Ok(Reply::value(coordinator.get_engine_parameters().await))
}

async fn patch_parameters<E: SearchEngine>(
    State(coordinator): Shared<E>,
    body: Bytes,
) -> ApiResult<()> {
    let settings: Map<String, Value> = serde_json::from_slice(&body).map_err(|err| {
        CoordinatorError::InvalidParameter(format!("body is not a json object: {err}"))
    })?;

    coordinator.set_engine_parameters(&settings).await?;
    Ok(Reply::ok())
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::config::DEFAULT_CORS_ORIGIN;
    use crate::engine::scripted::ScriptedEngine;
    use crate::fen::START_FEN;

    async fn app() -> (Router, ScriptedEngine) {
        let engine = ScriptedEngine::new();
        let coordinator = PositionCoordinator::new(engine.clone()).await.unwrap();
        let cors = cors_layer(DEFAULT_CORS_ORIGIN).unwrap();
        (router(Arc::new(coordinator), cors), engine)
    }

    async fn call(app: &Router, method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn get_fen_at_start() {
        let (app, _) = app().await;

        let (status, body) = call(&app, Method::GET, "/fen", "").await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!(json!({"App/Inf": "Ok", "value": START_FEN}), body);
    }

    #[tokio::test]
    async fn put_move_then_get_fen() {
        let (app, engine) = app().await;

        let (status, body) =
            call(&app, Method::PUT, "/move", r#"{"from": "e2", "to": "e4"}"#).await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!(json!({"App/Inf": "Ok"}), body);

        let (_, body) = call(&app, Method::GET, "/fen", "").await;
        let fen = body["value"].as_str().unwrap().to_string();
        assert_eq!("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1", fen);
        assert_eq!(Some(fen), engine.last_fen());

        let (_, body) = call(&app, Method::GET, "/boardInformation", "").await;
        assert_eq!(
            json!({"App/Inf": "Ok", "value": {"is_check": false, "turn": "b", "game_over": false}}),
            body
        );
    }

    #[tokio::test]
    async fn bad_moves_are_rejected() {
        let (app, _) = app().await;

        let (status, body) = call(&app, Method::PUT, "/move", r#"{"from": "e2"}"#).await;
        assert_eq!(StatusCode::BAD_REQUEST, status);
        assert!(body["App/Err"]
            .as_str()
            .unwrap()
            .starts_with("wrong from or to for move"));

        let (status, _) = call(&app, Method::PUT, "/move", "e2e4").await;
        assert_eq!(StatusCode::BAD_REQUEST, status);

        let (status, body) =
            call(&app, Method::PUT, "/move", r#"{"from": "e2", "to": "e5"}"#).await;
        assert_eq!(StatusCode::BAD_REQUEST, status);
        assert!(body.get("App/Err").is_some());

        let (_, body) = call(&app, Method::GET, "/fen", "").await;
        assert_eq!(START_FEN, body["value"]);
    }

    #[tokio::test]
    async fn undo_with_empty_history_is_null() {
        let (app, _) = app().await;

        let (status, body) = call(&app, Method::DELETE, "/move", "").await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!(json!({"App/Inf": "Ok", "value": null}), body);
    }

    #[tokio::test]
    async fn post_move_in_checkmate_is_null() {
        let (app, _) = app().await;
        let mate = "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3";

        let (status, _) = call(&app, Method::PUT, "/fen", mate).await;
        assert_eq!(StatusCode::OK, status);

        let (status, body) = call(&app, Method::POST, "/move", "").await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!(json!({"App/Inf": "Ok", "value": null}), body);

        let (_, body) = call(&app, Method::GET, "/move", "").await;
        assert_eq!(json!({"App/Inf": "Ok", "value": null}), body);

        let (_, body) = call(&app, Method::GET, "/fen", "").await;
        assert_eq!(mate, body["value"]);
    }

    #[tokio::test]
    async fn post_move_returns_structured_move() {
        let (app, _) = app().await;

        let (status, body) = call(&app, Method::POST, "/move", "").await;
        assert_eq!(StatusCode::OK, status);

        let played = &body["value"];
        let uci = played["uci"].as_str().unwrap();
        assert_eq!(
            uci,
            format!("{}{}", played["from"].as_str().unwrap(), played["to"].as_str().unwrap())
        );
        assert_eq!(Value::Bool(false), played["isEnPassant"]);

        let (_, body) = call(&app, Method::DELETE, "/move", "").await;
        assert_eq!(uci, body["value"]);
    }

    #[tokio::test]
    async fn legal_moves_and_top_moves() {
        let (app, _) = app().await;

        let (_, body) = call(&app, Method::GET, "/moves", "").await;
        assert_eq!(20, body["value"].as_array().unwrap().len());

        let (_, body) = call(&app, Method::GET, "/topMoves?count=2", "").await;
        let top = body["value"].as_array().unwrap();
        assert_eq!(2, top.len());
        assert!(top[0].get("move").is_some());

        let (status, _) = call(&app, Method::GET, "/topMoves?count=lots", "").await;
        assert_eq!(StatusCode::BAD_REQUEST, status);
    }

    #[tokio::test]
    async fn flip_and_reset() {
        let (app, _) = app().await;

        let (status, body) = call(&app, Method::PUT, "/boardInformation", "").await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!(json!({"App/Inf": "Ok"}), body);

        let (_, body) = call(&app, Method::GET, "/boardInformation", "").await;
        assert_eq!("b", body["value"]["turn"]);

        call(&app, Method::DELETE, "/boardInformation", "").await;
        let (_, body) = call(&app, Method::GET, "/fen", "").await;
        assert_eq!(START_FEN, body["value"]);
    }

    #[tokio::test]
    async fn parameters_patch_filters_keys() {
        let (app, _) = app().await;

        let (status, _) = call(
            &app,
            Method::PATCH,
            "/stockfishParameters",
            r#"{"unknownKey": 5, "skillLevel": 10}"#,
        )
        .await;
        assert_eq!(StatusCode::OK, status);

        let (_, body) = call(&app, Method::GET, "/stockfishParameters", "").await;
        assert_eq!(
            json!({"threads": 1, "hashSizeMb": 16, "skillLevel": 10, "variantName": null}),
            body["value"]
        );

        let (status, _) = call(&app, Method::PATCH, "/stockfishParameters", "[1, 2]").await;
        assert_eq!(StatusCode::BAD_REQUEST, status);
    }

    #[tokio::test]
    async fn engine_down_is_503() {
        let (app, engine) = app().await;
        engine.set_failing(true);

        let (status, body) = call(&app, Method::GET, "/move", "").await;
        assert_eq!(StatusCode::SERVICE_UNAVAILABLE, status);
        assert!(body.get("App/Err").is_some());
    }

    #[tokio::test]
    async fn routing_errors() {
        let (app, _) = app().await;

        let (status, body) = call(&app, Method::POST, "/fen", "").await;
        assert_eq!(StatusCode::GATEWAY_TIMEOUT, status);
        assert_eq!(json!({"App/Err": "Method not Supported"}), body);

        let (status, _) = call(&app, Method::DELETE, "/moves", "").await;
        assert_eq!(StatusCode::GATEWAY_TIMEOUT, status);

        let (status, body) = call(&app, Method::GET, "/nowhere", "").await;
        assert_eq!(StatusCode::NOT_FOUND, status);
        assert_eq!(json!({"App/Err": "Not Found"}), body);
    }

    #[tokio::test]
    async fn browser_preflight_is_allowed() {
        let (app, _) = app().await;

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/move")
            .header("origin", DEFAULT_CORS_ORIGIN)
            .header("access-control-request-method", "PUT")
            .header("access-control-request-headers", "content-type,x-client-id")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(StatusCode::OK, response.status());

        let headers = response.headers();
        assert_eq!(
            DEFAULT_CORS_ORIGIN,
            headers["access-control-allow-origin"].to_str().unwrap()
        );
        assert!(headers["access-control-allow-methods"]
            .to_str()
            .unwrap()
            .contains("PUT"));
        assert!(headers.contains_key("access-control-allow-headers"));
    }

    #[tokio::test]
    async fn other_origins_get_no_cors_headers() {
        let (app, _) = app().await;

        let request = Request::builder()
            .uri("/fen")
            .header("origin", "http://elsewhere.example")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(StatusCode::OK, response.status());
        assert!(!response
            .headers()
            .contains_key("access-control-allow-origin"));
    }

    #[test]
    fn bad_cors_origin() {
        assert!(cors_layer("*").is_ok());
        assert!(matches!(
            cors_layer("http://bad\norigin"),
            Err(ConfigError::CorsOrigin(_))
        ));
    }
}

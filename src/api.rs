// 🌐 REST API - money box operations over HTTP (axum)
//
// Routes (nested under /api/v1):
//   POST   /moneyboxes/              create
//   GET    /moneyboxes/              list (newest first)
//   GET    /moneyboxes/:id/          get
//   GET    /moneyboxes/:id/shake/    current contents
//   POST   /moneyboxes/:id/save/     deposit a batch of cashes
//   DELETE /moneyboxes/:id/break/    break and return the final contents
//
// Every route is also reachable without the trailing slash.
// The service sits behind one mutex: operations run one at a time.

use crate::db::SqliteStore;
use crate::deposit::{parse_batch, CashRequest};
use crate::error::MoneyBoxError;
use crate::money_box::BoxSummary;
use crate::service::MoneyBoxService;
use crate::wealth::WealthView;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    service: Arc<Mutex<MoneyBoxService<SqliteStore>>>,
}

impl AppState {
    pub fn new(service: MoneyBoxService<SqliteStore>) -> Self {
        AppState {
            service: Arc::new(Mutex::new(service)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MoneyBoxService<SqliteStore>>, ApiError> {
        self.service
            .lock()
            .map_err(|_| ApiError::Internal("service lock poisoned".to_string()))
    }
}

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct CreateBoxBody {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SaveBody {
    pub cashes: Option<Vec<CashRequest>>,
}

#[derive(Serialize)]
struct Detail<'a> {
    detail: &'a str,
}

// ============================================================================
// Errors
// ============================================================================

pub enum ApiError {
    Domain(MoneyBoxError),
    /// Body that is not JSON, or whose shape cannot hold the fields at all
    Payload(JsonRejection),
    Internal(String),
}

impl From<MoneyBoxError> for ApiError {
    fn from(err: MoneyBoxError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Payload(rejection)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            ApiError::Domain(err) => err,
            ApiError::Payload(rejection) => {
                let status = match &rejection {
                    JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
                        StatusCode::BAD_REQUEST
                    }
                    other => other.status(),
                };
                return (
                    status,
                    Json(json!({ "detail": format!("JSON parse error - {}", rejection.body_text()) })),
                )
                    .into_response();
            }
            ApiError::Internal(message) => {
                error!("Internal error: {}", message);
                return internal_error();
            }
        };

        match &err {
            MoneyBoxError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                Json(Detail {
                    detail: "Not found.",
                }),
            )
                .into_response(),
            MoneyBoxError::BoxBroken(_) | MoneyBoxError::AlreadyBroken(_) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "detail": err.to_string() })),
            )
                .into_response(),
            MoneyBoxError::InvalidDenomination { .. } => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "cashes": [err.to_string()] })),
            )
                .into_response(),
            MoneyBoxError::InvalidInput { field, message } => {
                let mut body = serde_json::Map::new();
                body.insert(field.clone(), json!([message]));
                (StatusCode::BAD_REQUEST, Json(serde_json::Value::Object(body))).into_response()
            }
            MoneyBoxError::Storage(_) | MoneyBoxError::Corrupt(_) => {
                error!("Storage failure: {}", err);
                internal_error()
            }
        }
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(Detail {
            detail: "A server error occurred.",
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "OK" }))
}

/// POST /api/v1/moneyboxes/ - Create a money box
async fn create_box(
    State(state): State<AppState>,
    payload: Result<Json<CreateBoxBody>, JsonRejection>,
) -> Result<(StatusCode, Json<BoxSummary>), ApiError> {
    let Json(body) = payload?;
    let name = body.name.unwrap_or_default();
    let summary = state.lock()?.create(&name)?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// GET /api/v1/moneyboxes/ - All boxes, newest first
async fn list_boxes(State(state): State<AppState>) -> Result<Json<Vec<BoxSummary>>, ApiError> {
    Ok(Json(state.lock()?.list()?))
}

/// GET /api/v1/moneyboxes/:id/ - Basic box data
async fn get_box(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<BoxSummary>, ApiError> {
    Ok(Json(state.lock()?.get(id)?))
}

/// GET /api/v1/moneyboxes/:id/shake/ - Current contents and wealth
async fn shake_box(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<WealthView>, ApiError> {
    Ok(Json(state.lock()?.shake(id)?))
}

/// POST /api/v1/moneyboxes/:id/save/ - Deposit cashes
async fn save_money(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<SaveBody>, JsonRejection>,
) -> Result<(StatusCode, Json<WealthView>), ApiError> {
    let mut service = state.lock()?;

    // existence and state are checked before the payload, as a missing box
    // must answer 404 whatever the body says
    service.get(id).and_then(|summary| {
        if summary.broken {
            Err(MoneyBoxError::BoxBroken(id))
        } else {
            Ok(())
        }
    })?;

    let Json(body) = payload?;
    let raw = body.cashes.ok_or_else(|| MoneyBoxError::required("cashes"))?;
    let requests = parse_batch(&raw)?;

    let view = service.deposit(id, &requests)?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// DELETE /api/v1/moneyboxes/:id/break/ - Break the box, return what was inside
async fn break_box(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<WealthView>, ApiError> {
    Ok(Json(state.lock()?.break_box(id)?))
}

// ============================================================================
// Router
// ============================================================================

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/moneyboxes", get(list_boxes).post(create_box))
        .route("/moneyboxes/", get(list_boxes).post(create_box))
        .route("/moneyboxes/:id", get(get_box))
        .route("/moneyboxes/:id/", get(get_box))
        .route("/moneyboxes/:id/shake", get(shake_box))
        .route("/moneyboxes/:id/shake/", get(shake_box))
        .route("/moneyboxes/:id/save", post(save_money))
        .route("/moneyboxes/:id/save/", post(save_money))
        .route("/moneyboxes/:id/break", delete(break_box))
        .route("/moneyboxes/:id/break/", delete(break_box));

    Router::new()
        .route("/api/health", get(health_check))
        .nest("/api/v1", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::denomination::DenominationCatalog;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use serde_json::Value;
    use tower::ServiceExt;

    fn app() -> Router {
        let store = SqliteStore::open_in_memory(&DenominationCatalog::euro()).unwrap();
        let service = MoneyBoxService::new(store).unwrap();
        create_router(AppState::new(service))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn create(app: &Router, name: &str) -> i64 {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/v1/moneyboxes/",
            Some(json!({ "name": name })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }

    fn payload() -> Value {
        json!({
            "cashes": [
                {"cash_type": "bill", "value": "100", "amount": 2},
                {"cash_type": "coin", "value": "2", "amount": 1},
                {"cash_type": "coin", "value": "0.2", "amount": 5}
            ]
        })
    }

    fn assert_standard_cashes(body: &Value, two_euro_coins: i64) {
        let cashes = body["cashes"].as_array().unwrap();
        assert_eq!(cashes.len(), 3);
        assert_eq!(cashes[0], json!({"cash_type": "coin", "currency": "EUR", "value": "0.20", "amount": 5}));
        assert_eq!(
            cashes[1],
            json!({"cash_type": "coin", "currency": "EUR", "value": "2.00", "amount": two_euro_coins})
        );
        assert_eq!(cashes[2], json!({"cash_type": "bill", "currency": "EUR", "value": "100.00", "amount": 2}));
    }

    #[tokio::test]
    async fn test_health() {
        let app = app();
        let (status, body) = send(&app, Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "OK");
    }

    #[tokio::test]
    async fn test_create_and_get_moneybox() {
        let app = app();
        let id = create(&app, "Moneybox test").await;

        let (status, body) = send(&app, Method::GET, &format!("/api/v1/moneyboxes/{}/", id), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], id);
        assert_eq!(body["name"], "Moneybox test");
        assert!(body["created_at"].is_string());
        assert!(body["updated_at"].is_string());
        assert_eq!(body["broken"], false);
    }

    #[tokio::test]
    async fn test_create_moneybox_missing_name() {
        let app = app();
        let (status, body) = send(&app, Method::POST, "/api/v1/moneyboxes/", Some(json!({}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["name"], json!(["This field is required."]));
    }

    #[tokio::test]
    async fn test_get_moneybox_not_found() {
        let app = app();
        let (status, body) = send(&app, Method::GET, "/api/v1/moneyboxes/111111/", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Not found.");
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let app = app();
        let mut ids = Vec::new();
        for n in 1..=3 {
            ids.push(create(&app, &format!("Moneybox test {}", n)).await);
        }

        let (status, body) = send(&app, Method::GET, "/api/v1/moneyboxes", None).await;

        assert_eq!(status, StatusCode::OK);
        let listed: Vec<i64> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["id"].as_i64().unwrap())
            .collect();
        ids.reverse();
        assert_eq!(listed, ids);
    }

    #[tokio::test]
    async fn test_save_then_shake() {
        let app = app();
        let id = create(&app, "Moneybox test").await;

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/api/v1/moneyboxes/{}/save/", id),
            Some(payload()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["wealth"], "203.00");
        assert_standard_cashes(&body, 1);

        let (status, body) = send(&app, Method::GET, &format!("/api/v1/moneyboxes/{}/shake/", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["wealth"], "203.00");
        assert_standard_cashes(&body, 1);
    }

    #[tokio::test]
    async fn test_save_with_existing_content() {
        let app = app();
        let id = create(&app, "Moneybox test").await;
        let uri = format!("/api/v1/moneyboxes/{}/save/", id);

        send(
            &app,
            Method::POST,
            &uri,
            Some(json!({"cashes": [{"cash_type": "coin", "value": "2", "amount": 2}]})),
        )
        .await;
        let (status, body) = send(&app, Method::POST, &uri, Some(payload())).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["wealth"], "207.00");
        assert_standard_cashes(&body, 3);
    }

    #[tokio::test]
    async fn test_save_with_wrong_cash_value() {
        let app = app();
        let id = create(&app, "Moneybox test").await;

        let mut body = payload();
        body["cashes"]
            .as_array_mut()
            .unwrap()
            .push(json!({"cash_type": "coin", "value": "30", "amount": 1}));

        let (status, response) = send(
            &app,
            Method::POST,
            &format!("/api/v1/moneyboxes/{}/save/", id),
            Some(body),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["cashes"][0], "The coin with the value 30.00 does not exist.");

        let (_, shaken) = send(&app, Method::GET, &format!("/api/v1/moneyboxes/{}/shake/", id), None).await;
        assert_eq!(shaken["wealth"], "0.00");
        assert_eq!(shaken["cashes"], json!([]));
    }

    #[tokio::test]
    async fn test_save_invalid_field() {
        let app = app();
        let id = create(&app, "Moneybox test").await;

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/api/v1/moneyboxes/{}/save/", id),
            Some(json!({"cashes": [{"cash_type": "note", "value": "5", "amount": 1}]})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["cash_type"], json!(["\"note\" is not a valid choice."]));
    }

    #[tokio::test]
    async fn test_save_wrongly_typed_fields() {
        let app = app();
        let id = create(&app, "Moneybox test").await;
        let uri = format!("/api/v1/moneyboxes/{}/save/", id);

        let (status, body) = send(
            &app,
            Method::POST,
            &uri,
            Some(json!({"cashes": [{"cash_type": "coin", "value": "2", "amount": "five"}]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["amount"], json!(["A valid integer is required."]));

        let (status, body) = send(
            &app,
            Method::POST,
            &uri,
            Some(json!({"cashes": [{"cash_type": "coin", "value": "2", "amount": 1.5}]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["amount"], json!(["A valid integer is required."]));

        // numeric strings and bare numbers are read like their typed forms
        let (status, body) = send(
            &app,
            Method::POST,
            &uri,
            Some(json!({"cashes": [{"cash_type": "coin", "value": 2, "amount": "5"}]})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["wealth"], "10.00");
    }

    #[tokio::test]
    async fn test_save_malformed_body() {
        let app = app();
        let id = create(&app, "Moneybox test").await;

        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/v1/moneyboxes/{}/save/", id))
            .header("content-type", "application/json")
            .body(Body::from("{\"cashes\": ["))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/api/v1/moneyboxes/{}/save/", id),
            Some(json!({"cashes": "coin"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().starts_with("JSON parse error"));
    }

    #[tokio::test]
    async fn test_save_not_found() {
        let app = app();
        let (status, body) = send(&app, Method::POST, "/api/v1/moneyboxes/111/save/", Some(payload())).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Not found.");
    }

    #[tokio::test]
    async fn test_break_then_everything_is_refused() {
        let app = app();
        let id = create(&app, "Moneybox test").await;
        send(
            &app,
            Method::POST,
            &format!("/api/v1/moneyboxes/{}/save/", id),
            Some(payload()),
        )
        .await;

        let (status, body) = send(&app, Method::DELETE, &format!("/api/v1/moneyboxes/{}/break/", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["wealth"], "203.00");
        assert_standard_cashes(&body, 1);

        let broken_detail = json!("This money box is broken you cannot use it anymore.");

        let (status, body) = send(&app, Method::GET, &format!("/api/v1/moneyboxes/{}/shake/", id), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], broken_detail);

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/api/v1/moneyboxes/{}/save/", id),
            Some(payload()),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], broken_detail);

        let (status, body) = send(&app, Method::DELETE, &format!("/api/v1/moneyboxes/{}/break/", id), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], broken_detail);

        let (_, summary) = send(&app, Method::GET, &format!("/api/v1/moneyboxes/{}", id), None).await;
        assert_eq!(summary["broken"], true);
    }

    #[tokio::test]
    async fn test_break_not_found() {
        let app = app();
        let (status, body) = send(&app, Method::DELETE, "/api/v1/moneyboxes/111/break/", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Not found.");
    }
}

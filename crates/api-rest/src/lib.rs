//! # API REST
//!
//! REST API for the Altus document taxonomy.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON bodies, base64 payloads, CORS, status codes)
//!
//! All behaviour lives in `altus-core`; handlers only translate requests and map
//! [`AltusError`] onto HTTP statuses.

#![warn(rust_2018_idioms)]

pub mod dto;
mod handlers;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use altus_core::{
    AltusError, CoreConfig, DocumentService, FolderProvisioner, HealthService, StoreError, Stores,
    TransferEngine,
};
use dto::*;

/// Header carrying the client's idempotency key on `POST /upload`.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Largest accepted request body. Base64 inflates payloads by a third, so this leaves room for
/// a single-request upload at the default chunk threshold.
pub const MAX_BODY_BYTES: usize = 160 * 1024 * 1024;

/// Application state for the REST API server
///
/// Every service is built once from the shared configuration and store bundle.
#[derive(Clone)]
pub struct AppState {
    cfg: Arc<CoreConfig>,
    provisioner: FolderProvisioner,
    documents: Arc<DocumentService>,
    transfers: TransferEngine,
    health: HealthService,
}

impl AppState {
    pub fn new(cfg: Arc<CoreConfig>, stores: Stores) -> Self {
        Self {
            provisioner: FolderProvisioner::new(cfg.clone(), stores.clone()),
            documents: Arc::new(DocumentService::new(cfg.clone(), stores.clone())),
            transfers: TransferEngine::new(cfg.clone(), stores.clone()),
            health: HealthService::new(stores),
            cfg,
        }
    }

    /// The document service, shared with background tasks such as the idle session sweep.
    pub fn documents(&self) -> Arc<DocumentService> {
        self.documents.clone()
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::resolve_paths,
        handlers::provision,
        handlers::upload,
        handlers::start_session,
        handlers::append_session,
        handlers::finish_session,
        handlers::transfer,
        handlers::transfer_bulk,
        handlers::asset_link,
    ),
    components(schemas(
        HealthRes,
        EntityBody,
        EntityRefBody,
        ResolvePathsReq,
        ResolvePathsRes,
        ProvisionReq,
        ProvisionRes,
        UploadReq,
        UploadRes,
        StartSessionReq,
        AppendSessionReq,
        FinishSessionReq,
        SessionCursorRes,
        AssetLinkRes,
        TransferReq,
        BulkTransferReq,
        StepErrorRes,
        TransferRes,
        BulkTransferRes,
        ErrorRes,
    ))
)]
pub struct ApiDoc;

/// Builds the REST router with Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/paths/resolve", post(handlers::resolve_paths))
        .route("/provision", post(handlers::provision))
        .route("/upload", post(handlers::upload))
        .route("/upload-session/start", post(handlers::start_session))
        .route("/upload-session/append", post(handlers::append_session))
        .route("/upload-session/finish", post(handlers::finish_session))
        .route("/transfer", post(handlers::transfer))
        .route("/transfer/bulk", post(handlers::transfer_bulk))
        .route("/assets/:id/link", get(handlers::asset_link))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

pub(crate) type ApiError = (StatusCode, Json<ErrorRes>);

/// HTTP status for a core error.
pub fn status_for(err: &AltusError) -> StatusCode {
    if err.is_transient() {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    match err {
        AltusError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        AltusError::UnknownSession(_) | AltusError::AssetNotFound(_) => StatusCode::NOT_FOUND,
        AltusError::OffsetMismatch { .. }
        | AltusError::SessionNotActive { .. }
        | AltusError::SessionBusy(_) => StatusCode::CONFLICT,
        AltusError::ParentMissing(_) | AltusError::PartialProvision { .. } => {
            StatusCode::BAD_GATEWAY
        }
        AltusError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
        AltusError::Store(StoreError::Conflict(_))
        | AltusError::Store(StoreError::IncorrectOffset { .. }) => StatusCode::CONFLICT,
        AltusError::Store(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn reject(err: AltusError) -> ApiError {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!(status = status.as_u16(), error = %err, "request failed");
    } else {
        tracing::warn!(status = status.as_u16(), error = %err, "request rejected");
    }
    let mut body = ErrorRes::new(err.to_string());
    if let AltusError::PartialProvision {
        failed_path,
        touched,
        ..
    } = err
    {
        body.failed_path = Some(failed_path);
        body.touched = touched;
    }
    (status, Json(body))
}

pub(crate) fn bad_request(message: impl Into<String>) -> ApiError {
    let message = message.into();
    tracing::warn!(error = %message, "bad request");
    (StatusCode::BAD_REQUEST, Json(ErrorRes::new(message)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use base64::{engine::general_purpose, Engine as _};
    use http_body_util::BodyExt;
    use altus_core::stores::{InMemoryMetadataStore, InMemoryObjectStore};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const ROOT: &str = "/Altus_Empire_Command_Center";

    fn app() -> Router {
        router(AppState::new(Arc::new(CoreConfig::default()), Stores::in_memory()))
    }

    fn property_entity() -> Value {
        json!({
            "entity_type": "property",
            "attributes": {
                "owner": {"id": 1, "name": "Acme"},
                "property": {"id": 7, "name": "Sunset"}
            }
        })
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        call_with_headers(app, method, uri, body, &[]).await
    }

    async fn call_with_headers(
        app: &Router,
        method: &str,
        uri: &str,
        body: Value,
        headers: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .uri(uri)
            .method(method)
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = if body.is_null() {
            builder.body(Body::empty()).unwrap()
        } else {
            builder.body(Body::from(body.to_string())).unwrap()
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health_check() {
        let (status, body) = call(&app(), "GET", "/health", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn test_resolve_property_paths() {
        let mut req = property_entity();
        req["document_kind"] = json!("property_photo");

        let (status, body) = call(&app(), "POST", "/paths/resolve", req).await;
        assert_eq!(status, StatusCode::OK);

        let base = format!("{ROOT}/01_Owners/acme-1/06_Properties/sunset-7");
        assert_eq!(body["entity_type"], "property");
        assert_eq!(body["base_path"], base.as_str());
        assert_eq!(body["subfolders"].as_array().unwrap().len(), 9);
        assert!(body["document_folder"]
            .as_str()
            .unwrap()
            .starts_with(&format!("{base}/")));
    }

    #[tokio::test]
    async fn test_resolve_rejects_bad_attributes_and_mismatched_kind() {
        let app = app();
        let bad = json!({"entity_type": "property", "attributes": {"owner": {"id": 1}}});
        let (status, body) = call(&app, "POST", "/paths/resolve", bad).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("property"));

        let mut mismatched = property_entity();
        mismatched["document_kind"] = json!("lease_signed");
        let (status, _) = call(&app, "POST", "/paths/resolve", mismatched).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_provision_with_ancestors_is_idempotent() {
        let app = app();
        let mut req = property_entity();
        req["include_ancestors"] = json!(true);

        let (status, first) = call(&app, "POST", "/provision", req.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["paths"].as_array().unwrap().len(), 10);
        let base = format!("{ROOT}/01_Owners/acme-1/06_Properties/sunset-7");
        assert_eq!(first["base_path"], base.as_str());
        assert!(first["created_paths"]
            .as_array()
            .unwrap()
            .contains(&json!(base)));

        let (status, second) = call(&app, "POST", "/provision", req).await;
        assert_eq!(status, StatusCode::OK);
        assert!(second["created_paths"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_provision_without_parent_is_bad_gateway() {
        let (status, body) = call(&app(), "POST", "/provision", property_entity()).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().is_some());
        assert_eq!(
            body["failed_path"],
            format!("{ROOT}/01_Owners/acme-1/06_Properties/sunset-7").as_str()
        );
    }

    #[tokio::test]
    async fn test_partial_provision_reports_failed_and_touched_paths() {
        let objects = Arc::new(InMemoryObjectStore::new());
        let stores = Stores::new(objects.clone(), Arc::new(InMemoryMetadataStore::new()));
        let app = router(AppState::new(Arc::new(CoreConfig::default()), stores));
        let owner = format!("{ROOT}/01_Owners/acme-1");
        let failing = format!("{owner}/03_Banking_DD");
        objects.fail_on(&failing);

        let req = json!({
            "entity_type": "owner",
            "attributes": {"owner": {"id": 1, "name": "Acme"}}
        });
        let (status, body) = call(&app, "POST", "/provision", req).await;

        assert!(status.is_server_error(), "{status}");
        assert_eq!(body["failed_path"], failing.as_str());
        let touched = body["touched"].as_array().unwrap();
        assert!(touched.contains(&json!(owner)));
        assert!(touched.contains(&json!(format!("{owner}/01_Agreements"))));
        assert!(!touched.contains(&json!(failing)));
    }

    #[tokio::test]
    async fn test_upload_and_replay_with_idempotency_key() {
        let app = app();
        let req = json!({
            "document_kind": "property_photo",
            "entity": property_entity(),
            "original_filename": "front door.jpg",
            "file_base64": general_purpose::STANDARD.encode(b"hello"),
        });

        let headers = [(IDEMPOTENCY_KEY_HEADER, "upload-1")];
        let (status, first) =
            call_with_headers(&app, "POST", "/upload", req.clone(), &headers).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["size_bytes"], 5);
        assert_eq!(first["replayed"], false);
        assert!(first["stored_filename"]
            .as_str()
            .unwrap()
            .ends_with("__front_door.jpg"));

        let (status, second) = call_with_headers(&app, "POST", "/upload", req, &headers).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["replayed"], true);
        assert_eq!(second["stored_path"], first["stored_path"]);

        let asset_id = first["asset_id"].as_i64().unwrap();
        let (status, link) =
            call(&app, "GET", &format!("/assets/{asset_id}/link"), Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(link["stored_path"], first["stored_path"]);
    }

    #[tokio::test]
    async fn test_upload_rejects_invalid_base64() {
        let req = json!({
            "document_kind": "property_photo",
            "entity": property_entity(),
            "original_filename": "a.jpg",
            "file_base64": "not base64!!",
        });
        let (status, body) = call(&app(), "POST", "/upload", req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("file_base64"));
    }

    #[tokio::test]
    async fn test_upload_session_flow() {
        let app = app();
        let start = json!({
            "document_kind": "property_photo",
            "entity": property_entity(),
            "original_filename": "roof.jpg",
            "chunk_base64": general_purpose::STANDARD.encode(b"abc"),
        });
        let (status, cursor) = call(&app, "POST", "/upload-session/start", start).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cursor["offset"], 3);
        let session_id = cursor["session_id"].as_str().unwrap().to_string();

        let wrong = json!({
            "session_id": session_id,
            "offset": 1,
            "chunk_base64": general_purpose::STANDARD.encode(b"def"),
        });
        let (status, _) = call(&app, "POST", "/upload-session/append", wrong).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let append = json!({
            "session_id": session_id,
            "offset": 3,
            "chunk_base64": general_purpose::STANDARD.encode(b"def"),
        });
        let (status, cursor) = call(&app, "POST", "/upload-session/append", append).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cursor["offset"], 6);

        let finish = json!({"session_id": session_id, "offset": 6});
        let (status, receipt) = call(&app, "POST", "/upload-session/finish", finish).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(receipt["size_bytes"], 6);
    }

    #[tokio::test]
    async fn test_finish_unknown_session_is_not_found() {
        let finish = json!({"session_id": "nope", "offset": 0});
        let (status, body) = call(&app(), "POST", "/upload-session/finish", finish).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.get("failed_path").is_none());
        assert!(body.get("touched").is_none());
    }

    #[tokio::test]
    async fn test_unknown_asset_link_is_not_found() {
        let (status, _) = call(&app(), "GET", "/assets/99/link", Value::Null).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_transfer_moves_provisioned_property() {
        let app = app();
        let mut provision = property_entity();
        provision["include_ancestors"] = json!(true);
        let (status, _) = call(&app, "POST", "/provision", provision).await;
        assert_eq!(status, StatusCode::OK);

        let transfer = json!({
            "property": {"id": 7, "name": "Sunset"},
            "from_owner": {"id": 1, "name": "Acme"},
            "to_owner": {"id": 2, "name": "Rising"},
            "cutoff_date": "2024-07-01",
        });
        let (status, report) = call(&app, "POST", "/transfer", transfer).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["moved"], true);
        assert_eq!(
            report["new_path"],
            format!("{ROOT}/01_Owners/rising-2/06_Properties/sunset-7").as_str()
        );
        assert!(report["marker_path"].is_null());
    }

    #[tokio::test]
    async fn test_transfer_rejects_same_owner() {
        let transfer = json!({
            "property": {"id": 7, "name": "Sunset"},
            "from_owner": {"id": 1, "name": "Acme"},
            "to_owner": {"id": 1, "name": "Acme"},
            "cutoff_date": "2024-07-01",
        });
        let (status, _) = call(&app(), "POST", "/transfer", transfer).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_bulk_dry_run_reports_each_property() {
        let bulk = json!({
            "from_owner": {"id": 1, "name": "Acme"},
            "to_owner": {"id": 2, "name": "Rising"},
            "properties": [{"id": 7, "name": "Sunset"}, {"id": 8, "name": "Dawn"}],
            "cutoff_date": "2024-07-01",
            "dry_run": true,
        });
        let (status, body) = call(&app(), "POST", "/transfer/bulk", bulk).await;
        assert_eq!(status, StatusCode::OK);
        let reports = body["reports"].as_array().unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r["dry_run"] == true && r["moved"] == false));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&AltusError::InvalidInput("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&AltusError::OffsetMismatch {
                session_id: "s".into(),
                expected: 3,
                actual: 1
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&AltusError::UnknownSession("s".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&AltusError::Store(StoreError::Transient("down".into()))),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&AltusError::PartialProvision {
                failed_path: "/A/b".into(),
                touched: vec!["/A".into()],
                source: Box::new(AltusError::Store(StoreError::Rejected {
                    status: 400,
                    message: "bad".into()
                })),
            }),
            StatusCode::BAD_GATEWAY
        );
    }
}

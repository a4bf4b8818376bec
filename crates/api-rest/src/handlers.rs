use axum::{
    extract::{Path as AxumPath, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use base64::{engine::general_purpose, Engine as _};

use crate::dto::*;
use crate::{bad_request, reject, ApiError, AppState, IDEMPOTENCY_KEY_HEADER};
use altus_core::{AltusError, DocumentTarget, EntityPaths, UploadRequest};

fn decode_base64(field: &str, encoded: &str) -> Result<Vec<u8>, ApiError> {
    general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| bad_request(format!("{field} is not valid base64: {e}")))
}

fn idempotency_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Both stores reachable", body = HealthRes),
        (status = 503, description = "A store could not be reached", body = HealthRes)
    )
)]
/// Health check endpoint
///
/// Checks the object store account and the metadata store. Nothing is written.
#[axum::debug_handler]
pub(crate) async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthRes>) {
    let report = state.health.check().await;
    let status = if report.ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report.into()))
}

#[utoipa::path(
    post,
    path = "/paths/resolve",
    request_body = ResolvePathsReq,
    responses(
        (status = 200, description = "Resolved taxonomy paths", body = ResolvePathsRes),
        (status = 400, description = "Invalid entity or document kind", body = ErrorRes)
    )
)]
/// Resolve the folders of an entity without touching any store
#[axum::debug_handler]
pub(crate) async fn resolve_paths(
    State(state): State<AppState>,
    Json(req): Json<ResolvePathsReq>,
) -> Result<Json<ResolvePathsRes>, ApiError> {
    let entity = req.entity.into_entity().map_err(bad_request)?;
    let paths = state.provisioner.resolve(&entity).map_err(reject)?;

    let document_folder = match req.document_kind {
        Some(kind) => Some(
            EntityPaths::document_folder(state.cfg.taxonomy_root(), &entity, kind)
                .map_err(reject)?
                .to_string(),
        ),
        None => None,
    };

    Ok(Json(ResolvePathsRes {
        entity_type: paths.kind().to_string(),
        base_path: paths.base().to_string(),
        subfolders: paths.subfolders().iter().map(ToString::to_string).collect(),
        document_folder,
    }))
}

#[utoipa::path(
    post,
    path = "/provision",
    request_body = ProvisionReq,
    responses(
        (status = 200, description = "Folders ensured", body = ProvisionRes),
        (status = 400, description = "Invalid entity", body = ErrorRes),
        (status = 502, description = "Provisioning stopped part way", body = ErrorRes),
        (status = 503, description = "Object store temporarily unavailable", body = ErrorRes)
    )
)]
/// Ensure the standard folder tree of an entity
///
/// Idempotent: folders that already exist are reported in `paths` but not in
/// `created_paths`. With `include_ancestors` the owner, property and unit above the entity are
/// provisioned first.
#[axum::debug_handler]
pub(crate) async fn provision(
    State(state): State<AppState>,
    Json(req): Json<ProvisionReq>,
) -> Result<Json<ProvisionRes>, ApiError> {
    let entity = req.entity.into_entity().map_err(bad_request)?;

    let outcomes = if req.include_ancestors {
        state
            .provisioner
            .provision_lineage(&entity)
            .await
            .map_err(reject)?
    } else {
        vec![state
            .provisioner
            .provision_entity(&entity)
            .await
            .map_err(reject)?]
    };

    let created_paths = outcomes
        .iter()
        .flat_map(|o| o.newly_created.iter().map(ToString::to_string))
        .collect();
    let target = outcomes.into_iter().last().ok_or_else(|| {
        reject(AltusError::InvalidInput("entity has nothing to provision".into()))
    })?;

    Ok(Json(ProvisionRes {
        base_path: target.base.to_string(),
        paths: target.paths.iter().map(ToString::to_string).collect(),
        created_paths,
    }))
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body = UploadReq,
    params(
        ("Idempotency-Key" = Option<String>, Header, description = "Replays the first response for a repeated key")
    ),
    responses(
        (status = 200, description = "Document stored", body = UploadRes),
        (status = 400, description = "Invalid request", body = ErrorRes),
        (status = 503, description = "Store temporarily unavailable", body = ErrorRes)
    )
)]
/// Upload a whole document in one request
///
/// The document is filed under the entity folder chosen by its kind, with a timestamped
/// filename. Large payloads are sent to the object store in chunks.
#[axum::debug_handler]
pub(crate) async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UploadReq>,
) -> Result<Json<UploadRes>, ApiError> {
    let bytes = decode_base64("file_base64", &req.file_base64)?;
    let target = DocumentTarget {
        document_kind: req.document_kind,
        entity: req.entity.into_entity().map_err(bad_request)?,
        original_filename: req.original_filename,
        uploaded_by: req.uploaded_by,
    };

    let receipt = state
        .documents
        .upload(UploadRequest {
            target,
            bytes,
            idempotency_key: idempotency_key(&headers),
        })
        .await
        .map_err(reject)?;
    Ok(Json(receipt.into()))
}

#[utoipa::path(
    post,
    path = "/upload-session/start",
    request_body = StartSessionReq,
    responses(
        (status = 200, description = "Session opened", body = SessionCursorRes),
        (status = 400, description = "Invalid request", body = ErrorRes)
    )
)]
/// Open a chunked upload session with its first chunk
#[axum::debug_handler]
pub(crate) async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionReq>,
) -> Result<Json<SessionCursorRes>, ApiError> {
    let chunk = decode_base64("chunk_base64", &req.chunk_base64)?;
    let target = DocumentTarget {
        document_kind: req.document_kind,
        entity: req.entity.into_entity().map_err(bad_request)?,
        original_filename: req.original_filename,
        uploaded_by: req.uploaded_by,
    };

    let cursor = state
        .documents
        .start_session(target, &chunk)
        .await
        .map_err(reject)?;
    Ok(Json(cursor.into()))
}

#[utoipa::path(
    post,
    path = "/upload-session/append",
    request_body = AppendSessionReq,
    responses(
        (status = 200, description = "Chunk appended", body = SessionCursorRes),
        (status = 404, description = "Unknown session", body = ErrorRes),
        (status = 409, description = "Offset mismatch or session not active", body = ErrorRes)
    )
)]
/// Append the next chunk to an open session
#[axum::debug_handler]
pub(crate) async fn append_session(
    State(state): State<AppState>,
    Json(req): Json<AppendSessionReq>,
) -> Result<Json<SessionCursorRes>, ApiError> {
    let chunk = decode_base64("chunk_base64", &req.chunk_base64)?;
    let offset = state
        .documents
        .append_session(&req.session_id, req.offset, &chunk)
        .await
        .map_err(reject)?;
    Ok(Json(SessionCursorRes {
        session_id: req.session_id,
        offset,
    }))
}

#[utoipa::path(
    post,
    path = "/upload-session/finish",
    request_body = FinishSessionReq,
    responses(
        (status = 200, description = "Document committed", body = UploadRes),
        (status = 404, description = "Unknown session", body = ErrorRes),
        (status = 409, description = "Offset mismatch or session not active", body = ErrorRes)
    )
)]
/// Commit a session to its timestamped destination and record the asset
#[axum::debug_handler]
pub(crate) async fn finish_session(
    State(state): State<AppState>,
    Json(req): Json<FinishSessionReq>,
) -> Result<Json<UploadRes>, ApiError> {
    let receipt = state
        .documents
        .finish_session(&req.session_id, req.offset)
        .await
        .map_err(reject)?;
    Ok(Json(receipt.into()))
}

#[utoipa::path(
    post,
    path = "/transfer",
    request_body = TransferReq,
    responses(
        (status = 200, description = "Transfer report; partial failures are listed in errors", body = TransferRes),
        (status = 400, description = "Invalid request", body = ErrorRes)
    )
)]
/// Move a property subtree to a new owner
#[axum::debug_handler]
pub(crate) async fn transfer(
    State(state): State<AppState>,
    Json(req): Json<TransferReq>,
) -> Result<Json<TransferRes>, ApiError> {
    let report = state
        .transfers
        .transfer(&req.into())
        .await
        .map_err(reject)?;
    Ok(Json(report.into()))
}

#[utoipa::path(
    post,
    path = "/transfer/bulk",
    request_body = BulkTransferReq,
    responses(
        (status = 200, description = "One report per property", body = BulkTransferRes),
        (status = 400, description = "Invalid request", body = ErrorRes)
    )
)]
/// Move several properties between the same pair of owners
#[axum::debug_handler]
pub(crate) async fn transfer_bulk(
    State(state): State<AppState>,
    Json(req): Json<BulkTransferReq>,
) -> Result<Json<BulkTransferRes>, ApiError> {
    let reports = state
        .transfers
        .transfer_many(&req.into())
        .await
        .map_err(reject)?;
    Ok(Json(BulkTransferRes {
        reports: reports.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/assets/{id}/link",
    params(
        ("id" = i64, Path, description = "File asset id")
    ),
    responses(
        (status = 200, description = "Temporary download link", body = AssetLinkRes),
        (status = 404, description = "Unknown asset", body = ErrorRes)
    )
)]
/// Temporary download link for a stored asset
#[axum::debug_handler]
pub(crate) async fn asset_link(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<i64>,
) -> Result<Json<AssetLinkRes>, ApiError> {
    let link = state
        .documents
        .temporary_link(id)
        .await
        .map_err(reject)?;
    Ok(Json(link.into()))
}

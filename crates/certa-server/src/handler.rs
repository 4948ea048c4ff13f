use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use certa_minting::AttemptId;
use certa_registration::{RegistrationError, RegistrationResponse};
use certa_types::{User, WalletAddress};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::error::{mint_status, ServerError, ServerResult};
use crate::form::Form;
use crate::state::AppState;
use crate::view::{MintStatusView, OutcomeView};

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "chain_id": state.config.chain.chain_id,
        "mint_attempts": state.mints.len(),
    }))
}

// ---------------------------------------------------------------------------
// Users and items
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct UpsertUserRequest {
    pub wallet: String,
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

pub async fn upsert_user(
    State(state): State<AppState>,
    Json(req): Json<UpsertUserRequest>,
) -> ServerResult<Json<User>> {
    let wallet = WalletAddress::parse(&req.wallet).map_err(|e| ServerError::BadRequest(e.to_string()))?;
    let display_name = req.display_name.trim();
    if display_name.is_empty() {
        return Err(ServerError::BadRequest("display_name is required".into()));
    }
    let mut user = User::new(wallet, display_name);
    if let Some(email) = req.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        user = user.with_email(email);
    }
    let user = state.records.upsert_user(user).await?;
    info!(wallet = %user.wallet.short(), "user upserted");
    Ok(Json(user))
}

fn registration_status(e: &RegistrationError) -> StatusCode {
    match e {
        RegistrationError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        RegistrationError::UserNotFound(_) => StatusCode::NOT_FOUND,
        RegistrationError::DuplicateSubmission => StatusCode::CONFLICT,
        RegistrationError::StorageUpload { .. } | RegistrationError::RecordLookup(_) => {
            StatusCode::BAD_GATEWAY
        }
        RegistrationError::RecordWrite(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `POST /v1/items`: register an item with its two documents.
pub async fn register_item(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ServerResult<(StatusCode, Json<RegistrationResponse>)> {
    let mut form = Form::read(multipart).await?;
    let result = match form.registration() {
        Ok((submission, bill, id_document, owner)) => {
            state
                .registration
                .register(submission, bill, id_document, owner)
                .await
        }
        Err(e) => Err(RegistrationError::Validation(e.to_string())),
    };
    let status = match &result {
        Ok(_) => StatusCode::CREATED,
        Err(e) => registration_status(e),
    };
    Ok((status, Json(RegistrationResponse::from(result))))
}

// ---------------------------------------------------------------------------
// Mints
// ---------------------------------------------------------------------------

fn attempt_id(raw: &str) -> ServerResult<AttemptId> {
    raw.parse()
        .map_err(|_| ServerError::BadRequest(format!("invalid attempt id: {raw}")))
}

/// `POST /v1/mints`: validate, open an attempt and run it in the background.
pub async fn start_mint(State(state): State<AppState>, multipart: Multipart) -> ServerResult<Response> {
    let mut form = Form::read(multipart).await?;
    let request = match form.mint_request() {
        Ok(request) => request,
        Err(e) => {
            let body = OutcomeView::invalid(e.to_string());
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response());
        }
    };
    let attempt = match state.minting.begin(request) {
        Ok(attempt) => attempt,
        Err(e) => return Ok((mint_status(&e), Json(OutcomeView::rejected(&e))).into_response()),
    };
    let entry = state.mints.start(state.minting.clone(), attempt)?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "attempt_id": entry.id() }))).into_response())
}

/// `GET /v1/mints/{id}`: current step, and the outcome once a run has ended.
pub async fn get_mint(State(state): State<AppState>, Path(id): Path<String>) -> ServerResult<Json<MintStatusView>> {
    let entry = state.mints.get(&attempt_id(&id)?)?;
    Ok(Json(entry.status()))
}

pub async fn retry_mint(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<(StatusCode, Json<MintStatusView>)> {
    let entry = state.mints.retry(state.minting.clone(), &attempt_id(&id)?)?;
    info!(attempt = %entry.id(), "mint retry requested");
    Ok((StatusCode::ACCEPTED, Json(entry.status())))
}

pub async fn cancel_mint(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<(StatusCode, Json<MintStatusView>)> {
    let entry = state.mints.get(&attempt_id(&id)?)?;
    entry.cancel();
    info!(attempt = %entry.id(), step = %entry.current_step(), "mint cancel requested");
    Ok((StatusCode::ACCEPTED, Json(entry.status())))
}

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

/// `GET /v1/objects/{bucket}/{*path}`: serve a stored object at its public URL.
pub async fn get_object(
    State(state): State<AppState>,
    Path((bucket, path)): Path<(String, String)>,
) -> ServerResult<Response> {
    let bucket_id = state
        .config
        .storage
        .buckets
        .bucket(&bucket)
        .ok_or_else(|| ServerError::NotFound(format!("bucket {bucket}")))?;
    let object = state
        .objects
        .download(bucket_id, &path)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("{bucket}/{path}")))?;
    Ok(([(header::CONTENT_TYPE, object.content_type)], object.bytes).into_response())
}

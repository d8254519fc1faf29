use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::instrument;
use validator::Validate;

use crate::{
    app_state::AppState,
    error::{ApiError, Result},
    models::tickets::{
        PurchaseTicketRequest, PurchaseTicketResponse, ReprovisionTicketResponse,
        VerifyTicketResponse,
    },
};

/// POST /api/v1/tickets/purchase
///
/// Records the sale and provisions the voucher on the point of sale's
/// device. The response reports purchase success and provisioning
/// success separately; a purchase can succeed while the device write
/// fails.
#[instrument(skip(state, request))]
pub async fn purchase_ticket(
    State(state): State<AppState>,
    Json(request): Json<PurchaseTicketRequest>,
) -> Result<(StatusCode, Json<PurchaseTicketResponse>)> {
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Validation error: {}", e)))?;

    let outcome = state.issuance_service.issue(request.into()).await?;

    Ok((StatusCode::CREATED, Json(outcome.into())))
}

/// GET /api/v1/tickets/verify/{code}
#[instrument(skip(state))]
pub async fn verify_ticket(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<VerifyTicketResponse>> {
    let outcome = state.verification_service.verify(&code).await?;

    Ok(Json(outcome.into()))
}

/// POST /api/v1/tickets/reprovision/{code}
///
/// Operational recovery for a sold-but-unprovisioned ticket. No-op if
/// the credential already exists on the device.
#[instrument(skip(state))]
pub async fn reprovision_ticket(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ReprovisionTicketResponse>> {
    let outcome = state.issuance_service.reprovision(&code).await?;

    Ok(Json(outcome.into()))
}

use std::sync::Arc;

use anyhow::anyhow;
use tracing::instrument;

use crate::{
    error::{ApiError, Result},
    models::common::TicketStatus,
    services::{catalog::Catalog, ledger::Ledger},
};

#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    pub code: String,
    pub status: TicketStatus,
    pub plan_name: String,
    pub duration_hours: i32,
    pub point_of_sale_name: String,
}

/// Portal-side lookup of a ticket by code. Reads ledger state only and
/// never consults the device: redemption legitimacy is decided at the
/// network-access layer, not re-derived here.
pub struct VerificationService {
    ledger: Arc<dyn Ledger>,
    catalog: Arc<dyn Catalog>,
}

impl VerificationService {
    pub fn new(ledger: Arc<dyn Ledger>, catalog: Arc<dyn Catalog>) -> Self {
        Self { ledger, catalog }
    }

    #[instrument(skip(self))]
    pub async fn verify(&self, code: &str) -> Result<VerificationOutcome> {
        let ticket = self
            .ledger
            .find_ticket_by_code(code)
            .await?
            .ok_or_else(|| ApiError::NotFound("Ticket not found".to_string()))?;

        let status = TicketStatus::from_str(&ticket.status).ok_or_else(|| {
            ApiError::Internal(anyhow!(
                "Ticket {} has unknown status {:?}",
                ticket.id,
                ticket.status
            ))
        })?;

        let plan = self
            .catalog
            .plan(ticket.plan_id)
            .await?
            .ok_or_else(|| anyhow!("Plan {} missing for ticket {}", ticket.plan_id, ticket.id))
            .map_err(ApiError::Internal)?;

        let point_of_sale = self
            .catalog
            .point_of_sale(ticket.point_of_sale_id)
            .await?
            .ok_or_else(|| {
                anyhow!(
                    "Point of sale {} missing for ticket {}",
                    ticket.point_of_sale_id,
                    ticket.id
                )
            })
            .map_err(ApiError::Internal)?;

        Ok(VerificationOutcome {
            code: ticket.code,
            status,
            plan_name: plan.name,
            duration_hours: plan.duration_hours,
            point_of_sale_name: point_of_sale.name,
        })
    }
}

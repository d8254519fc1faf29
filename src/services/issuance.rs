use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    config::IssuanceConfig,
    error::{ApiError, Result},
    models::common::{CustomerContact, PaymentMethod, PaymentStatus},
    services::{
        catalog::Catalog,
        ledger::Ledger,
        provisioning::{DeviceSettings, Provisioner},
    },
    utils::voucher::VoucherGenerator,
};

#[derive(Debug)]
pub struct IssueRequest {
    pub plan_id: Uuid,
    pub point_of_sale_id: Uuid,
    pub cashier_id: Uuid,
    pub payment_method: PaymentMethod,
    pub contact: CustomerContact,
}

#[derive(Debug, Clone)]
pub struct IssuanceOutcome {
    pub ticket_id: Uuid,
    pub sale_id: Uuid,
    pub code: String,
    pub plan_name: String,
    pub duration_hours: i32,
    pub price: i64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    /// Whether the code was written to the access device. Independent of
    /// purchase success; the two can diverge when the device is down.
    pub provisioned: bool,
}

#[derive(Debug, Clone)]
pub struct ReprovisionOutcome {
    pub code: String,
    pub provisioned: bool,
    pub already_present: bool,
}

/// The purchase saga: validate, generate, persist, provision, finalize.
/// Persisting and provisioning cannot share a transaction (the device
/// has no transactional API), so the one ordering rule is that the sale
/// is durable before the device is touched, and a device failure never
/// rolls the sale back.
pub struct IssuanceService {
    catalog: Arc<dyn Catalog>,
    ledger: Arc<dyn Ledger>,
    provisioner: Arc<dyn Provisioner>,
    max_code_attempts: u32,
}

impl IssuanceService {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        ledger: Arc<dyn Ledger>,
        provisioner: Arc<dyn Provisioner>,
        config: &IssuanceConfig,
    ) -> Self {
        Self {
            catalog,
            ledger,
            provisioner,
            max_code_attempts: config.max_code_attempts,
        }
    }

    #[instrument(
        skip(self, request),
        fields(plan_id = %request.plan_id, point_of_sale_id = %request.point_of_sale_id)
    )]
    pub async fn issue(&self, request: IssueRequest) -> Result<IssuanceOutcome> {
        // Validating: the plan and the selling location must both be
        // live. The binding of cashier to point of sale is asserted
        // upstream by the auth layer.
        let plan = self
            .catalog
            .plan(request.plan_id)
            .await?
            .filter(|plan| plan.is_active)
            .ok_or_else(|| ApiError::NotFound(format!("Plan {} not found", request.plan_id)))?;

        let point_of_sale = self
            .catalog
            .point_of_sale(request.point_of_sale_id)
            .await?
            .ok_or_else(|| {
                ApiError::BadRequest(format!(
                    "Point of sale {} not found",
                    request.point_of_sale_id
                ))
            })?;
        if !point_of_sale.is_active {
            return Err(ApiError::BadRequest(format!(
                "Point of sale {} is not active",
                point_of_sale.name
            )));
        }

        // Generating + Persisting
        let (ticket, sale) = self.persist_with_fresh_code(&plan, &request).await?;

        // Provisioning: best-effort. The sale is already durable and the
        // customer (conceptually) charged; an unreachable device must not
        // take the purchase down with it. Failures are surfaced in the
        // outcome, not as an error.
        let device = DeviceSettings::from(&point_of_sale);
        let provisioned = match self
            .provisioner
            .create_access_code(&device, &ticket.code, plan.duration_hours)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    code = %ticket.code,
                    ticket_id = %ticket.id,
                    error = %e,
                    "Voucher sold but not provisioned on device"
                );
                false
            }
        };

        // Finalizing: cash completes synchronously; mobile money stays
        // pending for the payment callback.
        let payment_status = if request.payment_method.is_cash() {
            self.ledger.mark_cash_completed(ticket.id, sale.id).await?;
            PaymentStatus::Completed
        } else {
            PaymentStatus::Pending
        };

        info!(
            code = %ticket.code,
            sale_id = %sale.id,
            amount = sale.amount,
            provisioned,
            "Issued voucher"
        );

        Ok(IssuanceOutcome {
            ticket_id: ticket.id,
            sale_id: sale.id,
            code: ticket.code,
            plan_name: plan.name,
            duration_hours: plan.duration_hours,
            price: plan.price,
            payment_method: request.payment_method,
            payment_status,
            provisioned,
        })
    }

    /// Optimistic-concurrency loop: generate a code, try the insert, and
    /// regenerate on the unique-index collision. Any non-Conflict
    /// persistence failure is fatal to the purchase.
    async fn persist_with_fresh_code(
        &self,
        plan: &entity::plans::Model,
        request: &IssueRequest,
    ) -> Result<(entity::tickets::Model, entity::sales::Model)> {
        for attempt in 1..=self.max_code_attempts {
            let code = VoucherGenerator::generate_voucher();
            match self
                .ledger
                .create_ticket_and_sale(
                    &code,
                    plan,
                    request.point_of_sale_id,
                    request.cashier_id,
                    request.payment_method,
                    &request.contact,
                )
                .await
            {
                Ok(pair) => return Ok(pair),
                Err(ApiError::Conflict(_)) => {
                    warn!(attempt, "Voucher code collision, regenerating");
                }
                Err(e) => return Err(e),
            }
        }

        Err(ApiError::Exhausted(format!(
            "No unique voucher code after {} attempts",
            self.max_code_attempts
        )))
    }

    /// Manual recovery for a sold-but-unprovisioned ticket. Unlike the
    /// purchase path, device failures here surface to the caller: this
    /// is a device-facing operation, not a sale.
    #[instrument(skip(self))]
    pub async fn reprovision(&self, code: &str) -> Result<ReprovisionOutcome> {
        let ticket = self
            .ledger
            .find_ticket_by_code(code)
            .await?
            .ok_or_else(|| ApiError::NotFound("Ticket not found".to_string()))?;

        let plan = self
            .catalog
            .plan(ticket.plan_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Plan {} not found", ticket.plan_id)))?;

        let point_of_sale = self
            .catalog
            .point_of_sale(ticket.point_of_sale_id)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!(
                    "Point of sale {} not found",
                    ticket.point_of_sale_id
                ))
            })?;

        let device = DeviceSettings::from(&point_of_sale);

        if self.provisioner.exists(&device, &ticket.code).await? {
            return Ok(ReprovisionOutcome {
                code: ticket.code,
                provisioned: true,
                already_present: true,
            });
        }

        self.provisioner
            .create_access_code(&device, &ticket.code, plan.duration_hours)
            .await?;

        info!(code = %ticket.code, "Reprovisioned voucher on device");

        Ok(ReprovisionOutcome {
            code: ticket.code,
            provisioned: true,
            already_present: false,
        })
    }
}

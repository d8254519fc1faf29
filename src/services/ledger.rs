use async_trait::async_trait;
use sea_orm::{entity::*, query::*, DatabaseConnection, DbErr, TransactionTrait};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    error::{ApiError, Result},
    models::common::{CustomerContact, PaymentMethod, PaymentStatus, TicketStatus},
};

/// The voucher ledger: source of truth for "was this voucher sold and is
/// it valid". Injected into the orchestrator as a trait so tests can
/// substitute an in-memory store.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Create the Ticket and its Sale as one logical unit: both rows are
    /// visible afterwards or neither is. A code collision surfaces as
    /// `Conflict`; the caller regenerates and retries.
    async fn create_ticket_and_sale(
        &self,
        code: &str,
        plan: &entity::plans::Model,
        point_of_sale_id: Uuid,
        cashier_id: Uuid,
        payment_method: PaymentMethod,
        contact: &CustomerContact,
    ) -> Result<(entity::tickets::Model, entity::sales::Model)>;

    /// Mark a cash sale completed and its ticket sold. Idempotent:
    /// re-applying to an already-completed sale is a no-op.
    async fn mark_cash_completed(&self, ticket_id: Uuid, sale_id: Uuid) -> Result<()>;

    async fn find_ticket_by_code(&self, code: &str) -> Result<Option<entity::tickets::Model>>;

    async fn find_sale_for_ticket(&self, ticket_id: Uuid)
        -> Result<Option<entity::sales::Model>>;
}

pub struct TicketLedger {
    db: DatabaseConnection,
}

impl TicketLedger {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// Detect PostgreSQL unique violations (error code 23505 or related
/// strings) without depending on a specific driver error shape.
fn is_unique_violation(err: &DbErr) -> bool {
    let msg = err.to_string().to_lowercase();
    msg.contains("unique") || msg.contains("duplicate") || msg.contains("23505")
}

#[async_trait]
impl Ledger for TicketLedger {
    #[instrument(skip(self, plan, contact), fields(plan_id = %plan.id))]
    async fn create_ticket_and_sale(
        &self,
        code: &str,
        plan: &entity::plans::Model,
        point_of_sale_id: Uuid,
        cashier_id: Uuid,
        payment_method: PaymentMethod,
        contact: &CustomerContact,
    ) -> Result<(entity::tickets::Model, entity::sales::Model)> {
        let txn = self.db.begin().await?;

        let now = time::OffsetDateTime::now_utc();
        let ticket_id = Uuid::new_v4();

        let new_ticket = entity::tickets::ActiveModel {
            id: Set(ticket_id),
            code: Set(code.to_string()),
            plan_id: Set(plan.id),
            point_of_sale_id: Set(point_of_sale_id),
            status: Set(TicketStatus::Available.as_str().to_string()),
            used_at: Set(None),
            expires_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        // The unique index on tickets.code is the collision detector for
        // concurrently-issued vouchers; surface it as Conflict so the
        // orchestrator can regenerate.
        let ticket = match new_ticket.insert(&txn).await {
            Ok(ticket) => ticket,
            Err(e) if is_unique_violation(&e) => {
                txn.rollback().await?;
                return Err(ApiError::Conflict(format!(
                    "Voucher code {} already exists",
                    code
                )));
            }
            Err(e) => return Err(e.into()),
        };

        // Amount is the plan price at this moment; later plan changes
        // must not alter historical sales.
        let new_sale = entity::sales::ActiveModel {
            id: Set(Uuid::new_v4()),
            ticket_id: Set(ticket.id),
            plan_id: Set(plan.id),
            point_of_sale_id: Set(point_of_sale_id),
            cashier_id: Set(cashier_id),
            payment_method: Set(payment_method.as_str().to_string()),
            amount: Set(plan.price),
            payment_status: Set(PaymentStatus::Pending.as_str().to_string()),
            transaction_id: Set(None),
            customer_email: Set(contact.email.clone()),
            customer_phone: Set(contact.phone.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        // A failed sale insert rolls the ticket back with the
        // transaction; no orphan ticket can remain.
        let sale = new_sale.insert(&txn).await?;

        txn.commit().await?;

        info!(
            ticket_id = %ticket.id,
            sale_id = %sale.id,
            amount = sale.amount,
            "Recorded ticket and sale"
        );

        Ok((ticket, sale))
    }

    #[instrument(skip(self))]
    async fn mark_cash_completed(&self, ticket_id: Uuid, sale_id: Uuid) -> Result<()> {
        let txn = self.db.begin().await?;

        let sale = entity::sales::Entity::find_by_id(sale_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Sale {} not found", sale_id)))?;

        let current = PaymentStatus::from_str(&sale.payment_status).ok_or_else(|| {
            ApiError::Internal(anyhow::anyhow!(
                "Sale {} has unknown payment status {:?}",
                sale_id,
                sale.payment_status
            ))
        })?;

        if current == PaymentStatus::Completed {
            // Already applied; nothing to do.
            txn.commit().await?;
            return Ok(());
        }

        if !current.can_transition_to(PaymentStatus::Completed) {
            txn.rollback().await?;
            return Err(ApiError::Conflict(format!(
                "Sale {} is {} and cannot be completed",
                sale_id,
                current.as_str()
            )));
        }

        let now = time::OffsetDateTime::now_utc();

        let mut sale_active: entity::sales::ActiveModel = sale.into();
        sale_active.payment_status = Set(PaymentStatus::Completed.as_str().to_string());
        sale_active.transaction_id = Set(Some(format!("CASH-{}", now.unix_timestamp())));
        sale_active.updated_at = Set(now);
        sale_active.update(&txn).await?;

        let ticket = entity::tickets::Entity::find_by_id(ticket_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Ticket {} not found", ticket_id)))?;

        let mut ticket_active: entity::tickets::ActiveModel = ticket.into();
        ticket_active.status = Set(TicketStatus::Sold.as_str().to_string());
        ticket_active.updated_at = Set(now);
        ticket_active.update(&txn).await?;

        txn.commit().await?;

        info!(%ticket_id, %sale_id, "Cash sale completed, ticket sold");

        Ok(())
    }

    async fn find_ticket_by_code(&self, code: &str) -> Result<Option<entity::tickets::Model>> {
        Ok(entity::tickets::Entity::find()
            .filter(entity::tickets::Column::Code.eq(code))
            .one(&self.db)
            .await?)
    }

    async fn find_sale_for_ticket(
        &self,
        ticket_id: Uuid,
    ) -> Result<Option<entity::sales::Model>> {
        Ok(entity::sales::Entity::find()
            .filter(entity::sales::Column::TicketId.eq(ticket_id))
            .one(&self.db)
            .await?)
    }
}

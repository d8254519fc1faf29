use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::common::{CustomerContact, PaymentMethod, PaymentStatus, TicketStatus};
use crate::services::issuance::{IssuanceOutcome, IssueRequest, ReprovisionOutcome};
use crate::services::verification::VerificationOutcome;

/// Purchase Ticket Request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseTicketRequest {
    pub plan_id: Uuid,
    pub payment_method: PaymentMethod,
    pub point_of_sale_id: Uuid,
    pub cashier_id: Uuid,
    #[validate(email)]
    pub customer_email: Option<String>,
    #[validate(length(max = 20))]
    pub customer_phone: Option<String>,
}

impl From<PurchaseTicketRequest> for IssueRequest {
    fn from(request: PurchaseTicketRequest) -> Self {
        IssueRequest {
            plan_id: request.plan_id,
            point_of_sale_id: request.point_of_sale_id,
            cashier_id: request.cashier_id,
            payment_method: request.payment_method,
            contact: CustomerContact {
                email: request.customer_email,
                phone: request.customer_phone,
            },
        }
    }
}

/// Purchase Ticket Response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseTicketResponse {
    pub success: bool,
    pub data: IssuedTicketData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedTicketData {
    pub code: String,
    pub plan_name: String,
    pub duration_hours: i32,
    pub price: i64,
    pub sale_id: Uuid,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    // Whether the voucher is usable on the network right now. A purchase
    // can succeed while the device write fails; the caller must be able
    // to tell the two apart.
    pub provisioned: bool,
}

impl From<IssuanceOutcome> for PurchaseTicketResponse {
    fn from(outcome: IssuanceOutcome) -> Self {
        Self {
            success: true,
            data: IssuedTicketData {
                code: outcome.code,
                plan_name: outcome.plan_name,
                duration_hours: outcome.duration_hours,
                price: outcome.price,
                sale_id: outcome.sale_id,
                payment_method: outcome.payment_method,
                payment_status: outcome.payment_status,
                provisioned: outcome.provisioned,
            },
        }
    }
}

/// Verify Ticket Response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyTicketResponse {
    pub success: bool,
    pub data: VerifiedTicketData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedTicketData {
    pub code: String,
    pub status: TicketStatus,
    pub plan_name: String,
    pub duration_hours: i32,
    pub point_of_sale_name: String,
}

impl From<VerificationOutcome> for VerifyTicketResponse {
    fn from(outcome: VerificationOutcome) -> Self {
        Self {
            success: true,
            data: VerifiedTicketData {
                code: outcome.code,
                status: outcome.status,
                plan_name: outcome.plan_name,
                duration_hours: outcome.duration_hours,
                point_of_sale_name: outcome.point_of_sale_name,
            },
        }
    }
}

/// Reprovision Ticket Response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReprovisionTicketResponse {
    pub success: bool,
    pub data: ReprovisionedTicketData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReprovisionedTicketData {
    pub code: String,
    pub provisioned: bool,
    pub already_present: bool,
}

impl From<ReprovisionOutcome> for ReprovisionTicketResponse {
    fn from(outcome: ReprovisionOutcome) -> Self {
        Self {
            success: true,
            data: ReprovisionedTicketData {
                code: outcome.code,
                provisioned: outcome.provisioned,
                already_present: outcome.already_present,
            },
        }
    }
}

use serde::{Deserialize, Serialize};

/// Payment method accepted at the point of sale. Cash completes
/// synchronously; the mobile-money methods stay pending until the
/// payment provider calls back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    OrangeMoney,
    Mvola,
}

impl PaymentMethod {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cash" => Some(Self::Cash),
            "orange_money" => Some(Self::OrangeMoney),
            "mvola" => Some(Self::Mvola),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::OrangeMoney => "orange_money",
            Self::Mvola => "mvola",
        }
    }

    pub fn is_cash(&self) -> bool {
        matches!(self, Self::Cash)
    }
}

/// Ticket lifecycle. Issuance only ever drives available → sold;
/// used/expired belong to portal-side redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Available,
    Sold,
    Used,
    Expired,
}

impl TicketStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "available" => Some(Self::Available),
            "sold" => Some(Self::Sold),
            "used" => Some(Self::Used),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Sold => "sold",
            Self::Used => "used",
            Self::Expired => "expired",
        }
    }
}

/// Payment state of a sale. Transitions are forward-only:
/// pending → completed or pending → failed, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether a sale in this state may move to `next`.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Completed) | (Self::Pending, Self::Failed)
        )
    }
}

/// Optional customer contact captured with a sale (receipt delivery).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerContact {
    pub email: Option<String>,
    pub phone: Option<String>,
}

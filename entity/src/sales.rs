use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// The commercial transaction behind one ticket (1:1 via the unique
/// `ticket_id`). `amount` is the plan price at the moment of sale and is
/// never recomputed; `payment_status` only moves forward
/// (pending → completed | failed).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sales")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub ticket_id: Uuid,
    pub plan_id: Uuid,
    pub point_of_sale_id: Uuid,
    pub cashier_id: Uuid,
    pub payment_method: String,
    pub amount: i64,
    pub payment_status: String,
    pub transaction_id: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub created_at: TimeDateTimeWithTimeZone,
    pub updated_at: TimeDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tickets::Entity",
        from = "Column::TicketId",
        to = "super::tickets::Column::Id"
    )]
    Tickets,
    #[sea_orm(
        belongs_to = "super::plans::Entity",
        from = "Column::PlanId",
        to = "super::plans::Column::Id"
    )]
    Plans,
    #[sea_orm(
        belongs_to = "super::points_of_sale::Entity",
        from = "Column::PointOfSaleId",
        to = "super::points_of_sale::Column::Id"
    )]
    PointsOfSale,
}

impl Related<super::tickets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tickets.def()
    }
}

impl Related<super::plans::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Plans.def()
    }
}

impl Related<super::points_of_sale::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PointsOfSale.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One issued voucher. `code` is globally unique for the lifetime of the
/// system and never changes after creation; `status` moves
/// available → sold at purchase time, used/expired are written by the
/// portal-side redemption flow.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tickets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    pub plan_id: Uuid,
    pub point_of_sale_id: Uuid,
    pub status: String,
    pub used_at: Option<TimeDateTimeWithTimeZone>,
    pub expires_at: Option<TimeDateTimeWithTimeZone>,
    pub created_at: TimeDateTimeWithTimeZone,
    pub updated_at: TimeDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
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
    #[sea_orm(has_one = "super::sales::Entity")]
    Sales,
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

impl Related<super::sales::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sales.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

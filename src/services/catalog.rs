use async_trait::async_trait;
use sea_orm::{DatabaseConnection, EntityTrait};
use uuid::Uuid;

use crate::error::Result;

/// Read-only access to the sales catalog (plans and points of sale).
/// CRUD for these lives outside the issuance core; issuance only ever
/// looks records up.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn plan(&self, plan_id: Uuid) -> Result<Option<entity::plans::Model>>;

    async fn point_of_sale(
        &self,
        point_of_sale_id: Uuid,
    ) -> Result<Option<entity::points_of_sale::Model>>;
}

pub struct CatalogService {
    db: DatabaseConnection,
}

impl CatalogService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Catalog for CatalogService {
    async fn plan(&self, plan_id: Uuid) -> Result<Option<entity::plans::Model>> {
        Ok(entity::plans::Entity::find_by_id(plan_id)
            .one(&self.db)
            .await?)
    }

    async fn point_of_sale(
        &self,
        point_of_sale_id: Uuid,
    ) -> Result<Option<entity::points_of_sale::Model>> {
        Ok(entity::points_of_sale::Entity::find_by_id(point_of_sale_id)
            .one(&self.db)
            .await?)
    }
}

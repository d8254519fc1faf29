use crate::{
    config::Config,
    services::{
        CatalogService, DeviceProvisioner, IssuanceService, TicketLedger, VerificationService,
    },
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub issuance_service: Arc<IssuanceService>,
    pub verification_service: Arc<VerificationService>,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        // Connect to database; the connection handle is injected into
        // every service rather than read from a global.
        let db = sea_orm::Database::connect(&config.database.url).await?;

        // Initialize services
        let catalog = Arc::new(CatalogService::new(db.clone()));
        let ledger = Arc::new(TicketLedger::new(db.clone()));
        let provisioner = Arc::new(DeviceProvisioner::new(&config.device));

        let issuance_service = Arc::new(IssuanceService::new(
            catalog.clone(),
            ledger.clone(),
            provisioner,
            &config.issuance,
        ));
        let verification_service = Arc::new(VerificationService::new(ledger, catalog));

        Ok(Self {
            db,
            issuance_service,
            verification_service,
            config: Arc::new(config),
        })
    }
}

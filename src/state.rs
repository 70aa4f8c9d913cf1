use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::{DbPool, OrmConn, orm_from_pool},
    services::payment_simulator::PaymentSimulator,
};

/// Handles passed explicitly into every service call.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub payments: PaymentSimulator,
}

impl AppState {
    pub fn new(pool: DbPool, config: AppConfig) -> Self {
        let orm = orm_from_pool(&pool);
        let payments = PaymentSimulator::from_config(&config);
        Self {
            pool,
            orm,
            config: Arc::new(config),
            payments,
        }
    }
}

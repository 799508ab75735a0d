pub mod health;
pub mod metrics_handler;
pub mod query;
pub mod resources;

use std::sync::Arc;

use crate::datasource::Datasource;

/// Shared state of the datasource routes
#[derive(Clone)]
pub struct AppState {
    pub datasource: Arc<Datasource>,
}

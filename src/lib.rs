pub mod aggregator;
pub mod cache;
pub mod config;
pub mod handlers;
pub mod models;
pub mod resolver;
pub mod sources;

use std::sync::Arc;

use aggregator::Aggregator;
use models::target::Target;

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub targets: Arc<Vec<Target>>,
}

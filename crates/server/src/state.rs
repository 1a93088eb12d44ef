use std::sync::Arc;

use herald_dispatch::Scheduler;
use herald_storage::{CacheSink, MessageStore};

pub struct AppState {
    pub store: Arc<dyn MessageStore>,
    pub cache: Arc<dyn CacheSink>,
    pub scheduler: Scheduler,
}

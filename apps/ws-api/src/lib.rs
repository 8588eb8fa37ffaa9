pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod routes;

use std::sync::Arc;

use config::Config;
use db::comments::CommentStore;
use db::kv::KeyValueStore;
use gateway::fanout::Fanout;
use gateway::history::RecentHistory;
use gateway::pipeline::CommentPipeline;
use gateway::rooms::RoomRegistry;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub kv: Arc<dyn KeyValueStore>,
    pub fanout: Arc<Fanout>,
    pub pipeline: Arc<CommentPipeline>,
}

impl AppState {
    /// Wire the gateway around the given comment store and cache.
    pub fn new(config: Config, store: Arc<dyn CommentStore>, kv: Arc<dyn KeyValueStore>) -> Self {
        let fanout = Arc::new(Fanout::new(Arc::new(RoomRegistry::new())));
        let history = RecentHistory::new(kv.clone(), config.history_max_len);
        let pipeline = Arc::new(CommentPipeline::new(
            store,
            fanout.clone(),
            history,
            config.history_default_limit,
        ));

        Self {
            config: Arc::new(config),
            kv,
            fanout,
            pipeline,
        }
    }
}

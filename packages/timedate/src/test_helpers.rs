use std::sync::Arc;
use std::time::Duration;

use timedate_origin::OriginMatcher;
use tokio_util::sync::CancellationToken;

use crate::AppState;
use crate::config::{FileConfig, ServerConfig};
use crate::metrics::ServerMetrics;
use crate::time_service::TimeService;

/// Build an `AppState` from default config with the given origin allow list
/// and a short tick so streaming tests finish quickly.
pub fn test_app_state(allowed_origins: &[&str]) -> AppState {
    let mut file_config = FileConfig::default();
    file_config.cors.allowed_origins = allowed_origins.iter().map(|s| s.to_string()).collect();
    let mut config = ServerConfig::from_file(&file_config);
    config.websocket.tick_interval = Duration::from_millis(50);

    AppState {
        origin_matcher: Arc::new(OriginMatcher::compile(&config.cors.allowed_origins)),
        config: Arc::new(config),
        time_service: TimeService::new(),
        metrics: Arc::new(ServerMetrics::new()),
        shutdown: CancellationToken::new(),
    }
}

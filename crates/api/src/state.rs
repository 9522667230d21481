//! Shared application state for the Axum API server.

use std::sync::Arc;

use herald_channels::ChannelSet;
use herald_common::config::HeraldConfig;
use herald_common::store::RecordStore;
use herald_engine::dispatcher::NotificationDispatcher;
use herald_scanner::scans::ScanService;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub channels: Arc<ChannelSet>,
    pub scans: Arc<ScanService>,
    pub config: HeraldConfig,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RecordStore>,
        dispatcher: Arc<NotificationDispatcher>,
        channels: Arc<ChannelSet>,
        scans: Arc<ScanService>,
        config: HeraldConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            channels,
            scans,
            config,
        }
    }
}

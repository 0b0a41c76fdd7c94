use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{IssueTrackerService, TicketStore};

#[derive(Clone)]
pub struct AppContext {
    pub config: AppConfig,
    pub issue_tracker: Arc<dyn IssueTrackerService>,
    pub store: Arc<dyn TicketStore>,
}

impl AppContext {
    pub fn new(
        config: AppConfig,
        issue_tracker: Arc<dyn IssueTrackerService>,
        store: Arc<dyn TicketStore>,
    ) -> Self {
        Self {
            config,
            issue_tracker,
            store,
        }
    }
}

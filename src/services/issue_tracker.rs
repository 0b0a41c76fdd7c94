use async_trait::async_trait;

use crate::domain::issue::{CreatedIssue, Issue, NewIssue, SearchPage, Transition, UpdateFields};
use crate::domain::ticket::LinkKind;
use crate::error::TrackerResult;

pub const SEARCH_ALL_PAGE_SIZE: u32 = 100;

/// Typed operations against the remote issue tracker.
///
/// Errors keep their underlying kind; implementations only add context.
#[async_trait]
pub trait IssueTrackerService: Send + Sync {
    async fn create_issue(&self, issue: &NewIssue) -> TrackerResult<CreatedIssue>;
    async fn get_issue(&self, key: &str) -> TrackerResult<Issue>;
    async fn update_issue(&self, key: &str, fields: &UpdateFields) -> TrackerResult<()>;
    async fn transitions(&self, key: &str) -> TrackerResult<Vec<Transition>>;
    async fn transition_issue(&self, key: &str, transition_id: &str) -> TrackerResult<()>;
    async fn search_issues(
        &self,
        query: &str,
        start_at: u32,
        max_results: u32,
    ) -> TrackerResult<SearchPage>;

    /// Every issue matching `query`, in search order.
    async fn search_all(&self, query: &str) -> TrackerResult<Vec<Issue>> {
        let mut issues = Vec::new();
        loop {
            let page = self
                .search_issues(query, issues.len() as u32, SEARCH_ALL_PAGE_SIZE)
                .await?;
            let last = page.is_last();
            issues.extend(page.issues);
            if last {
                return Ok(issues);
            }
        }
    }

    /// Links `outward_key --[kind]--> inward_key`.
    async fn link_issues(
        &self,
        kind: &LinkKind,
        outward_key: &str,
        inward_key: &str,
    ) -> TrackerResult<()>;

    /// `blocker` blocks `blocked`.
    async fn link_blocks(&self, blocker: &str, blocked: &str) -> TrackerResult<()> {
        self.link_issues(&LinkKind::Blocks, blocker, blocked).await
    }
}

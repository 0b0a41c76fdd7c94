//! In-memory issue tracker and context builders used by workflow tests.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{AppConfig, ConfigOverrides, ProjectInfo, StoredConfig};
use crate::context::AppContext;
use crate::domain::issue::{
    CreatedIssue, Issue, IssueFields, NamedRef, NewIssue, SearchPage, Transition, UpdateFields,
};
use crate::domain::ticket::LinkKind;
use crate::error::{TrackerError, TrackerResult};
use crate::infra::store::JsonTicketStore;
use crate::services::IssueTrackerService;

#[derive(Default)]
struct State {
    existing: HashSet<String>,
    created: Vec<NewIssue>,
    next_number: u32,
    failing_summaries: HashSet<String>,
    failing_blockers: HashSet<String>,
    lookup_errors: HashMap<String, TrackerError>,
    links: Vec<(String, String, String)>,
    lookups: Vec<String>,
    searchable: Vec<Issue>,
    searches: Vec<(String, u32, u32)>,
}

#[derive(Default)]
pub struct MockTracker {
    state: Mutex<State>,
    create_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_existing(self, keys: &[&str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.existing.extend(keys.iter().map(|key| key.to_string()));
        }
        self
    }

    /// Issues returned, in order, by every search regardless of the query.
    pub fn with_search_results(self, issues: Vec<Issue>) -> Self {
        self.state.lock().unwrap().searchable = issues;
        self
    }

    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }

    /// Creating a ticket with this summary fails with an exhausted 503.
    pub fn failing_create(self, summary: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_summaries
            .insert(summary.to_string());
        self
    }

    /// Any link whose outward issue is `blocker` fails.
    pub fn failing_link_from(self, blocker: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_blockers
            .insert(blocker.to_string());
        self
    }

    pub fn failing_lookup(self, key: &str, error: TrackerError) -> Self {
        self.state
            .lock()
            .unwrap()
            .lookup_errors
            .insert(key.to_string(), error);
        self
    }

    pub fn created(&self) -> Vec<NewIssue> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn links(&self) -> Vec<(String, String, String)> {
        self.state.lock().unwrap().links.clone()
    }

    pub fn lookups(&self) -> Vec<String> {
        self.state.lock().unwrap().lookups.clone()
    }

    /// `(query, start_at, max_results)` of every search call.
    pub fn searches(&self) -> Vec<(String, u32, u32)> {
        self.state.lock().unwrap().searches.clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IssueTrackerService for MockTracker {
    async fn create_issue(&self, issue: &NewIssue) -> TrackerResult<CreatedIssue> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.create_delay.is_zero() {
            tokio::time::sleep(self.create_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut state = self.state.lock().unwrap();
        if state.failing_summaries.contains(&issue.summary) {
            return Err(TrackerError::ExhaustedRetries {
                attempts: 4,
                last: Box::new(TrackerError::Server { status: 503 }),
            }
            .context("failed to create issue"));
        }
        state.next_number += 1;
        let key = format!("{}-{}", issue.project_key, 100 + state.next_number);
        state.created.push(issue.clone());
        state.existing.insert(key.clone());
        Ok(CreatedIssue {
            id: (10_000 + state.next_number).to_string(),
            key,
        })
    }

    async fn get_issue(&self, key: &str) -> TrackerResult<Issue> {
        let mut state = self.state.lock().unwrap();
        state.lookups.push(key.to_string());
        if let Some(err) = state.lookup_errors.get(key) {
            return Err(err.clone().context(format!("failed to get issue {key}")));
        }
        if !state.existing.contains(key) {
            return Err(TrackerError::NotFound {
                resource: "issue".to_string(),
                key: Some(key.to_string()),
            }
            .context(format!("failed to get issue {key}")));
        }
        Ok(Issue {
            id: String::new(),
            key: key.to_string(),
            fields: IssueFields::default(),
        })
    }

    async fn update_issue(&self, key: &str, _fields: &UpdateFields) -> TrackerResult<()> {
        self.get_issue(key).await.map(|_| ())
    }

    async fn transitions(&self, _key: &str) -> TrackerResult<Vec<Transition>> {
        Ok(Vec::new())
    }

    async fn transition_issue(&self, _key: &str, _transition_id: &str) -> TrackerResult<()> {
        Ok(())
    }

    async fn search_issues(
        &self,
        query: &str,
        start_at: u32,
        max_results: u32,
    ) -> TrackerResult<SearchPage> {
        let mut state = self.state.lock().unwrap();
        state
            .searches
            .push((query.to_string(), start_at, max_results));
        let issues = state
            .searchable
            .iter()
            .skip(start_at as usize)
            .take(max_results as usize)
            .cloned()
            .collect();
        Ok(SearchPage {
            start_at,
            max_results,
            total: state.searchable.len() as u32,
            issues,
        })
    }

    async fn link_issues(
        &self,
        kind: &LinkKind,
        outward_key: &str,
        inward_key: &str,
    ) -> TrackerResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing_blockers.contains(outward_key) {
            return Err(TrackerError::transport(Some(400), "link rejected").context(format!(
                "failed to link issues {outward_key} --[{kind}]--> {inward_key}"
            )));
        }
        state.links.push((
            kind.as_str().to_string(),
            outward_key.to_string(),
            inward_key.to_string(),
        ));
        Ok(())
    }
}

/// Issue as a search would return it, with the given status.
pub fn issue(key: &str, summary: &str, status: &str) -> Issue {
    Issue {
        id: String::new(),
        key: key.to_string(),
        fields: IssueFields {
            summary: summary.to_string(),
            status: Some(NamedRef {
                name: status.to_string(),
            }),
            ..IssueFields::default()
        },
    }
}

/// Context for project `PROJ` whose ticket store lives in `dir`. Keys starting with
/// `PROJ` map to the logical project `Platform`.
pub fn test_context(
    tracker: Arc<MockTracker>,
    dir: &Path,
) -> (AppContext, Arc<JsonTicketStore>) {
    let stored = StoredConfig {
        jira_base_url: Some("https://jira.example.com/".to_string()),
        jira_email: Some("dev@example.com".to_string()),
        jira_token: Some("token".to_string()),
        default_project: Some("PROJ".to_string()),
        ..StoredConfig::default()
    };
    let mut config = AppConfig::resolve(stored, &ConfigOverrides::default(), |_| None, dir);
    config.project_mapping.mappings.insert(
        "Platform".to_string(),
        ProjectInfo {
            ticket_keys: vec!["PROJ".to_string()],
            description: String::new(),
        },
    );
    let store = Arc::new(JsonTicketStore::new(config.store_path.clone()));
    (AppContext::new(config, tracker, store.clone()), store)
}

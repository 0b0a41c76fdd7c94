use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::issue::{
    CreatedIssue, Issue, NewIssue, SearchPage, Transition, TransitionList, UpdateFields,
};
use crate::domain::ticket::LinkKind;
use crate::error::{TrackerError, TrackerResult, TrackerResultExt};
use crate::infra::http::{ClientConfig, JiraTransport, encode_body};
use crate::services::IssueTrackerService;

const ISSUE_PATH: &str = "/rest/api/3/issue";
const ISSUE_LINK_PATH: &str = "/rest/api/3/issueLink";
const SEARCH_PATH: &str = "/rest/api/3/search/jql";
const SEARCH_COUNT_PATH: &str = "/rest/api/3/search/approximate-count";
/// Largest page the search endpoint hands out.
const SEARCH_PAGE_LIMIT: u32 = 100;
/// The search endpoint returns bare ids unless fields are requested.
const SEARCH_FIELDS: [&str; 9] = [
    "summary",
    "description",
    "status",
    "issuetype",
    "priority",
    "assignee",
    "reporter",
    "labels",
    "components",
];

pub struct JiraClient {
    transport: JiraTransport,
}

impl JiraClient {
    pub fn new(config: ClientConfig) -> TrackerResult<Self> {
        Ok(Self {
            transport: JiraTransport::new(config)?,
        })
    }

    fn issue_path(key: &str) -> String {
        format!("{ISSUE_PATH}/{}", key.trim())
    }

    /// Follows page tokens from the first match until `limit` issues are collected
    /// or the results run out.
    async fn collect_matches(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> TrackerResult<Vec<Issue>> {
        let mut issues = Vec::new();
        let mut next_page_token: Option<String> = None;
        loop {
            let remaining = limit.map_or(SEARCH_PAGE_LIMIT as usize, |limit| {
                limit.saturating_sub(issues.len())
            });
            if remaining == 0 {
                return Ok(issues);
            }
            let body = encode_body(&JiraSearchRequest {
                jql: query,
                max_results: remaining.min(SEARCH_PAGE_LIMIT as usize) as u32,
                fields: &SEARCH_FIELDS,
                next_page_token: next_page_token.as_deref(),
            })?;
            let page: JiraSearchResponse = self
                .transport
                .request(Method::POST, SEARCH_PATH, Some(&body))
                .await
                .context_with(|| "failed to search issues")?;
            debug!("Search returned {} issue(s)", page.issues.len());

            let exhausted = page.is_last || page.issues.is_empty();
            issues.extend(page.issues);
            next_page_token = page.next_page_token;
            if exhausted || next_page_token.is_none() {
                return Ok(issues);
            }
        }
    }

    async fn count_matches(&self, query: &str) -> TrackerResult<u32> {
        let body = encode_body(&JiraCountRequest { jql: query })?;
        let count: JiraCountResponse = self
            .transport
            .request(Method::POST, SEARCH_COUNT_PATH, Some(&body))
            .await
            .context_with(|| "failed to count issues")?;
        Ok(count.count)
    }
}

#[async_trait]
impl IssueTrackerService for JiraClient {
    async fn create_issue(&self, issue: &NewIssue) -> TrackerResult<CreatedIssue> {
        let body = encode_body(&JiraCreateIssueRequest::new(issue))?;
        let created: CreatedIssue = self
            .transport
            .request(Method::POST, ISSUE_PATH, Some(&body))
            .await
            .context_with(|| "failed to create issue")?;
        info!("Created issue {} (id {})", created.key, created.id);
        Ok(created)
    }

    async fn get_issue(&self, key: &str) -> TrackerResult<Issue> {
        self.transport
            .request(Method::GET, &Self::issue_path(key), None)
            .await
            .map_err(|err| match err {
                TrackerError::NotFound { .. } => TrackerError::NotFound {
                    resource: "issue".to_string(),
                    key: Some(key.to_string()),
                },
                other => other,
            })
            .context_with(|| format!("failed to get issue {key}"))
    }

    async fn update_issue(&self, key: &str, fields: &UpdateFields) -> TrackerResult<()> {
        let body = encode_body(&JiraUpdateIssueRequest::new(fields))?;
        self.transport
            .request_unit(Method::PUT, &Self::issue_path(key), Some(&body))
            .await
            .context_with(|| format!("failed to update issue {key}"))?;
        debug!("Updated issue {}", key);
        Ok(())
    }

    async fn transitions(&self, key: &str) -> TrackerResult<Vec<Transition>> {
        let path = format!("{}/transitions", Self::issue_path(key));
        let list: TransitionList = self
            .transport
            .request(Method::GET, &path, None)
            .await
            .context_with(|| format!("failed to get transitions for {key}"))?;
        Ok(list.transitions)
    }

    async fn transition_issue(&self, key: &str, transition_id: &str) -> TrackerResult<()> {
        let path = format!("{}/transitions", Self::issue_path(key));
        let body = encode_body(&JiraTransitionRequest {
            transition: JiraId {
                id: transition_id.to_string(),
            },
        })?;
        self.transport
            .request_unit(Method::POST, &path, Some(&body))
            .await
            .context_with(|| format!("failed to transition issue {key}"))
    }

    async fn search_issues(
        &self,
        query: &str,
        start_at: u32,
        max_results: u32,
    ) -> TrackerResult<SearchPage> {
        let wanted = start_at as usize + max_results as usize;
        let issues = self
            .collect_matches(query, Some(wanted))
            .await?
            .into_iter()
            .skip(start_at as usize)
            .take(max_results as usize)
            .collect::<Vec<_>>();
        let seen = start_at.saturating_add(issues.len() as u32);
        let total = match self.count_matches(query).await {
            Ok(count) => count.max(seen),
            Err(err) => {
                warn!("{err}");
                seen
            }
        };
        Ok(SearchPage {
            start_at,
            max_results,
            total,
            issues,
        })
    }

    async fn search_all(&self, query: &str) -> TrackerResult<Vec<Issue>> {
        self.collect_matches(query, None).await
    }

    async fn link_issues(
        &self,
        kind: &LinkKind,
        outward_key: &str,
        inward_key: &str,
    ) -> TrackerResult<()> {
        let body = encode_body(&JiraLinkRequest {
            link_type: JiraName {
                name: kind.as_str().to_string(),
            },
            outward_issue: JiraKey {
                key: outward_key.to_string(),
            },
            inward_issue: JiraKey {
                key: inward_key.to_string(),
            },
        })?;
        self.transport
            .request_unit(Method::POST, ISSUE_LINK_PATH, Some(&body))
            .await
            .context_with(|| {
                format!("failed to link issues {outward_key} --[{kind}]--> {inward_key}")
            })?;
        debug!("Linked {} --[{}]--> {}", outward_key, kind, inward_key);
        Ok(())
    }
}

#[derive(Serialize)]
struct JiraCreateIssueRequest {
    fields: JiraCreateIssueFields,
}

impl JiraCreateIssueRequest {
    fn new(issue: &NewIssue) -> Self {
        Self {
            fields: JiraCreateIssueFields {
                project: JiraKey {
                    key: issue.project_key.trim().to_string(),
                },
                summary: issue.summary.trim().to_string(),
                description: JiraDescription::from_text(&issue.description),
                issuetype: JiraName {
                    name: issue.issue_type.trim().to_string(),
                },
                priority: non_blank(issue.priority.as_deref()).map(|name| JiraName { name }),
                assignee: non_blank(issue.assignee.as_deref())
                    .map(|account_id| JiraAccount { account_id }),
                labels: issue.labels.clone(),
                components: issue
                    .components
                    .iter()
                    .map(|name| JiraName { name: name.clone() })
                    .collect(),
            },
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[derive(Serialize)]
struct JiraCreateIssueFields {
    project: JiraKey,
    summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<JiraDescription>,
    issuetype: JiraName,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<JiraName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assignee: Option<JiraAccount>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    labels: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    components: Vec<JiraName>,
}

#[derive(Serialize)]
struct JiraUpdateIssueRequest {
    fields: JiraUpdateFields,
}

impl JiraUpdateIssueRequest {
    fn new(fields: &UpdateFields) -> Self {
        Self {
            fields: JiraUpdateFields {
                summary: fields.summary.clone(),
                description: fields
                    .description
                    .as_deref()
                    .and_then(JiraDescription::from_text),
                priority: non_blank(fields.priority.as_deref()).map(|name| JiraName { name }),
                assignee: non_blank(fields.assignee.as_deref())
                    .map(|account_id| JiraAccount { account_id }),
                labels: fields.labels.clone(),
            },
        }
    }
}

#[derive(Serialize)]
struct JiraUpdateFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<JiraDescription>,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<JiraName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assignee: Option<JiraAccount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<Vec<String>>,
}

#[derive(Serialize)]
struct JiraKey {
    key: String,
}

#[derive(Serialize)]
struct JiraName {
    name: String,
}

#[derive(Serialize)]
struct JiraId {
    id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JiraAccount {
    account_id: String,
}

#[derive(Serialize)]
struct JiraTransitionRequest {
    transition: JiraId,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JiraSearchRequest<'a> {
    jql: &'a str,
    max_results: u32,
    fields: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    next_page_token: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JiraSearchResponse {
    #[serde(default)]
    issues: Vec<Issue>,
    next_page_token: Option<String>,
    #[serde(default)]
    is_last: bool,
}

#[derive(Serialize)]
struct JiraCountRequest<'a> {
    jql: &'a str,
}

#[derive(Deserialize)]
struct JiraCountResponse {
    count: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JiraLinkRequest {
    #[serde(rename = "type")]
    link_type: JiraName,
    outward_issue: JiraKey,
    inward_issue: JiraKey,
}

#[derive(Serialize)]
struct JiraDescription {
    #[serde(rename = "type")]
    doc_type: &'static str,
    version: u8,
    content: Vec<JiraDocNode>,
}

impl JiraDescription {
    /// One paragraph per blank-line separated block; `None` when there is no text.
    fn from_text(description: &str) -> Option<Self> {
        let cleaned = description.replace('\r', "");
        let content = cleaned
            .split("\n\n")
            .map(|section| section.trim())
            .filter(|section| !section.is_empty())
            .map(|section| JiraDocNode::paragraph(section.replace('\n', " ")))
            .collect::<Vec<_>>();

        if content.is_empty() {
            return None;
        }
        Some(Self {
            doc_type: "doc",
            version: 1,
            content,
        })
    }
}

#[derive(Serialize)]
struct JiraDocNode {
    #[serde(rename = "type")]
    node_type: &'static str,
    content: Vec<JiraDocText>,
}

impl JiraDocNode {
    fn paragraph(text: String) -> Self {
        Self {
            node_type: "paragraph",
            content: vec![JiraDocText::text(text)],
        }
    }
}

#[derive(Serialize)]
struct JiraDocText {
    #[serde(rename = "type")]
    text_type: &'static str,
    text: String,
}

impl JiraDocText {
    fn text(text: String) -> Self {
        Self {
            text_type: "text",
            text,
        }
    }
}

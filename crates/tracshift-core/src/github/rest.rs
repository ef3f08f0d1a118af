//! ureq-backed GitHub REST v3 transport.
//!
//! One client serves all configured identities: each mutating call names
//! the acting login and the matching token is used, falling back to the
//! default credential. The client tracks the request-rate quota from the
//! `X-RateLimit-*` response headers and sleeps the execution thread when
//! the remaining quota runs low — the migration is strictly sequential, so
//! blocking here blocks everything, which is exactly the intent.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::cell::Cell;
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use super::{
    ApiError, IssuePatch, IssueTracker, MilestoneInfo, MilestoneState, NewMilestone, RepoSlug,
    truncate_body,
};
use crate::config::Credential;

const API_ROOT: &str = "https://api.github.com";
const PAGE_SIZE: usize = 100;

/// Sleep when the observed remaining quota drops below this.
const LOW_QUOTA: u32 = 16;

/// Upper bound on a single quota sleep.
const MAX_QUOTA_SLEEP: Duration = Duration::from_secs(3_600);

#[derive(Debug, Clone, Deserialize)]
struct ApiMilestone {
    number: u64,
    title: String,
    state: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiUser {
    login: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiIssue {
    title: String,
    #[serde(default)]
    pull_request: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct Created {
    number: u64,
}

pub struct RestTracker {
    slug: RepoSlug,
    tokens: BTreeMap<String, String>,
    default_login: String,
    requests: Cell<usize>,
    remaining: Cell<u32>,
    limit: Cell<u32>,
}

impl RestTracker {
    pub fn new(slug: RepoSlug, credentials: &[Credential]) -> anyhow::Result<Self> {
        let Some(first) = credentials.first() else {
            anyhow::bail!("at least one credential is required");
        };

        let tokens = credentials
            .iter()
            .map(|cred| (cred.login.clone(), cred.token.clone()))
            .collect();

        Ok(Self {
            slug,
            tokens,
            default_login: first.login.clone(),
            requests: Cell::new(0),
            remaining: Cell::new(u32::MAX),
            limit: Cell::new(0),
        })
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.get()
    }

    fn repo_url(&self, tail: &str) -> String {
        format!("{API_ROOT}/repos/{}/{}{tail}", self.slug.owner, self.slug.repo)
    }

    fn token_for(&self, actor: &str) -> &str {
        self.tokens
            .get(actor)
            .or_else(|| self.tokens.get(&self.default_login))
            .map_or("", String::as_str)
    }

    fn prepare(&self, method: &str, url: &str, actor: &str) -> ureq::Request {
        self.requests.set(self.requests.get() + 1);

        ureq::request(method, url)
            .set("Accept", "application/vnd.github+json")
            .set("User-Agent", "tracshift")
            .set("Authorization", &format!("Bearer {}", self.token_for(actor)))
    }

    /// Record quota headers and block while the remaining quota is low.
    fn observe_quota(&self, response: &ureq::Response) {
        let remaining = response
            .header("X-RateLimit-Remaining")
            .and_then(|raw| raw.parse::<u32>().ok());
        let limit = response
            .header("X-RateLimit-Limit")
            .and_then(|raw| raw.parse::<u32>().ok());

        if let Some(limit) = limit {
            self.limit.set(limit);
        }

        let Some(remaining) = remaining else { return };
        self.remaining.set(remaining);

        if remaining >= LOW_QUOTA {
            return;
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let reset = response
            .header("X-RateLimit-Reset")
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(now + 60);

        let wait = Duration::from_secs(reset.saturating_sub(now) + 1).min(MAX_QUOTA_SLEEP);
        warn!(
            remaining,
            wait_secs = wait.as_secs(),
            "request quota low; sleeping until the window resets"
        );
        std::thread::sleep(wait);
    }

    fn execute(&self, request: ureq::Request, body: Option<Value>, url: &str) -> Result<ureq::Response, ApiError> {
        let result = match body {
            Some(payload) => request.send_json(payload),
            None => request.call(),
        };

        match result {
            Ok(response) => {
                self.observe_quota(&response);
                Ok(response)
            }
            Err(ureq::Error::Status(code, _)) => Err(ApiError::Status {
                code,
                url: url.to_string(),
            }),
            Err(err) => Err(ApiError::Request {
                url: url.to_string(),
                source: Box::new(err),
            }),
        }
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let request = self.prepare("GET", url, &self.default_login);
        let response = self.execute(request, None, url)?;
        response.into_json::<T>().map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }

    /// Fetch every page of a listing endpoint.
    fn get_paged<T: DeserializeOwned>(&self, base: &str) -> Result<Vec<T>, ApiError> {
        let mut all = Vec::new();
        let mut page = 1_u32;

        loop {
            let sep = if base.contains('?') { '&' } else { '?' };
            let url = format!("{base}{sep}per_page={PAGE_SIZE}&page={page}");
            let batch: Vec<T> = self.get_json(&url)?;
            let raw_len = batch.len();
            all.extend(batch);

            if raw_len < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        Ok(all)
    }

    fn send(
        &self,
        method: &str,
        url: &str,
        actor: &str,
        payload: Value,
    ) -> Result<ureq::Response, ApiError> {
        debug!(method, url, actor, "issuing mutation");
        let request = self.prepare(method, url, actor);
        self.execute(request, Some(payload), url)
    }
}

impl IssueTracker for RestTracker {
    fn list_milestones(&self, state: MilestoneState) -> Result<Vec<MilestoneInfo>, ApiError> {
        let base = self.repo_url(&format!("/milestones?state={}", state.as_query()));
        let raw: Vec<ApiMilestone> = self.get_paged(&base)?;

        Ok(raw
            .into_iter()
            .map(|milestone| MilestoneInfo {
                number: milestone.number,
                title: milestone.title,
                open: milestone.state == "open",
            })
            .collect())
    }

    fn list_collaborators(&self) -> Result<Vec<String>, ApiError> {
        let base = self.repo_url("/collaborators");
        let raw: Vec<ApiUser> = self.get_paged(&base)?;
        Ok(raw.into_iter().map(|user| user.login).collect())
    }

    fn list_issue_titles(&self) -> Result<Vec<String>, ApiError> {
        let base = self.repo_url("/issues?state=all&sort=created&direction=asc");
        let raw: Vec<ApiIssue> = self.get_paged(&base)?;

        Ok(raw
            .into_iter()
            .filter(|issue| issue.pull_request.is_none())
            .map(|issue| issue.title)
            .collect())
    }

    fn create_milestone(&self, milestone: &NewMilestone) -> Result<u64, ApiError> {
        let url = self.repo_url("/milestones");
        let mut payload = Map::new();
        payload.insert("title".to_string(), json!(milestone.title));
        payload.insert(
            "state".to_string(),
            json!(if milestone.closed { "closed" } else { "open" }),
        );
        if !milestone.description.is_empty() {
            payload.insert("description".to_string(), json!(milestone.description));
        }
        if let Some(due_on) = &milestone.due_on {
            payload.insert("due_on".to_string(), json!(due_on));
        }

        let response = self.send("POST", &url, &self.default_login, Value::Object(payload))?;
        let created: Created = response.into_json().map_err(|source| ApiError::Decode {
            url,
            source,
        })?;
        Ok(created.number)
    }

    fn create_issue(&self, actor: &str, title: &str, body: &str) -> Result<u64, ApiError> {
        let url = self.repo_url("/issues");
        let payload = json!({
            "title": title,
            "body": truncate_body(body),
        });

        let response = self.send("POST", &url, actor, payload)?;
        let created: Created = response.into_json().map_err(|source| ApiError::Decode {
            url,
            source,
        })?;
        Ok(created.number)
    }

    fn update_issue(&self, actor: &str, number: u64, patch: &IssuePatch) -> Result<(), ApiError> {
        let url = self.repo_url(&format!("/issues/{number}"));
        let mut payload = Map::new();

        if let Some(title) = &patch.title {
            payload.insert("title".to_string(), json!(title));
        }
        if let Some(body) = &patch.body {
            payload.insert("body".to_string(), json!(truncate_body(body)));
        }
        if let Some(milestone) = patch.milestone {
            payload.insert("milestone".to_string(), json!(milestone));
        }
        if let Some(assignee) = &patch.assignee {
            payload.insert("assignee".to_string(), json!(assignee));
        }
        if let Some(labels) = &patch.labels {
            payload.insert("labels".to_string(), json!(labels));
        }

        self.send("PATCH", &url, actor, Value::Object(payload))?;
        Ok(())
    }

    fn close_issue(&self, actor: &str, number: u64) -> Result<(), ApiError> {
        let url = self.repo_url(&format!("/issues/{number}"));
        self.send("PATCH", &url, actor, json!({ "state": "closed" }))?;
        Ok(())
    }

    fn reopen_issue(&self, actor: &str, number: u64) -> Result<(), ApiError> {
        let url = self.repo_url(&format!("/issues/{number}"));
        self.send("PATCH", &url, actor, json!({ "state": "open" }))?;
        Ok(())
    }

    fn add_comment(&self, actor: &str, number: u64, body: &str) -> Result<(), ApiError> {
        let url = self.repo_url(&format!("/issues/{number}/comments"));
        self.send("POST", &url, actor, json!({ "body": truncate_body(body) }))?;
        Ok(())
    }

    fn rate_limit(&self) -> (u32, u32) {
        (self.remaining.get(), self.limit.get())
    }
}

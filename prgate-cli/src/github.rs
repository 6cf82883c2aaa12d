//! GitHub REST implementation of the tracker seam.

use prgate_core::{CommitStatus, PrGateError, Tracker};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;

/// Default GitHub API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// GitHub API client scoped to one repository.
#[derive(Debug, Clone)]
pub struct GitHubApiClient {
    base_url: String,
    owner: String,
    repo: String,
    token: String,
    user_agent: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    head: PullHead,
}

#[derive(Debug, Deserialize)]
struct PullHead {
    sha: String,
}

impl GitHubApiClient {
    /// Build a client for `owner/repo` authenticating with `token`.
    pub fn new(
        base_url: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            owner: owner.into(),
            repo: repo.into(),
            token: token.into(),
            user_agent: user_agent.into(),
            client: Client::new(),
        }
    }

    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{path}",
            self.base_url.trim_end_matches('/'),
            self.owner,
            self.repo
        )
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, PrGateError> {
        let response = request
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/vnd.github+json")
            .bearer_auth(&self.token)
            .send()
            .map_err(|err| PrGateError::Tracker(format!("github request failed: {err}")))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(PrGateError::Tracker(format!(
                "github api error ({status}): {body}"
            )));
        }
        Ok(response)
    }
}

impl Tracker for GitHubApiClient {
    fn set_commit_status(&self, sha: &str, status: &CommitStatus) -> Result<(), PrGateError> {
        let body = serde_json::json!({
            "state": status.state.as_str(),
            "target_url": status.target_url,
            "description": status.description,
            "context": status.context,
        });
        let url = self.repo_url(&format!("statuses/{sha}"));
        self.send(self.client.post(url).json(&body))?;
        Ok(())
    }

    fn post_comment(&self, issue: u64, body: &str) -> Result<(), PrGateError> {
        let url = self.repo_url(&format!("issues/{issue}/comments"));
        self.send(
            self.client
                .post(url)
                .json(&serde_json::json!({ "body": body })),
        )?;
        Ok(())
    }

    fn latest_pull_commit(&self, pull: u64) -> Result<String, PrGateError> {
        let url = self.repo_url(&format!("pulls/{pull}"));
        let pull_request: PullRequest = self
            .send(self.client.get(url))?
            .json()
            .map_err(|err| PrGateError::Tracker(format!("github response decode failed: {err}")))?;
        Ok(pull_request.head.sha)
    }
}

#[cfg(test)]
mod tests {
    use super::GitHubApiClient;
    use httpmock::Method::{GET, POST};
    use httpmock::MockServer;
    use prgate_core::{CommitState, CommitStatus, Tracker};

    fn client(server: &MockServer) -> GitHubApiClient {
        GitHubApiClient::new(server.url(""), "dmwm", "WMCore", "token", "prgate-test")
    }

    #[test]
    fn sets_commit_status() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/repos/dmwm/WMCore/statuses/abc123")
                .header("authorization", "Bearer token")
                .header("user-agent", "prgate-test")
                .json_body(serde_json::json!({
                    "state": "failure",
                    "target_url": "https://ci/report.html#unittests",
                    "description": "Finished at now",
                    "context": "Unit tests",
                }));
            then.status(201)
                .header("content-type", "application/json")
                .json_body(serde_json::json!({"id": 1}));
        });

        let status = CommitStatus {
            state: CommitState::Failure,
            target_url: "https://ci/report.html#unittests".to_string(),
            description: "Finished at now".to_string(),
            context: "Unit tests".to_string(),
        };
        client(&server)
            .set_commit_status("abc123", &status)
            .expect("status");
        mock.assert();
    }

    #[test]
    fn posts_issue_comment() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/repos/dmwm/WMCore/issues/12/comments")
                .json_body(serde_json::json!({"body": "CI results:\n"}));
            then.status(201)
                .header("content-type", "application/json")
                .json_body(serde_json::json!({"id": 7}));
        });

        client(&server)
            .post_comment(12, "CI results:\n")
            .expect("comment");
        mock.assert();
    }

    #[test]
    fn reads_pull_request_head() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/repos/dmwm/WMCore/pulls/12");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::json!({"number": 12, "head": {"sha": "abc123", "ref": "fix"}}));
        });

        let sha = client(&server).latest_pull_commit(12).expect("sha");
        assert_eq!(sha, "abc123");
        mock.assert();
    }

    #[test]
    fn reports_api_errors() {
        let server = MockServer::start();
        let error_mock = server.mock(|when, then| {
            when.method(GET).path("/repos/dmwm/WMCore/pulls/404");
            then.status(404).body("Not Found");
        });

        let err = client(&server).latest_pull_commit(404).unwrap_err();
        assert!(err.to_string().contains("github api error"));
        error_mock.assert();
    }

    #[test]
    fn reports_undecodable_responses() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/repos/dmwm/WMCore/pulls/12");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(serde_json::json!({"number": 12}));
        });

        let err = client(&server).latest_pull_commit(12).unwrap_err();
        assert!(err.to_string().contains("decode failed"));
        mock.assert();
    }
}

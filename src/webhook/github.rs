//! GitHub push (post-commit) hook payloads.

use serde::Deserialize;

use crate::error::RelayError;

#[derive(Debug, Clone, Deserialize)]
pub struct PushEvent {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub repository: Repository,
    #[serde(default)]
    pub commits: Vec<Commit>,
    #[serde(default)]
    pub head_commit: Option<Commit>,
    #[serde(default)]
    pub pusher: Option<Person>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Commit {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub message: String,
    pub author: Person,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Person {
    pub name: String,
}

impl PushEvent {
    /// Only pushes carry a ref; pings and other events do not.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.git_ref.is_empty() {
            return Err(RelayError::decode("payload is not a push event (no ref)"));
        }
        Ok(())
    }

    /// Branch or tag name, without the `refs/heads/` prefix.
    pub fn branch(&self) -> &str {
        self.git_ref
            .strip_prefix("refs/heads/")
            .or_else(|| self.git_ref.strip_prefix("refs/tags/"))
            .unwrap_or(&self.git_ref)
    }

    /// Commits worth a line each. Falls back to `head_commit` when the hook
    /// did not list any.
    fn relevant_commits(&self) -> Vec<&Commit> {
        if self.commits.is_empty() {
            self.head_commit.iter().collect()
        } else {
            self.commits.iter().collect()
        }
    }

    pub fn summary(&self) -> String {
        let mut header = format!("{} ({})", self.repository.name, self.branch());
        if let Some(pusher) = &self.pusher {
            header.push_str(&format!(" pushed by {}", pusher.name));
        }

        let mut lines = vec![header];
        for commit in self.relevant_commits() {
            lines.push(commit.line());
        }
        lines.join("\n")
    }
}

impl Commit {
    fn line(&self) -> String {
        let subject = self.message.lines().next().unwrap_or_default();
        let short_id: String = self.id.chars().take(7).collect();
        if short_id.is_empty() {
            format!("{}: {}", self.author.name, subject)
        } else {
            format!("{} {}: {}", short_id, self.author.name, subject)
        }
    }
}

//! Decoding of inbound webhook bodies into relay text.

pub mod github;
pub mod teamcity;

use serde::de::DeserializeOwned;

use crate::error::RelayError;

/// Something that arrived over HTTP and should end up as one chat message.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    GenericMessage(String),
    GitHubPush(github::PushEvent),
    TeamCityBuild(teamcity::BuildEvent),
}

impl WebhookEvent {
    /// Generic message: the `msg` field is relayed as-is.
    pub fn message(msg: Option<String>) -> Result<Self, RelayError> {
        match msg {
            Some(text) if !text.is_empty() => Ok(Self::GenericMessage(text)),
            _ => Err(RelayError::decode("missing msg")),
        }
    }

    pub fn github(body: &[u8]) -> Result<Self, RelayError> {
        let push: github::PushEvent = json_payload(body)?;
        push.validate()?;
        Ok(Self::GitHubPush(push))
    }

    pub fn teamcity(body: &[u8]) -> Result<Self, RelayError> {
        let event: teamcity::BuildEvent = json_payload(body)?;
        event.validate()?;
        Ok(Self::TeamCityBuild(event))
    }

    /// The text that gets sent to the chat
    pub fn summary(&self) -> String {
        match self {
            Self::GenericMessage(text) => text.clone(),
            Self::GitHubPush(push) => push.summary(),
            Self::TeamCityBuild(build) => build.summary(),
        }
    }
}

/// Deserialize a JSON webhook body.
///
/// Accepts a raw JSON document or a form-encoded body whose `payload` field
/// holds the JSON (the format of legacy GitHub service hooks).
pub fn json_payload<T: DeserializeOwned>(body: &[u8]) -> Result<T, RelayError> {
    let trimmed = body.trim_ascii_start();
    if trimmed.starts_with(b"{") {
        return serde_json::from_slice(trimmed)
            .map_err(|e| RelayError::decode(format!("invalid JSON payload: {}", e)));
    }

    let payload = url::form_urlencoded::parse(body)
        .find(|(key, _)| key == "payload")
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| RelayError::decode("body is neither JSON nor a form with a payload field"))?;

    serde_json::from_str(&payload)
        .map_err(|e| RelayError::decode(format!("invalid JSON payload: {}", e)))
}

//! TeamCity build hook payloads (tcWebHooks JSON format).

use serde::Deserialize;
use serde_json::Value;

use crate::error::RelayError;

#[derive(Debug, Clone, Deserialize)]
pub struct BuildEvent {
    pub build: Build,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub build_full_name: Option<String>,
    pub build_name: Option<String>,
    pub build_result: Option<String>,
    pub notify_type: Option<String>,
    pub build_number: Option<Value>,
    pub build_status_url: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl BuildEvent {
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.name().is_none() {
            return Err(RelayError::decode("build has no buildFullName or buildName"));
        }
        Ok(())
    }

    pub fn name(&self) -> Option<&str> {
        non_empty(&self.build.build_full_name).or_else(|| non_empty(&self.build.build_name))
    }

    pub fn status(&self) -> &str {
        non_empty(&self.build.build_result)
            .or_else(|| non_empty(&self.build.notify_type))
            .unwrap_or("unknown")
    }

    fn number(&self) -> Option<String> {
        match self.build.build_number.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn summary(&self) -> String {
        let mut line = self.name().unwrap_or("unnamed build").to_string();
        if let Some(number) = self.number() {
            line.push_str(&format!(" #{}", number));
        }
        line.push_str(&format!(": {}", self.status()));
        if let Some(url) = non_empty(&self.build.build_status_url) {
            line.push_str(&format!(" {}", url));
        }
        line
    }
}

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub http: HttpConfig,
    pub telegram: TelegramConfig,
    /// Chats that are always listed on the chats page, even before the
    /// listener has seen any traffic from them.
    #[serde(default)]
    pub chats: Vec<KnownChat>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub shared_secret: String,
    /// Destination used when a request does not name a chat
    #[serde(default)]
    pub default_chat_id: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Run the update listener that records chats and answers commands
    #[serde(default = "default_listen")]
    pub listen: bool,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct KnownChat {
    pub id: String,
    pub name: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_listen() -> bool {
    true
}

impl HttpConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The default chat, treating an empty string as unset.
    pub fn default_chat(&self) -> Option<&str> {
        self.default_chat_id.as_deref().filter(|id| !id.is_empty())
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Invalid settings file: {}", path.display()))?;

        Ok(config)
    }

    fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse settings")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.http.shared_secret.is_empty() {
            bail!("http.shared_secret must not be empty");
        }
        if self.telegram.bot_token.trim().is_empty() {
            bail!("telegram.bot_token must not be empty");
        }
        if let Some(chat) = self.chats.iter().find(|c| c.id.is_empty()) {
            bail!("chat '{}' has an empty id", chat.name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
[http]
shared_secret = "s3cret"

[telegram]
bot_token = "123:abc"
"#;

    #[test]
    fn test_minimal_settings_use_defaults() {
        let config = Config::parse(MINIMAL).unwrap();
        assert_eq!(config.http.host, "127.0.0.1");
        assert_eq!(config.http.port, 5000);
        assert_eq!(config.http.bind_addr(), "127.0.0.1:5000");
        assert_eq!(config.http.default_chat(), None);
        assert!(config.telegram.listen);
        assert!(config.chats.is_empty());
    }

    #[test]
    fn test_full_settings() {
        let config = Config::parse(
            r#"
[http]
host = "0.0.0.0"
port = 8080
shared_secret = "s3cret"
default_chat_id = "-100200"

[telegram]
bot_token = "123:abc"
listen = false

[[chats]]
id = "-100200"
name = "Ops"

[[chats]]
id = "@releases"
name = "Releases"
"#,
        )
        .unwrap();

        assert_eq!(config.http.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.http.default_chat(), Some("-100200"));
        assert!(!config.telegram.listen);
        assert_eq!(config.chats.len(), 2);
        assert_eq!(
            config.chats[1],
            KnownChat {
                id: "@releases".to_string(),
                name: "Releases".to_string()
            }
        );
    }

    #[test]
    fn test_empty_default_chat_is_unset() {
        let config = Config::parse(
            r#"
[http]
shared_secret = "s3cret"
default_chat_id = ""

[telegram]
bot_token = "123:abc"
"#,
        )
        .unwrap();
        assert_eq!(config.http.default_chat(), None);
    }

    #[test]
    fn test_missing_secret_fails() {
        let result = Config::parse(
            r#"
[http]
port = 5000

[telegram]
bot_token = "123:abc"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_secret_fails() {
        let result = Config::parse(
            r#"
[http]
shared_secret = ""

[telegram]
bot_token = "123:abc"
"#,
        );
        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains("shared_secret"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.http.shared_secret, "s3cret");
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read settings file"));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Runtime status of a managed bot, persisted alongside its definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotStatus {
    Stopped,
    Running,
    Error,
}

impl BotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotStatus::Stopped => "stopped",
            BotStatus::Running => "running",
            BotStatus::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "stopped" => Some(BotStatus::Stopped),
            "running" => Some(BotStatus::Running),
            "error" => Some(BotStatus::Error),
            _ => None,
        }
    }
}

impl Default for BotStatus {
    fn default() -> Self {
        BotStatus::Stopped
    }
}

/// A managed Telegram bot definition, one row in the `bots` table.
#[derive(Debug, Clone)]
pub struct Bot {
    pub id: i64,
    pub name: String,
    pub token: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub status: BotStatus,
    pub webhook_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
}

/// API representation of a bot. The secret token is never returned in full.
#[derive(Debug, Serialize)]
pub struct BotResponse {
    pub id: i64,
    pub name: String,
    pub token_masked: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub status: BotStatus,
    pub webhook_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
}

impl From<Bot> for BotResponse {
    fn from(bot: Bot) -> Self {
        BotResponse {
            id: bot.id,
            name: bot.name,
            token_masked: mask_token(&bot.token),
            description: bot.description,
            is_active: bot.is_active,
            status: bot.status,
            webhook_url: bot.webhook_url,
            created_at: bot.created_at,
            updated_at: bot.updated_at,
            started_at: bot.started_at,
        }
    }
}

fn mask_token(token: &str) -> String {
    if token.is_empty() {
        return String::new();
    }
    let prefix: String = token.chars().take(10).collect();
    format!("{}...", prefix)
}

#[derive(Debug, Deserialize)]
pub struct CreateBotRequest {
    pub name: String,
    pub token: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBotRequest {
    pub name: Option<String>,
    pub token: Option<String>,
    pub description: Option<String>,
    pub webhook_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [BotStatus::Stopped, BotStatus::Running, BotStatus::Error] {
            assert_eq!(BotStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(BotStatus::from_str("bogus"), None);
    }

    #[test]
    fn test_token_is_masked_in_response() {
        let bot = Bot {
            id: 1,
            name: "test".to_string(),
            token: "123456789:AAF-abcdefghijklmnop".to_string(),
            description: None,
            is_active: false,
            status: BotStatus::Stopped,
            webhook_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            started_at: None,
        };

        let response: BotResponse = bot.into();
        assert_eq!(response.token_masked, "123456789:...");
    }
}

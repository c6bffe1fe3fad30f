//! PostgREST message store over HTTP.
//!
//! Speaks the REST dialect exposed by Supabase-style backends:
//!
//! ```text
//! GET  {base}/rest/v1/{table}?select=*&or=(and(sender.eq.A,receiver.eq.B),and(sender.eq.B,receiver.eq.A))&order=timestamp.asc
//! POST {base}/rest/v1/{table}          body: [record]
//! ```

use super::{MessageStore, StoreError};
use crate::config::StoreConfig;
use async_trait::async_trait;
use chat_types::{ConversationKey, MessageRecord};
use serde_json::Value;

/// Message store backed by a PostgREST endpoint.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: reqwest::Client,
    table_url: String,
    api_key: String,
}

impl HttpStore {
    /// Build a store from configuration.
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| StoreError::Request(e.to_string()))?;
        Ok(Self {
            client,
            table_url: format!(
                "{}/rest/v1/{}",
                config.base_url.trim_end_matches('/'),
                config.table
            ),
            api_key: config.api_key.clone(),
        })
    }

    /// URL of the messages table.
    pub fn table_url(&self) -> &str {
        &self.table_url
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            return request;
        }
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

/// Symmetric participant filter in PostgREST `or=` syntax.
pub(crate) fn conversation_filter(key: &ConversationKey) -> String {
    let a = quote(key.first().as_str());
    let b = quote(key.second().as_str());
    format!("(and(sender.eq.{a},receiver.eq.{b}),and(sender.eq.{b},receiver.eq.{a}))")
}

/// Double-quote a filter value so reserved characters (`,.:()`) are literal.
fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl MessageStore for HttpStore {
    async fn fetch_conversation(&self, key: &ConversationKey) -> Result<Vec<Value>, StoreError> {
        let filter = conversation_filter(key);
        let request = self.client.get(&self.table_url).query(&[
            ("select", "*"),
            ("or", filter.as_str()),
            ("order", "timestamp.asc"),
        ]);

        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        let response = check(response).await?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        match body {
            Value::Array(rows) => Ok(rows),
            other => Err(StoreError::Decode(format!(
                "expected a list of rows, got {}",
                kind_of(&other)
            ))),
        }
    }

    async fn insert(&self, record: &MessageRecord) -> Result<(), StoreError> {
        let request = self
            .client
            .post(&self.table_url)
            .header("Prefer", "return=minimal")
            .json(&[record]);

        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        check(response).await?;
        Ok(())
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_types::ParticipantId;

    fn key(a: &str, b: &str) -> ConversationKey {
        ConversationKey::new(&ParticipantId::new(a).unwrap(), &ParticipantId::new(b).unwrap())
    }

    #[test]
    fn filter_is_symmetric() {
        let expected = r#"(and(sender.eq."alice",receiver.eq."bob"),and(sender.eq."bob",receiver.eq."alice"))"#;
        assert_eq!(conversation_filter(&key("alice", "bob")), expected);
        assert_eq!(conversation_filter(&key("bob", "alice")), expected);
    }

    #[test]
    fn filter_quotes_reserved_characters() {
        let filter = conversation_filter(&key("a,b", "wei\"rd"));
        assert!(filter.contains(r#"sender.eq."a,b""#));
        assert!(filter.contains(r#"receiver.eq."wei\"rd""#));
    }

    #[test]
    fn table_url_trims_trailing_slash() {
        let config = StoreConfig {
            base_url: "https://example.supabase.co/".into(),
            ..StoreConfig::default()
        };
        let store = HttpStore::new(&config).unwrap();
        assert_eq!(store.table_url(), "https://example.supabase.co/rest/v1/messages");
    }

    #[test]
    fn describes_unexpected_bodies() {
        assert_eq!(kind_of(&serde_json::json!({"message": "x"})), "an object");
        assert_eq!(kind_of(&Value::Null), "null");
    }
}

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use switchboard_core::{ConversationTurn, MemoryResource, StrategyBinding, StrategySpec};

use crate::{CreateMemoryRequest, EventMessage, MemoryStore, MemoryStoreError};

/// JSON adapter for a managed memory store exposed over REST.
#[derive(Clone, Debug)]
pub struct HttpMemoryStore {
    client: Client,
    endpoint: String,
    api_key: Option<SecretString>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateMemoryBody<'a> {
    name: &'a str,
    description: &'a str,
    strategies: &'a [StrategySpec],
    event_expiry_duration: u32,
}

#[derive(Deserialize)]
struct MemoryEnvelope {
    memory: MemoryResource,
}

#[derive(Deserialize)]
struct MemoryList {
    #[serde(default)]
    memories: Vec<MemoryResource>,
}

#[derive(Deserialize)]
struct TurnList {
    #[serde(default)]
    turns: Vec<ConversationTurn>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateEventBody<'a> {
    actor_id: &'a str,
    session_id: &'a str,
    messages: &'a [EventMessage],
}

#[derive(Serialize)]
struct RetrieveBody<'a> {
    namespace: &'a str,
    query: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordList {
    #[serde(default)]
    memory_records: Vec<Value>,
}

#[derive(Deserialize)]
struct StrategyList {
    #[serde(default)]
    strategies: Vec<StrategyBinding>,
}

#[derive(Deserialize)]
struct ProviderErrorBody {
    code: String,
    message: String,
}

impl HttpMemoryStore {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, MemoryStoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| MemoryStoreError::Transport(error.to_string()))?;
        Ok(Self::with_client(client, endpoint, api_key))
    }

    pub fn with_client(
        client: Client,
        endpoint: impl Into<String>,
        api_key: Option<SecretString>,
    ) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self { client, endpoint, api_key }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key.expose_secret()),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, MemoryStoreError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|error| MemoryStoreError::Transport(error.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        debug!(
            event_name = "memory.http.error_response",
            status = status.as_u16(),
            "memory store returned a non-success status"
        );
        Err(map_error_body(status, &body))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, MemoryStoreError> {
        let response = self.send(request).await?;
        response.json::<T>().await.map_err(|error| MemoryStoreError::Decode(error.to_string()))
    }
}

fn map_error_body(status: StatusCode, body: &str) -> MemoryStoreError {
    if let Ok(parsed) = serde_json::from_str::<ProviderErrorBody>(body) {
        return MemoryStoreError::Provider { code: parsed.code, message: parsed.message };
    }
    if status == StatusCode::NOT_FOUND {
        return MemoryStoreError::NotFound(body.to_string());
    }
    MemoryStoreError::Provider { code: status.as_u16().to_string(), message: body.to_string() }
}

#[async_trait]
impl MemoryStore for HttpMemoryStore {
    async fn create_memory(
        &self,
        request: CreateMemoryRequest,
    ) -> Result<MemoryResource, MemoryStoreError> {
        let body = CreateMemoryBody {
            name: &request.name,
            description: &request.description,
            strategies: &request.strategies,
            event_expiry_duration: request.event_expiry_days,
        };
        let envelope: MemoryEnvelope =
            self.send_json(self.client.post(self.url("/memories")).json(&body)).await?;
        Ok(envelope.memory)
    }

    async fn list_memories(&self) -> Result<Vec<MemoryResource>, MemoryStoreError> {
        let list: MemoryList = self.send_json(self.client.get(self.url("/memories"))).await?;
        Ok(list.memories)
    }

    async fn delete_memory(&self, memory_id: &str) -> Result<(), MemoryStoreError> {
        self.send(self.client.delete(self.url(&format!("/memories/{memory_id}")))).await?;
        Ok(())
    }

    async fn get_last_k_turns(
        &self,
        memory_id: &str,
        actor_id: &str,
        session_id: &str,
        k: usize,
    ) -> Result<Vec<ConversationTurn>, MemoryStoreError> {
        let request = self.client.get(self.url(&format!("/memories/{memory_id}/turns"))).query(&[
            ("actorId", actor_id.to_string()),
            ("sessionId", session_id.to_string()),
            ("k", k.to_string()),
        ]);
        let list: TurnList = self.send_json(request).await?;
        Ok(list.turns)
    }

    async fn create_event(
        &self,
        memory_id: &str,
        actor_id: &str,
        session_id: &str,
        messages: Vec<EventMessage>,
    ) -> Result<(), MemoryStoreError> {
        let body = CreateEventBody { actor_id, session_id, messages: &messages };
        let request =
            self.client.post(self.url(&format!("/memories/{memory_id}/events"))).json(&body);
        self.send(request).await?;
        Ok(())
    }

    async fn retrieve_memories(
        &self,
        memory_id: &str,
        namespace: &str,
        query: &str,
    ) -> Result<Vec<Value>, MemoryStoreError> {
        let request = self
            .client
            .post(self.url(&format!("/memories/{memory_id}/retrieve")))
            .json(&RetrieveBody { namespace, query });
        let list: RecordList = self.send_json(request).await?;
        Ok(list.memory_records)
    }

    async fn list_strategies(
        &self,
        memory_id: &str,
    ) -> Result<Vec<StrategyBinding>, MemoryStoreError> {
        let request = self.client.get(self.url(&format!("/memories/{memory_id}/strategies")));
        let list: StrategyList = self.send_json(request).await?;
        Ok(list.strategies)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::HttpMemoryStore;
    use crate::{EventMessage, MemoryStore, MemoryStoreError};

    fn store(server: &MockServer) -> HttpMemoryStore {
        let api_key = Some("memory-token".to_string().into());
        HttpMemoryStore::new(server.uri(), api_key, Duration::from_secs(5)).expect("client")
    }

    #[tokio::test]
    async fn last_turns_are_fetched_with_identity_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/memories/mem-1/turns"))
            .and(query_param("actorId", "user_123"))
            .and(query_param("sessionId", "s1"))
            .and(query_param("k", "5"))
            .and(header("authorization", "Bearer memory-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "turns": [[
                    {"role": "USER", "content": {"text": "hi"}},
                    {"role": "ASSISTANT", "content": {"text": "hello"}}
                ]]
            })))
            .mount(&server)
            .await;

        let turns =
            store(&server).get_last_k_turns("mem-1", "user_123", "s1", 5).await.expect("turns");
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0][1].text(), "hello");
    }

    #[tokio::test]
    async fn events_post_camel_case_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/memories/mem-1/events"))
            .and(body_json(json!({
                "actorId": "user_123",
                "sessionId": "s1",
                "messages": [{"text": "hi", "role": "USER"}]
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        store(&server)
            .create_event("mem-1", "user_123", "s1", vec![EventMessage::new("hi", "USER")])
            .await
            .expect("event");
    }

    #[tokio::test]
    async fn provider_error_bodies_map_to_provider_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/memories"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": "ValidationException",
                "message": "Memory with name demo already exists"
            })))
            .mount(&server)
            .await;

        let error = store(&server)
            .create_memory(crate::CreateMemoryRequest {
                name: "demo".to_string(),
                description: "d".to_string(),
                strategies: Vec::new(),
                event_expiry_days: 7,
            })
            .await
            .expect_err("duplicate");
        assert!(error.is_already_exists());
    }

    #[tokio::test]
    async fn bare_not_found_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/memories/gone/strategies"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let error = store(&server).list_strategies("gone").await.expect_err("missing");
        assert!(matches!(error, MemoryStoreError::NotFound(_)));
    }
}

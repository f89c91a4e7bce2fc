//! Supabase (PostgREST) backed store.
//!
//! Tables and the `match_documents` function are created by
//! `migrations/supabase.sql`.

use super::models::{Chat, DocumentMatch, Message, Role};
use super::{Store, StoreError};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

pub struct SupabaseStore {
    client: Client,
    rest_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct MatchDocumentsParams<'a> {
    query_embedding: &'a [f32],
    match_count: usize,
    match_threshold: f32,
    chat_id_filter: &'a str,
}

impl SupabaseStore {
    pub fn new(client: Client, project_url: &str, api_key: &str) -> Self {
        Self {
            client,
            rest_url: format!("{}/rest/v1", project_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.rest_url, path))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn send(req: RequestBuilder) -> Result<Response, StoreError> {
        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(StoreError::Api { status, message });
        }
        Ok(resp)
    }

    async fn fetch<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, StoreError> {
        Ok(Self::send(req).await?.json().await?)
    }

    /// Insert one row and return it as stored.
    async fn insert_returning<T: DeserializeOwned>(
        &self,
        table: &str,
        row: serde_json::Value,
        what: &'static str,
    ) -> Result<T, StoreError> {
        let rows: Vec<T> = Self::fetch(
            self.request(Method::POST, table)
                .header("Prefer", "return=representation")
                .json(&row),
        )
        .await?;
        rows.into_iter().next().ok_or(StoreError::MissingRow(what))
    }
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

#[async_trait]
impl Store for SupabaseStore {
    async fn create_chat(&self, title: &str) -> Result<Chat, StoreError> {
        self.insert_returning("chats", json!({ "title": title }), "chats")
            .await
    }

    async fn list_chats(&self) -> Result<Vec<Chat>, StoreError> {
        Self::fetch(
            self.request(Method::GET, "chats")
                .query(&[("select", "*"), ("order", "created_at.desc")]),
        )
        .await
    }

    async fn update_chat_title(&self, chat_id: &str, title: &str) -> Result<(), StoreError> {
        Self::send(
            self.request(Method::PATCH, "chats")
                .query(&[("id", eq(chat_id))])
                .json(&json!({ "title": title })),
        )
        .await?;
        Ok(())
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<(), StoreError> {
        for (table, column) in [("documents", "chat_id"), ("messages", "chat_id"), ("chats", "id")] {
            Self::send(
                self.request(Method::DELETE, table)
                    .query(&[(column, eq(chat_id))]),
            )
            .await?;
        }
        Ok(())
    }

    async fn add_message(
        &self,
        chat_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Message, StoreError> {
        self.insert_returning(
            "messages",
            json!({ "chat_id": chat_id, "role": role, "content": content }),
            "messages",
        )
        .await
    }

    async fn get_messages(&self, chat_id: &str) -> Result<Vec<Message>, StoreError> {
        Self::fetch(self.request(Method::GET, "messages").query(&[
            ("select", "*".to_string()),
            ("chat_id", eq(chat_id)),
            ("order", "created_at.asc,id.asc".to_string()),
        ]))
        .await
    }

    async fn insert_document(
        &self,
        chat_id: &str,
        content: &str,
        embedding: &[f32],
    ) -> Result<(), StoreError> {
        Self::send(
            self.request(Method::POST, "documents")
                .header("Prefer", "return=minimal")
                .json(&json!({ "content": content, "embedding": embedding, "chat_id": chat_id })),
        )
        .await?;
        Ok(())
    }

    async fn match_documents(
        &self,
        query_embedding: &[f32],
        match_count: usize,
        match_threshold: f32,
        chat_id: &str,
    ) -> Result<Vec<DocumentMatch>, StoreError> {
        let params = MatchDocumentsParams {
            query_embedding,
            match_count,
            match_threshold,
            chat_id_filter: chat_id,
        };
        Self::fetch(self.request(Method::POST, "rpc/match_documents").json(&params)).await
    }
}

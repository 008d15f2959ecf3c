//! Supabase REST API client using service_role key

use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};

use crate::config::Config;

/// Supabase client for server-side database operations
/// Uses service_role key which bypasses RLS - ownership is checked by callers!
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_role_key: String,
}

impl SupabaseClient {
    pub fn new(config: &Config) -> Self {
        Self::from_parts(&config.supabase_url, &config.supabase_service_role_key)
    }

    pub fn from_parts(base_url: &str, service_role_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_role_key: service_role_key.to_string(),
        }
    }

    /// Get the REST API URL for a table
    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .header("Content-Type", "application/json")
    }

    async fn check(response: Response) -> Result<Response, SupabaseError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SupabaseError::Api { status: status.as_u16(), body });
        }
        Ok(response)
    }

    /// Make an authenticated GET request
    pub async fn get<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Vec<T>, SupabaseError> {
        let url = format!("{}?{}", self.rest_url(table), query);

        let response = self
            .authed(self.client.get(&url))
            .send()
            .await
            .map_err(SupabaseError::Request)?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(SupabaseError::Parse)
    }

    /// Make an authenticated GET request expecting a single row
    pub async fn get_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Option<T>, SupabaseError> {
        let url = format!("{}?{}", self.rest_url(table), query);

        let response = self
            .authed(self.client.get(&url))
            .header("Accept", "application/vnd.pgrst.object+json")
            .send()
            .await
            .map_err(SupabaseError::Request)?;

        if response.status() == reqwest::StatusCode::NOT_ACCEPTABLE {
            // No rows found
            return Ok(None);
        }

        Self::check(response)
            .await?
            .json()
            .await
            .map(Some)
            .map_err(SupabaseError::Parse)
    }

    /// Make an authenticated POST request (insert)
    pub async fn insert<T: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        data: &T,
    ) -> Result<R, SupabaseError> {
        let response = self
            .authed(self.client.post(self.rest_url(table)))
            .header("Prefer", "return=representation")
            .json(data)
            .send()
            .await
            .map_err(SupabaseError::Request)?;

        // PostgREST returns an array, get first element
        let results: Vec<R> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(SupabaseError::Parse)?;
        results
            .into_iter()
            .next()
            .ok_or(SupabaseError::NoRowReturned)
    }

    /// Make an authenticated PATCH request (update)
    pub async fn update<T: Serialize>(
        &self,
        table: &str,
        query: &str,
        data: &T,
    ) -> Result<(), SupabaseError> {
        let url = format!("{}?{}", self.rest_url(table), query);

        let response = self
            .authed(self.client.patch(&url))
            .json(data)
            .send()
            .await
            .map_err(SupabaseError::Request)?;

        Self::check(response).await?;
        Ok(())
    }

    /// PATCH returning the updated rows
    pub async fn update_returning<T: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
        data: &T,
    ) -> Result<Vec<R>, SupabaseError> {
        let url = format!("{}?{}", self.rest_url(table), query);

        let response = self
            .authed(self.client.patch(&url))
            .header("Prefer", "return=representation")
            .json(data)
            .send()
            .await
            .map_err(SupabaseError::Request)?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(SupabaseError::Parse)
    }

    /// DELETE matching rows, returning how many were removed
    pub async fn delete(&self, table: &str, query: &str) -> Result<usize, SupabaseError> {
        let url = format!("{}?{}", self.rest_url(table), query);

        let response = self
            .authed(self.client.delete(&url))
            .header("Prefer", "return=representation")
            .send()
            .await
            .map_err(SupabaseError::Request)?;

        let deleted: Vec<serde_json::Value> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(SupabaseError::Parse)?;
        Ok(deleted.len())
    }

    /// Call a Postgres function exposed through PostgREST
    pub async fn rpc<A: Serialize, R: DeserializeOwned>(
        &self,
        function: &str,
        args: &A,
    ) -> Result<R, SupabaseError> {
        let url = format!("{}/rest/v1/rpc/{}", self.base_url, function);

        let response = self
            .authed(self.client.post(&url))
            .json(args)
            .send()
            .await
            .map_err(SupabaseError::Request)?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(SupabaseError::Parse)
    }
}

/// Supabase errors
#[derive(Debug, thiserror::Error)]
pub enum SupabaseError {
    #[error("HTTP request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(#[source] reqwest::Error),

    #[error("No row returned from insert")]
    NoRowReturned,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize)]
    struct Row {
        id: u32,
    }

    #[tokio::test]
    async fn get_one_maps_not_acceptable_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/profiles"))
            .and(header("apikey", "key"))
            .respond_with(ResponseTemplate::new(406))
            .mount(&server)
            .await;

        let client = SupabaseClient::from_parts(&server.uri(), "key");
        let row: Option<Row> = client.get_one("profiles", "id=eq.1").await.unwrap();
        assert!(row.is_none());
    }

    #[tokio::test]
    async fn insert_returns_first_row() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/profiles"))
            .and(header("Prefer", "return=representation"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!([{"id": 7}])))
            .mount(&server)
            .await;

        let client = SupabaseClient::from_parts(&server.uri(), "key");
        let row: Row = client
            .insert("profiles", &serde_json::json!({"id": 7}))
            .await
            .unwrap();
        assert_eq!(row.id, 7);
    }

    #[tokio::test]
    async fn api_errors_carry_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/avatar_profiles"))
            .and(query_param("id", "eq.1"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = SupabaseClient::from_parts(&server.uri(), "key");
        let err = client
            .get::<Row>("avatar_profiles", "id=eq.1")
            .await
            .unwrap_err();
        match err {
            SupabaseError::Api { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_counts_returned_rows() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/memory_fragments"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!([{"id": 1}, {"id": 2}])),
            )
            .mount(&server)
            .await;

        let client = SupabaseClient::from_parts(&server.uri(), "key");
        let removed = client.delete("memory_fragments", "user_id=eq.x").await.unwrap();
        assert_eq!(removed, 2);
    }

    #[tokio::test]
    async fn rpc_posts_to_function_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/match_memory_fragments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{"id": 3}])))
            .mount(&server)
            .await;

        let client = SupabaseClient::from_parts(&server.uri(), "key");
        let rows: Vec<Row> = client
            .rpc("match_memory_fragments", &serde_json::json!({"match_count": 1}))
            .await
            .unwrap();
        assert_eq!(rows[0].id, 3);
    }
}

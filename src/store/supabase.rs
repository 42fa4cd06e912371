use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::data::types::{BetActivity, Comment, NewBetActivity};
use crate::store::{StoreError, ACTIVITY_LIMIT};

const ACTIVITY_TABLE: &str = "bet_activities";
const COMMENT_TABLE: &str = "comments";

/// Supabase (PostgREST) tables `bet_activities` and `comments`.
///
/// Row ids and timestamps are assigned by the database defaults.
pub struct SupabaseStore {
    client: Client,
    base_url: String,
    anon_key: String,
}

#[derive(Serialize)]
struct NewComment<'a> {
    market_id: &'a str,
    user_address: &'a str,
    content: &'a str,
}

impl SupabaseStore {
    pub fn new(url: &str, anon_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(key) = HeaderValue::from_str(&self.anon_key) {
            headers.insert("apikey", key);
        }
        if let Ok(bearer) = HeaderValue::from_str(&format!("Bearer {}", self.anon_key)) {
            headers.insert(reqwest::header::AUTHORIZATION, bearer);
        }
        headers
    }

    fn get(&self, table: &str) -> RequestBuilder {
        self.client
            .get(self.table_url(table))
            .headers(self.headers())
            .query(&[("select", "*")])
    }

    async fn rows<T: DeserializeOwned>(request: RequestBuilder) -> Result<Vec<T>, StoreError> {
        let response = check(request.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn insert<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &'static str,
        body: &B,
    ) -> Result<T, StoreError> {
        let request = self
            .client
            .post(self.table_url(table))
            .headers(self.headers())
            .header("Prefer", "return=representation")
            .json(body);

        let mut rows: Vec<T> = Self::rows(request).await?;
        if rows.is_empty() {
            return Err(StoreError::EmptyInsert(table));
        }
        Ok(rows.swap_remove(0))
    }

    pub async fn get_activities(&self, market_id: Option<&str>) -> Result<Vec<BetActivity>, StoreError> {
        let limit = ACTIVITY_LIMIT.to_string();
        let mut request = self
            .get(ACTIVITY_TABLE)
            .query(&[("order", "created_at.desc"), ("limit", limit.as_str())]);
        if let Some(id) = market_id {
            request = request.query(&[("market_id", eq(id))]);
        }
        Self::rows(request).await
    }

    pub async fn add_activity(&self, activity: NewBetActivity) -> Result<BetActivity, StoreError> {
        self.insert(ACTIVITY_TABLE, &activity).await
    }

    pub async fn get_user_activities(&self, user_address: &str) -> Result<Vec<BetActivity>, StoreError> {
        let request = self
            .get(ACTIVITY_TABLE)
            .query(&[("user_address", eq(user_address)), ("order", "created_at.desc".to_string())]);
        Self::rows(request).await
    }

    pub async fn list_comments(&self, market_id: &str) -> Result<Vec<Comment>, StoreError> {
        let request = self
            .get(COMMENT_TABLE)
            .query(&[("market_id", eq(market_id)), ("order", "created_at.asc".to_string())]);
        Self::rows(request).await
    }

    pub async fn add_comment(&self, market_id: &str, content: &str, user_address: &str) -> Result<Comment, StoreError> {
        let body = NewComment {
            market_id,
            user_address,
            content: content.trim(),
        };
        self.insert(COMMENT_TABLE, &body).await
    }

    pub async fn delete_comment(&self, comment_id: &str, user_address: &str) -> Result<bool, StoreError> {
        let request = self
            .client
            .delete(self.table_url(COMMENT_TABLE))
            .headers(self.headers())
            .header("Prefer", "return=representation")
            .query(&[("id", eq(comment_id)), ("user_address", eq(user_address))]);

        let deleted: Vec<Comment> = Self::rows(request).await?;
        debug!(comment_id, deleted = deleted.len(), "comment delete");
        Ok(!deleted.is_empty())
    }
}

/// PostgREST equality filter value.
fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

async fn check(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Api {
        status: status.as_u16(),
        body,
    })
}

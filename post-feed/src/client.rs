use crate::types::{FeedConfig, Result};
use async_trait::async_trait;
use interfaces::client::{AuthorFilter, ClientError, FeedOutput, PopularFeedsOutput, ProtocolClient};
use interfaces::defs::{FeedViewPost, GeneratorView, ListView};
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Deserialize)]
struct XrpcError {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Feed page with items left undecoded so one bad item cannot sink the page.
#[derive(Debug, Deserialize)]
struct RawFeedOutput {
    #[serde(default)]
    feed: Vec<Value>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedGeneratorOutput {
    view: GeneratorView,
}

#[derive(Debug, Deserialize)]
struct ListOutput {
    list: ListView,
}

/// Unauthenticated client for a public AppView.
pub struct HttpClient {
    client: Client,
    service: String,
}

impl HttpClient {
    pub fn new(config: &FeedConfig) -> Result<Self> {
        Url::parse(&config.service_url)?;
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            service: config.service_url.trim_end_matches('/').to_string(),
        })
    }

    async fn query<T: DeserializeOwned>(
        &self,
        nsid: &str,
        params: &[(&str, String)],
        accept_languages: &[String],
    ) -> std::result::Result<T, ClientError> {
        let url = format!("{}/xrpc/{}", self.service, nsid);
        debug!("GET {} {:?}", url, params);

        let mut request = self.client.get(&url).query(params);
        if !accept_languages.is_empty() {
            request = request.header(header::ACCEPT_LANGUAGE, accept_languages.join(", "));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<XrpcError>(&body)
                .ok()
                .and_then(|e| e.message.or(e.error))
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string());
            warn!("{} returned {}: {}", nsid, status, message);
            return Err(ClientError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::InvalidResponse(format!("{}: {}", nsid, e)))
    }

    async fn query_feed(
        &self,
        nsid: &str,
        params: &[(&str, String)],
        accept_languages: &[String],
    ) -> std::result::Result<FeedOutput, ClientError> {
        let raw: RawFeedOutput = self.query(nsid, params, accept_languages).await?;
        Ok(decode_feed(nsid, raw))
    }
}

fn decode_feed(nsid: &str, raw: RawFeedOutput) -> FeedOutput {
    let feed: Vec<FeedViewPost> = raw
        .feed
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Dropping unreadable item from {}: {}", nsid, e);
                None
            }
        })
        .collect();
    FeedOutput {
        feed,
        cursor: raw.cursor,
    }
}

fn page_params(cursor: Option<&str>, limit: usize) -> Vec<(&'static str, String)> {
    let mut params = vec![("limit", limit.to_string())];
    if let Some(cursor) = cursor {
        params.push(("cursor", cursor.to_string()));
    }
    params
}

#[async_trait]
impl ProtocolClient for HttpClient {
    fn session_did(&self) -> Option<String> {
        None
    }

    async fn get_timeline(
        &self,
        _cursor: Option<&str>,
        _limit: usize,
    ) -> std::result::Result<FeedOutput, ClientError> {
        Err(ClientError::NotAuthenticated)
    }

    async fn get_author_feed(
        &self,
        actor: &str,
        filter: AuthorFilter,
        cursor: Option<&str>,
        limit: usize,
    ) -> std::result::Result<FeedOutput, ClientError> {
        let mut params = page_params(cursor, limit);
        params.push(("actor", actor.to_string()));
        params.push(("filter", filter.to_string()));
        self.query_feed("app.bsky.feed.getAuthorFeed", &params, &[]).await
    }

    async fn get_actor_likes(
        &self,
        actor: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> std::result::Result<FeedOutput, ClientError> {
        let mut params = page_params(cursor, limit);
        params.push(("actor", actor.to_string()));
        self.query_feed("app.bsky.feed.getActorLikes", &params, &[]).await
    }

    async fn get_feed(
        &self,
        feed: &str,
        cursor: Option<&str>,
        limit: usize,
        accept_languages: &[String],
    ) -> std::result::Result<FeedOutput, ClientError> {
        let mut params = page_params(cursor, limit);
        params.push(("feed", feed.to_string()));
        self.query_feed("app.bsky.feed.getFeed", &params, accept_languages)
            .await
    }

    async fn get_list_feed(
        &self,
        list: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> std::result::Result<FeedOutput, ClientError> {
        let mut params = page_params(cursor, limit);
        params.push(("list", list.to_string()));
        self.query_feed("app.bsky.feed.getListFeed", &params, &[]).await
    }

    async fn get_feed_generator(
        &self,
        feed: &str,
    ) -> std::result::Result<GeneratorView, ClientError> {
        let output: FeedGeneratorOutput = self
            .query(
                "app.bsky.feed.getFeedGenerator",
                &[("feed", feed.to_string())],
                &[],
            )
            .await?;
        Ok(output.view)
    }

    async fn get_list(&self, list: &str) -> std::result::Result<ListView, ClientError> {
        let mut params = page_params(None, 1);
        params.push(("list", list.to_string()));
        let output: ListOutput = self.query("app.bsky.graph.getList", &params, &[]).await?;
        Ok(output.list)
    }

    async fn get_popular_feed_generators(
        &self,
        query: Option<&str>,
        cursor: Option<&str>,
        limit: usize,
    ) -> std::result::Result<PopularFeedsOutput, ClientError> {
        let mut params = page_params(cursor, limit);
        if let Some(query) = query {
            params.push(("query", query.to_string()));
        }
        self.query(
            "app.bsky.unspecced.getPopularFeedGenerators",
            &params,
            &[],
        )
        .await
    }
}

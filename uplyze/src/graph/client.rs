//! HTTP client for the Meta Graph API.

use reqwest::Method;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::config::GraphConfig;
use crate::errors::{Error, Result};
use crate::graph::GraphAction;

/// Thin client over the versioned Graph API root.
///
/// One instance is shared for the process; per-account access tokens are
/// passed per call.
#[derive(Clone)]
pub struct GraphClient {
    http: reqwest::Client,
    root: String,
    max_pages: usize,
}

/// Required string field out of the action params object.
fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    params.get(key).and_then(Value::as_str).ok_or_else(|| Error::BadRequest {
        message: format!("Missing required parameter '{key}'"),
    })
}

fn optional_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

impl GraphClient {
    pub fn new(config: &GraphConfig, root: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Internal {
                operation: format!("build Graph HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            root,
            max_pages: config.max_pages,
        })
    }

    /// Dispatch one proxied action against the Graph API.
    ///
    /// `ig_user_id` is the platform-side identity of the managed account and
    /// `access_token` its decrypted session credential.
    #[instrument(skip(self, access_token, params), fields(?action), err)]
    pub async fn execute(&self, action: GraphAction, ig_user_id: &str, access_token: &str, params: &Value) -> Result<Value> {
        match action {
            GraphAction::GetProfile => {
                let fields = optional_str(params, "fields").unwrap_or("id,username,name,biography,followers_count,media_count");
                self.get(&format!("{ig_user_id}?fields={fields}"), access_token).await
            }
            GraphAction::GetMedia => {
                let fields = optional_str(params, "fields").unwrap_or("id,caption,media_type,media_url,timestamp,like_count");
                self.get_paginated(&format!("{ig_user_id}/media?fields={fields}"), access_token).await
            }
            GraphAction::GetMediaInsights => {
                let media_id = required_str(params, "media_id")?;
                let metrics = optional_str(params, "metrics").unwrap_or("impressions,reach,saved");
                self.get(&format!("{media_id}/insights?metric={metrics}"), access_token).await
            }
            GraphAction::GetStories => self.get(&format!("{ig_user_id}/stories"), access_token).await,
            GraphAction::PublishPhoto => {
                let image_url = required_str(params, "image_url")?;
                let mut body = json!({ "image_url": image_url });
                if let Some(caption) = optional_str(params, "caption") {
                    body["caption"] = json!(caption);
                }
                self.publish_container(ig_user_id, access_token, body).await
            }
            GraphAction::PublishVideo => {
                let video_url = required_str(params, "video_url")?;
                let mut body = json!({ "video_url": video_url, "media_type": "REELS" });
                if let Some(caption) = optional_str(params, "caption") {
                    body["caption"] = json!(caption);
                }
                self.publish_container(ig_user_id, access_token, body).await
            }
            GraphAction::GetComments => {
                let media_id = required_str(params, "media_id")?;
                self.get_paginated(&format!("{media_id}/comments?fields=id,text,username,timestamp"), access_token)
                    .await
            }
            GraphAction::ReplyToComment => {
                let comment_id = required_str(params, "comment_id")?;
                let message = required_str(params, "message")?;
                self.post(&format!("{comment_id}/replies"), access_token, &json!({ "message": message })).await
            }
            GraphAction::DeleteComment => {
                let comment_id = required_str(params, "comment_id")?;
                self.delete(comment_id, access_token).await
            }
            GraphAction::SendMessage => {
                let recipient_id = required_str(params, "recipient_id")?;
                let text = required_str(params, "text")?;
                let body = json!({
                    "recipient": { "id": recipient_id },
                    "message": { "text": text },
                });
                self.post(&format!("{ig_user_id}/messages"), access_token, &body).await
            }
            GraphAction::ListConversations => {
                self.get_paginated(
                    &format!("{ig_user_id}/conversations?fields=id,participants,updated_time"),
                    access_token,
                )
                .await
            }
            GraphAction::GetConversationMessages => {
                let thread_id = required_str(params, "thread_id")?;
                self.get_paginated(&format!("{thread_id}/messages?fields=id,from,message,created_time"), access_token)
                    .await
            }
            GraphAction::GetAccountInsights => {
                let metrics = optional_str(params, "metrics").unwrap_or("impressions,reach,profile_views");
                let period = optional_str(params, "period").unwrap_or("day");
                self.get(&format!("{ig_user_id}/insights?metric={metrics}&period={period}"), access_token)
                    .await
            }
            GraphAction::GetAudienceInsights => {
                self.get(
                    &format!("{ig_user_id}/insights?metric=audience_city,audience_country,audience_gender_age&period=lifetime"),
                    access_token,
                )
                .await
            }
            GraphAction::ListAdAccounts => self.get_paginated("me/adaccounts?fields=id,name,account_status", access_token).await,
            GraphAction::GetAdInsights => {
                let ad_account_id = required_str(params, "ad_account_id")?;
                let fields = optional_str(params, "fields").unwrap_or("impressions,clicks,spend");
                self.get(&format!("{ad_account_id}/insights?fields={fields}"), access_token).await
            }
        }
    }

    /// Two-step publish: create a media container, then publish it.
    async fn publish_container(&self, ig_user_id: &str, access_token: &str, body: Value) -> Result<Value> {
        let container = self.post(&format!("{ig_user_id}/media"), access_token, &body).await?;
        let creation_id = container.get("id").and_then(Value::as_str).ok_or_else(|| Error::Upstream {
            service: "graph".to_string(),
            message: "container creation returned no id".to_string(),
        })?;

        self.post(
            &format!("{ig_user_id}/media_publish"),
            access_token,
            &json!({ "creation_id": creation_id }),
        )
        .await
    }

    fn url_for(&self, path_and_query: &str) -> String {
        format!("{}/{}", self.root, path_and_query)
    }

    async fn get(&self, path_and_query: &str, access_token: &str) -> Result<Value> {
        self.request(Method::GET, &self.url_for(path_and_query), access_token, None).await
    }

    async fn post(&self, path_and_query: &str, access_token: &str, body: &Value) -> Result<Value> {
        self.request(Method::POST, &self.url_for(path_and_query), access_token, Some(body)).await
    }

    async fn delete(&self, path_and_query: &str, access_token: &str) -> Result<Value> {
        self.request(Method::DELETE, &self.url_for(path_and_query), access_token, None).await
    }

    /// Follow `paging.next` for list reads, concatenating `data` arrays.
    ///
    /// The page loop is bounded by `max_pages`; anything longer is truncated
    /// rather than walked to the end.
    async fn get_paginated(&self, path_and_query: &str, access_token: &str) -> Result<Value> {
        let mut collected = Vec::new();
        let mut next_url = Some(self.url_for(path_and_query));
        let mut pages = 0;

        while let Some(url) = next_url.take() {
            if pages >= self.max_pages {
                debug!("Pagination truncated after {} pages", pages);
                break;
            }
            pages += 1;

            let page = self.request(Method::GET, &url, access_token, None).await?;

            match page.get("data").and_then(Value::as_array) {
                Some(items) => collected.extend(items.iter().cloned()),
                // Not list-shaped; return as-is
                None => return Ok(page),
            }

            next_url = page
                .get("paging")
                .and_then(|paging| paging.get("next"))
                .and_then(Value::as_str)
                .map(String::from);
        }

        Ok(json!({ "data": collected }))
    }

    async fn request(&self, method: Method, url: &str, access_token: &str, body: Option<&Value>) -> Result<Value> {
        let mut request = self.http.request(method, url).query(&[("access_token", access_token)]);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| Error::Upstream {
            service: "graph".to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        let payload: Value = response.json().await.map_err(|e| Error::Upstream {
            service: "graph".to_string(),
            message: format!("invalid JSON response: {e}"),
        })?;

        if !status.is_success() {
            // Graph errors carry {"error": {"message": ...}}
            let message = payload
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("request failed")
                .to_string();
            return Err(Error::Upstream {
                service: "graph".to_string(),
                message,
            });
        }

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> GraphClient {
        let config = GraphConfig {
            max_pages: 3,
            ..Default::default()
        };
        GraphClient::new(&config, format!("{}/v23.0", server.uri())).unwrap()
    }

    #[tokio::test]
    async fn test_get_profile_passes_token() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v23.0/17841400000000001"))
            .and(query_param("access_token", "tok-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "17841400000000001",
                "username": "luna.creates",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result = client
            .execute(GraphAction::GetProfile, "17841400000000001", "tok-123", &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(result["username"], "luna.creates");
    }

    #[tokio::test]
    async fn test_pagination_follows_next_and_truncates() {
        let server = MockServer::start().await;

        let page2_url = format!("{}/v23.0/page2", server.uri());
        Mock::given(method("GET"))
            .and(path("/v23.0/17841400000000001/media"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": "m1"}, {"id": "m2"}],
                "paging": {"next": page2_url},
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v23.0/page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": "m3"}],
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result = client
            .execute(GraphAction::GetMedia, "17841400000000001", "tok", &serde_json::json!({}))
            .await
            .unwrap();

        let items = result["data"].as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[2]["id"], "m3");
    }

    #[tokio::test]
    async fn test_publish_photo_is_container_then_publish() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v23.0/17841400000000001/media"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "container-1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v23.0/17841400000000001/media_publish"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "published-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result = client
            .execute(
                GraphAction::PublishPhoto,
                "17841400000000001",
                "tok",
                &serde_json::json!({"image_url": "https://cdn.example.com/p.jpg", "caption": "hi"}),
            )
            .await
            .unwrap();
        assert_eq!(result["id"], "published-1");
    }

    #[tokio::test]
    async fn test_upstream_error_message_is_surfaced() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v23.0/17841400000000001"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"message": "Invalid OAuth access token", "code": 190}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .execute(GraphAction::GetProfile, "17841400000000001", "bad", &serde_json::json!({}))
            .await
            .unwrap_err();

        match err {
            Error::Upstream { service, message } => {
                assert_eq!(service, "graph");
                assert!(message.contains("Invalid OAuth access token"));
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_required_param_is_bad_request() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;

        let err = client
            .execute(GraphAction::ReplyToComment, "ig", "tok", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
    }
}

//! 集成测试共用的假传输层与数据构造函数。

#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use serde_json::{Value, json};
use soundcloud_helper_rs::{
    ResponseCache, SoundClient, SoundCloudOptions,
    error::Result,
    http::{HttpResponse, HttpTransport},
    providers::soundcloud::credential::WebPageScraper,
};

pub const API: &str = "https://api.test";
pub const WEB: &str = "https://web.test";
pub const CLIENT_ID: &str = "TESTKEY";

type Handler = Box<dyn Fn(&str) -> Option<HttpResponse> + Send + Sync>;

/// 一次被记录下来的请求。
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

/// 按 URL 前缀返回预设响应的传输层，并记录所有请求。
///
/// 多个前缀都匹配时使用最长的那个；都不匹配时依次尝试 handler；最后返回 404。
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<Vec<(String, HttpResponse)>>,
    handlers: Mutex<Vec<Handler>>,
    requests: Mutex<Vec<RecordedRequest>>,
    delay: Option<Duration>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, prefix: impl Into<String>, body: impl Into<String>) -> Self {
        self.route_status(prefix, 200, body)
    }

    pub fn route_json(self, prefix: impl Into<String>, body: &Value) -> Self {
        self.route(prefix, body.to_string())
    }

    pub fn route_status(
        self,
        prefix: impl Into<String>,
        status: u16,
        body: impl Into<String>,
    ) -> Self {
        self.routes.lock().unwrap().push((
            prefix.into(),
            HttpResponse {
                status,
                body: body.into(),
            },
        ));
        self
    }

    pub fn handler(
        self,
        handler: impl Fn(&str) -> Option<HttpResponse> + Send + Sync + 'static,
    ) -> Self {
        self.handlers.lock().unwrap().push(Box::new(handler));
        self
    }

    /// 每个请求在返回前等待 `delay`，用来制造并发请求的重叠。
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }

    /// 以 `prefix` 开头的请求数。
    pub fn count(&self, prefix: &str) -> usize {
        self.urls().iter().filter(|u| u.starts_with(prefix)).count()
    }

    pub fn reset_requests(&self) {
        self.requests.lock().unwrap().clear();
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(RecordedRequest {
            url: url.to_string(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let routed = self
            .routes
            .lock()
            .unwrap()
            .iter()
            .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, response)| response.clone());
        if let Some(response) = routed {
            return Ok(response);
        }

        let handled = self
            .handlers
            .lock()
            .unwrap()
            .iter()
            .find_map(|handler| handler(url));
        Ok(handled.unwrap_or(HttpResponse {
            status: 404,
            body: "not found".to_string(),
        }))
    }
}

pub fn test_options() -> SoundCloudOptions {
    SoundCloudOptions {
        api_base_url: API.to_string(),
        web_base_url: WEB.to_string(),
        ..SoundCloudOptions::default()
    }
}

/// 使用内存缓存和固定的 `client_id` 创建客户端。
pub async fn client_with(transport: &Arc<FakeTransport>) -> (SoundClient, Arc<ResponseCache>) {
    let cache = Arc::new(ResponseCache::in_memory());
    let client = client_with_cache(transport, cache.clone()).await;
    (client, cache)
}

pub async fn client_with_cache(
    transport: &Arc<FakeTransport>,
    cache: Arc<ResponseCache>,
) -> SoundClient {
    let scraper = WebPageScraper::new(transport.clone(), WEB);
    SoundClient::with_parts(
        transport.clone(),
        cache,
        &scraper,
        Some(CLIENT_ID),
        test_options(),
    )
    .await
    .expect("创建客户端失败")
}

pub fn selector_url(id: u64) -> String {
    format!("{API}/media/soundcloud:tracks:{id}/abc/stream/progressive")
}

pub fn user_json(id: u64) -> Value {
    json!({
        "id": id,
        "urn": format!("soundcloud:users:{id}"),
        "username": format!("user{id}"),
        "full_name": "",
        "avatar_url": format!("https://i1.sndcdn.com/avatars-{id}-large.jpg"),
        "permalink_url": format!("https://soundcloud.com/user{id}"),
    })
}

pub fn full_track_json(id: u64) -> Value {
    json!({
        "id": id,
        "kind": "track",
        "title": format!("Track {id}"),
        "duration": 180_000 + id,
        "artwork_url": format!("https://i1.sndcdn.com/artworks-{id}-large.jpg"),
        "permalink_url": format!("https://soundcloud.com/user1/track-{id}"),
        "display_date": "2023-05-01T00:00:00Z",
        "genre": "Electronic",
        "streamable": true,
        "media": {
            "transcodings": [
                {
                    "url": format!("{API}/media/soundcloud:tracks:{id}/abc/preview/progressive"),
                    "preset": "mp3_0_0",
                    "snipped": true,
                    "format": { "protocol": "progressive", "mime_type": "audio/mpeg" }
                },
                {
                    "url": format!("{API}/media/soundcloud:tracks:{id}/abc/stream/hls"),
                    "preset": "mp3_0_0",
                    "format": { "protocol": "hls", "mime_type": "audio/mpeg" }
                },
                {
                    "url": selector_url(id),
                    "preset": "mp3_0_0",
                    "format": { "protocol": "progressive", "mime_type": "audio/mpeg" }
                }
            ]
        },
        "user": user_json(1),
    })
}

pub fn thin_track_json(id: u64) -> Value {
    json!({ "id": id, "kind": "track" })
}

pub fn unplayable_track_json(id: u64) -> Value {
    let mut track = full_track_json(id);
    track["streamable"] = json!(false);
    track
}

pub fn page_json(tracks: Vec<Value>, next_href: Option<&str>) -> Value {
    json!({ "collection": tracks, "next_href": next_href })
}

/// 从 `/tracks?ids=` 请求中取出 ID 列表。
pub fn batch_ids(url: &str) -> Option<Vec<u64>> {
    if !url.starts_with(&format!("{API}/tracks?")) {
        return None;
    }
    let parsed = reqwest::Url::parse(url).ok()?;
    let (_, ids) = parsed.query_pairs().find(|(k, _)| k == "ids")?;
    Some(ids.split(',').filter_map(|id| id.parse().ok()).collect())
}

/// 按 ID 返回完整记录的批量接口，返回顺序故意与请求顺序相反。
pub fn reversed_batch_handler(url: &str) -> Option<HttpResponse> {
    let ids = batch_ids(url)?;
    let tracks: Vec<Value> = ids.iter().rev().map(|&id| full_track_json(id)).collect();
    Some(HttpResponse::ok(Value::Array(tracks).to_string()))
}

//! HTTP 传输层抽象。
//!
//! 客户端只需要最基本的 GET 能力：发送请求、拿到状态码和文本响应体。
//! 把它抽象成 trait 之后，测试可以注入假的实现，而无需访问网络。

use async_trait::async_trait;
use reqwest::{
    Client,
    header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT},
};

use crate::error::{Result, SoundHelperError};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// 一次 HTTP 请求的响应。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP 状态码。
    pub status: u16,
    /// UTF-8 文本形式的响应体。
    pub body: String,
}

impl HttpResponse {
    /// 构造一个 200 响应。
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }
}

/// 发送 GET 请求的最小接口。
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// 对 `url` 发送 GET 请求，并附带 `headers`。
    ///
    /// 只有网络层面的失败才返回 `Err`；非 2xx 的状态码通过 `HttpResponse::status` 返回。
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse>;
}

/// 基于 `reqwest` 的默认传输实现。
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: Client,
}

impl ReqwestTransport {
    /// 使用默认的 `reqwest::Client` 创建实例。
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    /// 使用调用方提供的 `reqwest::Client`（例如自定义了超时或代理）。
    pub fn with_client(http_client: Client) -> Self {
        Self { http_client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse> {
        let mut header_map = HeaderMap::new();
        header_map.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| SoundHelperError::Internal(format!("无效的请求头名称 '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| SoundHelperError::Internal(format!("无效的请求头值 '{value}': {e}")))?;
            header_map.insert(name, value);
        }

        let response = self.http_client.get(url).headers(header_map).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(HttpResponse { status, body })
    }
}

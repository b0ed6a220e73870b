//! 获取 SoundCloud `client_id`。
//!
//! SoundCloud 没有公开的 API key，`client_id` 写在官网引用的 JS 包里，并且会不定期轮换。
//! 这里的抓取逻辑依赖页面结构，随时可能失效，所以找不到时必须报错，而不是带着空 key 继续。

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::{
    error::{Result, SoundHelperError},
    http::HttpTransport,
};

/// 官网 HTML 中跨域脚本标签的前缀。
const SCRIPT_MARKER: &str = r#"<script crossorigin src=""#;

/// JS 包中 `client_id` 的前缀。
const CLIENT_ID_MARKER: &str = r#",client_id:""#;

static SCRIPT_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^https?://[^\s"'<>]+$"#).expect("编译 SCRIPT_URL_REGEX 失败")
});

/// 获取凭据的接口。
///
/// 默认实现 [`WebPageScraper`] 会抓取官网；测试或宿主程序可以提供自己的实现。
#[async_trait]
pub trait CredentialAcquirer: Send + Sync {
    /// 尝试发现一个新的 `client_id`。找不到时返回 `Ok(None)`。
    async fn discover(&self) -> Result<Option<String>>;

    /// 获取凭据。
    ///
    /// 如果调用方提供了非空的 key，则原样采用，不做任何校验；
    /// 否则调用 [`discover`](Self::discover)，找不到时返回 `CredentialNotFound`。
    async fn acquire(&self, supplied: Option<&str>) -> Result<String> {
        if let Some(key) = supplied.filter(|k| !k.is_empty()) {
            debug!("[SoundCloud] 使用调用方提供的 client_id。");
            return Ok(key.to_string());
        }

        self.discover()
            .await?
            .filter(|k| !k.is_empty())
            .ok_or(SoundHelperError::CredentialNotFound)
    }
}

/// 从官网首页及其引用的脚本中抓取 `client_id`。
#[derive(Clone)]
pub struct WebPageScraper {
    transport: Arc<dyn HttpTransport>,
    web_base_url: String,
}

impl WebPageScraper {
    /// 创建抓取器。`web_base_url` 通常为 `https://soundcloud.com`。
    pub fn new(transport: Arc<dyn HttpTransport>, web_base_url: impl Into<String>) -> Self {
        Self {
            transport,
            web_base_url: web_base_url.into(),
        }
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.transport.get(url, &[]).await?;
        if response.status != 200 {
            return Err(SoundHelperError::from_status(response.status, &response.body));
        }
        Ok(response.body)
    }
}

#[async_trait]
impl CredentialAcquirer for WebPageScraper {
    async fn discover(&self) -> Result<Option<String>> {
        info!("[SoundCloud] 未提供 client_id，正在从官网抓取...");
        let html = self.fetch_text(&self.web_base_url).await?;
        let script_urls = extract_script_urls(&html);
        debug!("[SoundCloud] 找到 {} 个候选脚本。", script_urls.len());

        for script_url in &script_urls {
            let script = match self.fetch_text(script_url).await {
                Ok(text) => text,
                Err(e) => {
                    warn!("[SoundCloud] 获取脚本 {script_url} 失败: {e}");
                    continue;
                }
            };
            if let Some(client_id) = extract_client_id(&script) {
                info!("[SoundCloud] 已在 {script_url} 中找到 client_id。");
                return Ok(Some(client_id));
            }
        }

        warn!("[SoundCloud] 所有候选脚本中都没有找到 client_id。");
        Ok(None)
    }
}

/// 从官网 HTML 中按出现顺序提取跨域脚本的地址。
pub fn extract_script_urls(html: &str) -> Vec<String> {
    html.split(SCRIPT_MARKER)
        .skip(1)
        .filter_map(|fragment| {
            let line = fragment.lines().next()?;
            let candidate = line.split('"').next()?.trim();
            SCRIPT_URL_REGEX
                .is_match(candidate)
                .then(|| candidate.to_string())
        })
        .collect()
}

/// 在脚本文本中查找 `,client_id:"…"` 并返回引号中的内容。
pub fn extract_client_id(script: &str) -> Option<String> {
    let start = script.find(CLIENT_ID_MARKER)? + CLIENT_ID_MARKER.len();
    let rest = &script[start..];
    let end = rest.find('"')?;
    let client_id = &rest[..end];
    (!client_id.is_empty()).then(|| client_id.to_string())
}

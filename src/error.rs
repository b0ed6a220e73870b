//! 定义了整个 `soundcloud-helper` 库的错误类型 `SoundHelperError`。

use std::io;
use thiserror::Error;

/// `soundcloud-helper` 库的通用错误枚举。
#[derive(Error, Debug)]
pub enum SoundHelperError {
    /// 网络请求失败 (源自 `reqwest::Error`)
    #[error("网络请求失败: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// 服务器返回了非 200 的状态码
    #[error("HTTP 请求失败，状态码 {status}: {message}")]
    Http {
        /// HTTP 状态码。
        status: u16,
        /// 状态描述或响应体摘要。
        message: String,
    },

    /// JSON 解析失败 (源自 `serde_json::Error`)
    #[error("JSON 解析失败: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// I/O 错误 (源自 `io::Error`)
    #[error("I/O 错误: {0}")]
    Io(#[from] io::Error),

    /// 无法从网页中抓取到 client_id
    #[error("未能从 SoundCloud 页面中获取 client_id")]
    CredentialNotFound,

    /// 在没有有效 client_id 的情况下发起了需要鉴权的请求
    #[error("缺少 client_id，无法发起请求")]
    MissingCredential,

    /// URL 无法解析
    #[error("无效的 URL '{0}'")]
    InvalidUrl(String),

    /// API 返回的数据结构与预期不符
    #[error("API 返回了无法识别的数据: {0}")]
    ApiError(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),
}

/// `SoundHelperError` 的 `Result` 类型别名，方便在函数签名中使用。
pub type Result<T> = std::result::Result<T, SoundHelperError>;

impl SoundHelperError {
    /// 根据状态码构造一个 `Http` 错误，消息优先使用标准的状态描述。
    pub(crate) fn from_status(status: u16, body: &str) -> Self {
        let message = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .map(str::to_string)
            .unwrap_or_else(|| body.chars().take(200).collect());
        Self::Http { status, message }
    }
}

//! 此模块定义了用于反序列化 SoundCloud `api-v2` 响应的数据结构。
//!
//! 只建模了转换为通用模型所需要的字段，其余字段一律忽略。
//! 所有结构同时实现了 `Serialize`，以便原样写回缓存。

use serde::{Deserialize, Serialize};

// =================================================================
// 歌曲 (`/tracks/:id`, `/tracks?ids=`) 的模型
// =================================================================

/// 上游的歌曲记录。
///
/// 从列表接口拿到的记录可能是“薄”记录：只有 `id`，没有 `title` 等信息。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTrack {
    /// 歌曲的数字 ID。
    pub id: u64,
    /// 记录类型，通常为 `"track"`。
    #[serde(default)]
    pub kind: Option<String>,
    /// 歌曲名。薄记录没有这个字段。
    #[serde(default)]
    pub title: Option<String>,
    /// 时长（毫秒）。
    #[serde(default)]
    pub duration: Option<u64>,
    /// 封面地址（通常是 `-large` 尺寸）。
    #[serde(default)]
    pub artwork_url: Option<String>,
    /// 歌曲页面地址。
    #[serde(default)]
    pub permalink_url: Option<String>,
    /// 发行日期。
    #[serde(default)]
    pub release_date: Option<String>,
    /// 展示用的发布日期。
    #[serde(default)]
    pub display_date: Option<String>,
    /// 上传时间。
    #[serde(default)]
    pub created_at: Option<String>,
    /// 流派。
    #[serde(default)]
    pub genre: Option<String>,
    /// 是否允许串流播放。
    #[serde(default)]
    pub streamable: Option<bool>,
    /// 媒体信息，包含转码列表。
    #[serde(default)]
    pub media: Option<Media>,
    /// 上传者。
    #[serde(default)]
    pub user: Option<RawUser>,
}

impl RawTrack {
    /// 是否为只带 ID 的薄记录。
    pub fn is_thin(&self) -> bool {
        self.title.is_none()
    }

    /// 转码列表，没有媒体信息时为空。
    pub fn transcodings(&self) -> &[Transcoding] {
        self.media
            .as_ref()
            .map(|m| m.transcodings.as_slice())
            .unwrap_or_default()
    }
}

/// 歌曲的媒体信息。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Media {
    /// 可用的转码描述列表。
    #[serde(default)]
    pub transcodings: Vec<Transcoding>,
}

/// 单个转码描述。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcoding {
    /// 转码选择器地址。请求它（带上 client_id）才能拿到最终的媒体地址。
    pub url: String,
    /// 预设名，例如 `"mp3_0_0"`。
    #[serde(default)]
    pub preset: Option<String>,
    /// 是否为截断的试听片段。
    #[serde(default)]
    pub snipped: bool,
    /// 协议与 MIME 类型。
    pub format: TranscodingFormat,
}

/// 转码的协议与 MIME 类型。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscodingFormat {
    /// 协议，例如 `"progressive"` 或 `"hls"`。
    pub protocol: String,
    /// MIME 类型。
    #[serde(default)]
    pub mime_type: Option<String>,
}

// =================================================================
// 用户的模型
// =================================================================

/// 上游的用户记录。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawUser {
    /// 用户的数字 ID。
    pub id: u64,
    /// 带命名空间的 URN，例如 `soundcloud:users:123`。
    #[serde(default)]
    pub urn: Option<String>,
    /// 用户名。
    #[serde(default)]
    pub username: String,
    /// 全名，可能为空字符串。
    #[serde(default)]
    pub full_name: Option<String>,
    /// 头像地址。
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// 用户主页地址。
    #[serde(default)]
    pub permalink_url: Option<String>,
}

// =================================================================
// 歌单 (`/playlists/:id`) 的模型
// =================================================================

/// 上游的歌单记录。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPlaylist {
    /// 歌单的数字 ID。
    pub id: u64,
    /// 记录类型，通常为 `"playlist"`。
    #[serde(default)]
    pub kind: Option<String>,
    /// 歌单名。
    #[serde(default)]
    pub title: String,
    /// 歌单描述。
    #[serde(default)]
    pub description: Option<String>,
    /// 歌单封面。
    #[serde(default)]
    pub artwork_url: Option<String>,
    /// 歌单页面地址。
    #[serde(default)]
    pub permalink_url: Option<String>,
    /// 歌曲列表，其中除前几首外大多是薄记录。
    #[serde(default)]
    pub tracks: Vec<RawTrack>,
    /// 创建者。
    #[serde(default)]
    pub user: Option<RawUser>,
}

// =================================================================
// 分页与其它接口的模型
// =================================================================

/// 分页列表接口（搜索、用户歌曲）的响应。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackCollection {
    /// 当前页的歌曲。
    #[serde(default)]
    pub collection: Vec<RawTrack>,
    /// 下一页的完整地址。没有下一页时为空或缺失。
    #[serde(default)]
    pub next_href: Option<String>,
}

/// `/resolve` 接口返回的载荷，只用来读取 `kind`。
#[derive(Debug, Clone, Deserialize)]
pub struct ResolvedKind {
    /// 资源类型，例如 `"track"`、`"playlist"`、`"user"`。
    #[serde(default)]
    pub kind: Option<String>,
}

/// 请求转码选择器地址得到的响应。
#[derive(Debug, Clone, Deserialize)]
pub struct StreamUrlResponse {
    /// 带签名的媒体地址。
    pub url: String,
}

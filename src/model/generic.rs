//! 定义了整个库通用的、与上游数据结构无关的核心数据模型。
//!
//! 这些结构体（如 `Artist`, `Song`, `Playlist`）是从 SoundCloud 获取到原始记录后，
//! 需要转换成的目标标准格式。它们都是不可变的值对象，不持有对客户端的引用。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// 本库在艺术家扩展元数据中使用的命名空间。
pub const EXTENSION_NAMESPACE: &str = "soundcloud-helper";

/// 代理播放地址的前缀，后接歌曲 ID。
pub const PLAYBACK_PROXY_PREFIX: &str = "extension://soundcloud-helper/stream/";

/// 生成指向某首歌曲的代理播放地址。
///
/// 真正的 CDN 地址很快就会过期，所以 `Song` 上只保存这个稳定的定位符，
/// 等到真正要播放时再通过 `get_stream_url` 换取签名地址。
pub fn playback_proxy_url(song_id: &str) -> String {
    format!("{PLAYBACK_PROXY_PREFIX}{song_id}")
}

/// 从代理播放地址中取出歌曲 ID。不是本库生成的地址时返回 `None`。
pub fn parse_playback_proxy(url: &str) -> Option<&str> {
    url.strip_prefix(PLAYBACK_PROXY_PREFIX)
        .filter(|id| !id.is_empty())
}

/// 歌曲来源的类型。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SongType {
    /// 通过网络地址播放。
    #[default]
    Url,
}

/// 代表一位艺术家的通用模型。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    /// 艺术家的 ID（去掉了 URN 命名空间前缀）。
    pub id: String,
    /// 艺术家名，优先使用全名，否则使用用户名。
    pub name: String,
    /// 头像地址。
    pub cover_url: Option<String>,
    /// 以 [`EXTENSION_NAMESPACE`] 为键的扩展元数据。
    pub extra_info: Option<HashMap<String, serde_json::Value>>,
}

/// 代表一首歌曲的通用模型。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Song {
    /// 歌曲的唯一 ID。
    pub id: String,
    /// 歌曲名。
    pub title: String,
    /// 高分辨率封面地址。
    pub cover_url_high: Option<String>,
    /// 歌曲时长（秒）。
    pub duration: u64,
    /// 歌曲在 SoundCloud 上的页面地址。
    pub url: Option<String>,
    /// 播放地址。这是一个代理定位符，而不是最终的 CDN 地址。
    pub playback_url: String,
    /// 转换为本模型时的时间戳（毫秒）。
    pub date_added: i64,
    /// 发行或发布日期。
    pub release_date: Option<String>,
    /// 流派列表。
    pub genres: Vec<String>,
    /// 演唱者列表，至少包含上传者本人。
    pub artists: Vec<Artist>,
    /// 歌曲来源类型。
    pub song_type: SongType,
}

/// 代表一个歌单的通用模型。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    /// 歌单的唯一 ID。
    pub id: String,
    /// 歌单名。
    pub name: String,
    /// 歌单描述。
    pub description: Option<String>,
    /// 歌单封面。歌单本身没有封面时，取第一首带封面的歌曲的封面。
    pub cover_url: Option<String>,
}

/// 解析一个 SoundCloud 链接得到的实体。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResolvedEntity {
    /// 链接指向单首歌曲。
    Song(Song),
    /// 链接指向一个歌单，附带其中可以播放的歌曲。
    Playlist {
        /// 歌单信息。
        playlist: Playlist,
        /// 歌单中通过了可播放检查的歌曲，顺序与歌单一致。
        songs: Vec<Song>,
    },
}

/// 播放前需要的详细信息。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackDetails {
    /// 歌曲时长（秒）。
    pub duration: u64,
    /// 带签名的、短时间内有效的媒体地址。
    pub url: String,
}

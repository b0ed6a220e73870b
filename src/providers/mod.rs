//! 提供商模块
//!
//! 该模块定义了与 Providers 进行交互的核心抽象。

use async_trait::async_trait;

use crate::{
    error::Result,
    model::generic::{ResolvedEntity, Song},
};

pub mod soundcloud;

/// 定义了音乐平台提供商需要实现的通用接口。
///
/// 所有方法中的 `invalidate` 参数为 `true` 时跳过缓存读取，但仍会写入新的响应。
#[async_trait]
pub trait Provider: Send + Sync {
    ///
    /// 返回提供商的唯一名称。
    ///
    /// 一个全小写的静态字符串，例如 `"soundcloud"`。
    ///
    fn name(&self) -> &'static str;

    ///
    /// 根据关键词搜索歌曲。
    ///
    /// # 参数
    /// * `term` - 搜索关键词。
    /// * `invalidate` - 是否跳过缓存。
    ///
    /// # 返回
    /// 一个 `Result`，成功时包含可以播放的歌曲列表。不可播放的歌曲会被直接省略。
    ///
    async fn search_songs(&self, term: &str, invalidate: bool) -> Result<Vec<Song>>;

    ///
    /// 解析一个平台链接。
    ///
    /// # 返回
    /// 链接不属于该平台、或者指向不支持的资源类型时返回 `Ok(None)`，而不是错误。
    ///
    async fn resolve_url(&self, url: &str, invalidate: bool) -> Result<Option<ResolvedEntity>>;

    ///
    /// 获取指定歌手的歌曲列表。
    ///
    /// # 参数
    /// * `artist_id` - 歌手 ID。
    /// * `invalidate` - 是否跳过缓存。
    ///
    async fn get_artist_songs(&self, artist_id: &str, invalidate: bool) -> Result<Vec<Song>>;

    ///
    /// 获取指定歌单中的歌曲，顺序与歌单一致。
    ///
    /// # 参数
    /// * `playlist_id` - 歌单 ID。
    /// * `invalidate` - 是否跳过缓存。
    ///
    async fn get_playlist_songs(&self, playlist_id: &str, invalidate: bool) -> Result<Vec<Song>>;

    ///
    /// 根据歌曲 ID 获取可播放的音频文件链接。
    ///
    /// # 注意
    /// 返回的链接很快就会过期，应在播放前再获取。歌曲不可播放时返回 `Ok(None)`。
    ///
    async fn get_song_link(&self, song_id: &str) -> Result<Option<String>>;
}

#![warn(missing_docs)]

//! # SoundCloud Helper RS
//!
//! 一个 SoundCloud 客户端库：搜索歌曲、解析链接、列出歌手与歌单的歌曲，并在播放前换取签名后的播放地址。
//!
//! ## 主要功能
//!
//! - **凭据获取**: 未提供 `client_id` 时，自动从官网及其引用的脚本中抓取。
//! - **响应缓存**: 所有 API 响应都会写入磁盘缓存，每个操作都可以通过 `invalidate` 参数跳过缓存读取。
//! - **统一模型**: 上游的各种记录被转换为 `Song`、`Artist`、`Playlist`。不可播放的歌曲会被直接过滤掉。
//! - **延迟解析播放地址**: `Song::playback_url` 只是一个代理定位符，
//!   真正的 CDN 地址在播放前通过 [`SoundClient::get_playback_details`] 获取。
//!
//! ## 示例
//!
//! ```rust,no_run
//! use soundcloud_helper_rs::SoundClient;
//!
//! async {
//!     let client = SoundClient::new_default().await.unwrap();
//!
//!     let songs = client.search("hello", false).await.unwrap();
//!     for song in &songs {
//!         println!("{} ({} 秒)", song.title, song.duration);
//!     }
//!
//!     if let Some(song) = songs.first() {
//!         match client.get_playback_details(song).await {
//!             Ok(Some(details)) => println!("播放地址: {}", details.url),
//!             Ok(None) => println!("这首歌无法播放。"),
//!             Err(e) => eprintln!("获取播放地址失败: {}", e),
//!         }
//!     }
//! };
//! ```
pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod model;
pub mod providers;

use std::{path::PathBuf, sync::Arc};

use tracing::{info, warn};

pub use crate::{
    cache::ResponseCache,
    error::{Result, SoundHelperError},
    model::generic::{Artist, PlaybackDetails, Playlist, ResolvedEntity, Song},
    providers::soundcloud::SoundCloudOptions,
};

use crate::{
    config::{SoundCloudConfig, default_cache_path, load_soundcloud_config, save_soundcloud_config},
    http::{HttpTransport, ReqwestTransport},
    model::generic::parse_playback_proxy,
    providers::{
        Provider,
        soundcloud::{
            SoundCloud,
            credential::{CredentialAcquirer, WebPageScraper},
        },
    },
};

// ==========================================================
//  顶层 API
// ==========================================================

/// 顶层客户端，封装了凭据、缓存和 SoundCloud 提供商，为宿主程序提供统一、简单的接口。
///
/// 这是与本库交互的主要入口点。构造完成后状态不再改变，可以在多个任务之间共享。
#[derive(Debug, Clone)]
pub struct SoundClient {
    provider: SoundCloud,
}

impl SoundClient {
    /// 使用默认配置创建客户端。
    ///
    /// 会尝试从配置目录加载上次保存的 `client_id`；没有的话从官网抓取，并在成功后保存。
    /// 缓存文件位于用户缓存目录下。
    pub async fn new_default() -> Result<Self> {
        let persisted = load_soundcloud_config().ok().map(|config| config.client_id);
        if persisted.is_none() {
            info!("[Main] 未找到已保存的 client_id，将从官网获取。");
        }

        let cache_path = default_cache_path()?;
        let client = Self::new(
            Arc::new(ReqwestTransport::new()),
            cache_path,
            persisted.as_deref(),
            SoundCloudOptions::default(),
        )
        .await?;

        if persisted.as_deref() != Some(client.client_id()) {
            let config = SoundCloudConfig {
                client_id: client.client_id().to_string(),
            };
            if let Err(e) = save_soundcloud_config(&config) {
                warn!("[Main] 保存新的 client_id 失败: {}", e);
            }
        }

        Ok(client)
    }

    /// 创建客户端。
    ///
    /// # 参数
    /// * `transport` - 发送 HTTP 请求的实现。
    /// * `cache_path` - 缓存文件的路径，文件不存在时会在首次写入时创建。
    /// * `client_id` - 调用方已有的 `client_id`。为 `None` 或空字符串时从官网抓取。
    /// * `options` - 可调参数。
    pub async fn new(
        transport: Arc<dyn HttpTransport>,
        cache_path: impl Into<PathBuf>,
        client_id: Option<&str>,
        options: SoundCloudOptions,
    ) -> Result<Self> {
        let cache = Arc::new(ResponseCache::open(cache_path).await?);
        let scraper = WebPageScraper::new(transport.clone(), options.web_base_url.clone());
        Self::with_parts(transport, cache, &scraper, client_id, options).await
    }

    /// 使用调用方提供的各个组件创建客户端，例如自定义的凭据获取方式或内存缓存。
    pub async fn with_parts(
        transport: Arc<dyn HttpTransport>,
        cache: Arc<ResponseCache>,
        acquirer: &dyn CredentialAcquirer,
        client_id: Option<&str>,
        options: SoundCloudOptions,
    ) -> Result<Self> {
        let provider = SoundCloud::new(transport, cache, acquirer, client_id, options).await?;
        info!("[Main] SoundCloud 客户端初始化成功。");
        Ok(Self { provider })
    }

    /// 当前使用的 `client_id`。宿主程序可以自行保存它，下次启动时传入。
    pub fn client_id(&self) -> &str {
        self.provider.client_id()
    }

    /// 提供商的名称。
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// 底层的 SoundCloud 提供商。
    pub fn provider(&self) -> &SoundCloud {
        &self.provider
    }

    /// 按关键词搜索歌曲。
    pub async fn search(&self, term: &str, invalidate: bool) -> Result<Vec<Song>> {
        self.provider.search_songs(term, invalidate).await
    }

    /// 解析一个 SoundCloud 链接，得到单首歌曲或者歌单。
    ///
    /// 链接的查询参数会被忽略。非 SoundCloud 链接或不支持的资源类型返回 `Ok(None)`。
    pub async fn resolve_url(&self, url: &str, invalidate: bool) -> Result<Option<ResolvedEntity>> {
        self.provider.resolve_url(url, invalidate).await
    }

    /// 获取歌手的歌曲。至少会尝试收集一整页的歌曲。
    pub async fn get_artist_songs(&self, artist_id: &str, invalidate: bool) -> Result<Vec<Song>> {
        self.provider.get_artist_songs(artist_id, invalidate).await
    }

    /// 获取歌单中的歌曲。
    pub async fn get_playlist_songs(&self, playlist_id: &str, invalidate: bool) -> Result<Vec<Song>> {
        self.provider.get_playlist_songs(playlist_id, invalidate).await
    }

    /// 根据歌曲 ID 获取签名后的播放地址。歌曲不可播放时返回 `Ok(None)`。
    pub async fn get_stream_url(&self, song_id: &str) -> Result<Option<String>> {
        self.provider.get_song_link(song_id).await
    }

    /// 用一个已知的转码选择器地址换取签名后的播放地址。
    pub async fn get_stream_url_from_transcoding(&self, selector_url: &str) -> Result<String> {
        self.provider.get_stream_url_from_transcoding(selector_url).await
    }

    /// 获取播放一首歌所需的信息。
    ///
    /// 只处理由本库生成的歌曲（`playback_url` 为代理定位符），其它歌曲返回 `Ok(None)`。
    pub async fn get_playback_details(&self, song: &Song) -> Result<Option<PlaybackDetails>> {
        let Some(song_id) = parse_playback_proxy(&song.playback_url) else {
            return Ok(None);
        };
        let url = self.get_stream_url(song_id).await?;
        Ok(url.map(|url| PlaybackDetails {
            duration: song.duration,
            url,
        }))
    }
}

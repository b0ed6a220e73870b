//! 实现了与 SoundCloud 进行交互的 `Provider`。
//!
//! 使用的是官网自己调用的 `api-v2` 接口，没有公开文档，字段随时可能变化。
//!
//! # 使用流程
//!
//! 1. 通过 [`SoundCloud::new`] 创建实例。未提供 `client_id` 时会从官网抓取。
//! 2. 调用 `search_songs`、`get_artist_songs`、`get_playlist_songs` 或 `resolve_url` 获取歌曲。
//!    返回的 `Song::playback_url` 只是一个代理定位符。
//! 3. 真正要播放时，调用 `get_song_link(id)` 换取短时间内有效的签名地址。
//!
//! 所有请求都按顺序执行，返回的集合顺序与上游一致。

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::{
    cache::{CacheKind, ResponseCache},
    error::{Result, SoundHelperError},
    http::HttpTransport,
    model::generic::{Playlist, ResolvedEntity, Song},
    providers::Provider,
};

pub mod credential;
pub mod models;
pub mod normalizer;
pub mod stream;

use credential::CredentialAcquirer;
use models::{RawPlaylist, RawTrack, ResolvedKind, TrackCollection};
use normalizer::{normalize_track, playlist_to_playlist};

const SOUNDCLOUD_API_BASE: &str = "https://api-v2.soundcloud.com";
const SOUNDCLOUD_WEB_BASE: &str = "https://soundcloud.com";
const SOUNDCLOUD_REFERER: &str = "https://soundcloud.com/";
const SUPPORTED_HOSTS: [&str; 3] = ["soundcloud.com", "www.soundcloud.com", "m.soundcloud.com"];
const CLIENT_ID_PARAM: &str = "client_id";

/// `SoundCloud` 的可调参数。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundCloudOptions {
    /// `api-v2` 的根地址。
    pub api_base_url: String,
    /// 官网根地址，用于抓取 `client_id`。
    pub web_base_url: String,
    /// 每个请求附带的 `Referer`。
    pub referer: String,
    /// 分页请求时每页的条数（`limit` 参数）。
    pub page_size: usize,
    /// 分页列表至少收集这么多首歌曲后才停止翻页。
    pub min_listing_items: usize,
    /// 批量获取歌曲详情时每个请求最多包含的 ID 数。
    pub batch_size: usize,
    /// 分页列表最多请求的页数。`None` 表示不设上限，
    /// 此时上游若一直返回空页和新游标，翻页不会停止。
    pub max_listing_pages: Option<usize>,
}

impl Default for SoundCloudOptions {
    fn default() -> Self {
        Self {
            api_base_url: SOUNDCLOUD_API_BASE.to_string(),
            web_base_url: SOUNDCLOUD_WEB_BASE.to_string(),
            referer: SOUNDCLOUD_REFERER.to_string(),
            page_size: 20,
            min_listing_items: 20,
            batch_size: 49,
            max_listing_pages: None,
        }
    }
}

/// SoundCloud 的 Provider 实现。
///
/// 构造完成后 `client_id` 不再改变；凭据失效只会表现为请求失败。
#[derive(Clone)]
pub struct SoundCloud {
    transport: Arc<dyn HttpTransport>,
    cache: Arc<ResponseCache>,
    client_id: String,
    options: SoundCloudOptions,
}

impl std::fmt::Debug for SoundCloud {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundCloud")
            .field("client_id", &self.client_id)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl SoundCloud {
    /// 创建实例。`supplied_client_id` 非空时原样采用，否则通过 `acquirer` 获取。
    ///
    /// 找不到 `client_id` 时返回 `CredentialNotFound`。
    pub async fn new(
        transport: Arc<dyn HttpTransport>,
        cache: Arc<ResponseCache>,
        acquirer: &dyn CredentialAcquirer,
        supplied_client_id: Option<&str>,
        options: SoundCloudOptions,
    ) -> Result<Self> {
        let client_id = acquirer.acquire(supplied_client_id).await?;
        Self::with_client_id(transport, cache, client_id, options)
    }

    /// 使用已知的 `client_id` 创建实例。`client_id` 为空时返回 `MissingCredential`。
    pub fn with_client_id(
        transport: Arc<dyn HttpTransport>,
        cache: Arc<ResponseCache>,
        client_id: impl Into<String>,
        options: SoundCloudOptions,
    ) -> Result<Self> {
        let client_id = client_id.into();
        if client_id.is_empty() {
            return Err(SoundHelperError::MissingCredential);
        }
        Ok(Self {
            transport,
            cache,
            client_id,
            options,
        })
    }

    /// 当前使用的 `client_id`。
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// 当前的参数。
    pub fn options(&self) -> &SoundCloudOptions {
        &self.options
    }

    /// 底层的响应缓存。
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    // =================================================================
    // 请求网关
    // =================================================================

    /// 拼出不带 `client_id` 的 API 地址。这个地址同时用作列表接口的缓存键。
    fn api_url(&self, path: &str, params: &BTreeMap<String, String>) -> Result<Url> {
        let raw = format!("{}{path}", self.options.api_base_url.trim_end_matches('/'));
        let mut url = Url::parse(&raw).map_err(|e| SoundHelperError::InvalidUrl(format!("{raw}: {e}")))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params.iter());
        }
        Ok(url)
    }

    /// 在地址上追加 `client_id`。
    fn authenticate(&self, mut url: Url) -> Url {
        url.query_pairs_mut()
            .append_pair(CLIENT_ID_PARAM, &self.client_id);
        url
    }

    /// 发送带 `Referer` 的 GET 请求，要求状态码为 200，返回响应体文本。
    async fn get_text(&self, url: &Url) -> Result<String> {
        let response = self
            .transport
            .get(url.as_str(), &[("Referer", self.options.referer.as_str())])
            .await?;
        if response.status != 200 {
            warn!("[SoundCloud] 请求 {} 返回了状态码 {}", url.path(), response.status);
            return Err(SoundHelperError::from_status(response.status, &response.body));
        }
        Ok(response.body)
    }

    /// 请求一个 API 接口并解析 JSON，不经过缓存。返回解析结果和原始响应体。
    async fn fetch_uncached<T: DeserializeOwned>(&self, url: Url) -> Result<(T, String)> {
        let request_url = url.to_string();
        let body = self.get_text(&self.authenticate(url)).await?;

        tracing::trace!(
            url = %request_url,
            response.body = %body,
            "原始 JSON 响应"
        );

        let parsed = serde_json::from_str(&body)?;
        Ok((parsed, body))
    }

    /// 带缓存地请求一个 API 接口。
    ///
    /// `ident` 为 `None` 时以完整的请求地址（不含 `client_id`）作为缓存标识。
    /// `invalidate` 为 `true` 时跳过读取缓存，但仍会写入新的响应。
    ///
    /// 同一个键的“未命中、请求、写入”在键锁内完成，并发的相同请求只会访问一次网络。
    async fn fetch_cached<T: DeserializeOwned>(
        &self,
        kind: CacheKind,
        ident: Option<&str>,
        path: &str,
        params: &BTreeMap<String, String>,
        invalidate: bool,
    ) -> Result<T> {
        let url = self.api_url(path, params)?;
        let key = kind.key(ident.unwrap_or(url.as_str()));

        if !invalidate && let Some(hit) = self.cache.read_parsed::<T>(&key) {
            debug!("[SoundCloud] 缓存命中: {key}");
            return Ok(hit);
        }

        let guard = self.cache.lock_key(&key).await;
        let result = self.fetch_locked(&key, url, invalidate).await;
        drop(guard);
        self.cache.release_key(&key);
        result
    }

    /// 持有键锁时调用。等锁期间其它任务可能已经写入了同一个键。
    async fn fetch_locked<T: DeserializeOwned>(
        &self,
        key: &str,
        url: Url,
        invalidate: bool,
    ) -> Result<T> {
        if !invalidate && let Some(hit) = self.cache.read_parsed::<T>(key) {
            debug!("[SoundCloud] 等锁期间已被写入缓存: {key}");
            return Ok(hit);
        }

        debug!("[SoundCloud] 缓存未命中，请求网络: {key}");
        let (parsed, body) = self.fetch_uncached::<T>(url).await?;
        self.cache.write_raw(key, body).await?;
        Ok(parsed)
    }

    // =================================================================
    // 分页
    // =================================================================

    /// 顺着 `next_href` 翻页，直到收集到足够多的歌曲或者游标耗尽。
    ///
    /// 最后一页不会被截断，所以结果可能超过 `min_listing_items`。
    async fn fetch_paginated(
        &self,
        kind: CacheKind,
        path: &str,
        mut params: BTreeMap<String, String>,
        invalidate: bool,
    ) -> Result<Vec<Song>> {
        params.insert("limit".to_string(), self.options.page_size.to_string());

        let mut songs = Vec::new();
        let mut pages = 0usize;

        loop {
            let page: TrackCollection = self
                .fetch_cached(kind, None, path, &params, invalidate)
                .await?;
            pages += 1;

            let collected = self.to_songs(page.collection, invalidate).await?;
            debug!(
                "[SoundCloud] 第 {pages} 页得到 {} 首可播放的歌曲。",
                collected.len()
            );
            songs.extend(collected);

            if songs.len() >= self.options.min_listing_items {
                break;
            }
            let Some(next_href) = page.next_href.filter(|href| !href.is_empty()) else {
                break;
            };
            if let Some(max_pages) = self.options.max_listing_pages
                && pages >= max_pages
            {
                warn!("[SoundCloud] 已达到翻页上限 {max_pages}，停止翻页。");
                break;
            }

            merge_cursor_params(&mut params, &next_href)?;
        }

        self.cache.persist().await?;
        Ok(songs)
    }

    // =================================================================
    // 记录转换
    // =================================================================

    /// 转换一首歌曲。薄记录会先补全详情（缓存键 `songDets:<id>`）。
    ///
    /// 选中的转码地址会暂存到 `song:<id>`，由调用方在操作结束时统一落盘。
    /// 不可播放的歌曲返回 `Ok(None)`。
    async fn to_song(&self, track: RawTrack, invalidate: bool) -> Result<Option<Song>> {
        let track = if track.is_thin() {
            self.fetch_track_details(track.id, invalidate).await?
        } else {
            track
        };
        self.normalize_and_remember(&track).await
    }

    async fn to_songs(&self, tracks: Vec<RawTrack>, invalidate: bool) -> Result<Vec<Song>> {
        let mut songs = Vec::with_capacity(tracks.len());
        for track in tracks {
            if let Some(song) = self.to_song(track, invalidate).await? {
                songs.push(song);
            }
        }
        Ok(songs)
    }

    async fn normalize_and_remember(&self, track: &RawTrack) -> Result<Option<Song>> {
        let now = chrono::Utc::now().timestamp_millis();
        let Some(normalized) = normalize_track(track, now) else {
            debug!("[SoundCloud] 歌曲 {} 不可播放，已跳过。", track.id);
            return Ok(None);
        };

        let key = CacheKind::Song.key(&normalized.song.id);
        self.cache.stage(&key, normalized.selector_url)?;
        Ok(Some(normalized.song))
    }

    /// 获取单首歌曲的完整记录。
    async fn fetch_track_details(&self, track_id: u64, invalidate: bool) -> Result<RawTrack> {
        let id = track_id.to_string();
        self.fetch_cached(
            CacheKind::SongDetails,
            Some(&id),
            &format!("/tracks/{id}"),
            &BTreeMap::new(),
            invalidate,
        )
        .await
    }

    /// 批量获取歌曲的完整记录。
    ///
    /// 已缓存的 ID 直接读取缓存；其余的按 `batch_size` 分批请求 `/tracks?ids=`。
    /// 结果按输入顺序排列，上游没有返回的 ID 不会出现在结果中。
    pub async fn fetch_tracks_batch(&self, ids: &[u64], invalidate: bool) -> Result<Vec<RawTrack>> {
        let mut found: HashMap<u64, RawTrack> = HashMap::with_capacity(ids.len());
        let mut missing = Vec::new();

        for &id in ids {
            if found.contains_key(&id) || missing.contains(&id) {
                continue;
            }
            let cached = (!invalidate)
                .then(|| {
                    self.cache
                        .read_parsed::<RawTrack>(&CacheKind::SongDetails.key(&id.to_string()))
                })
                .flatten();
            match cached {
                Some(track) => {
                    found.insert(id, track);
                }
                None => missing.push(id),
            }
        }

        for chunk in missing.chunks(self.options.batch_size.max(1)) {
            let joined = chunk
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(",");
            debug!("[SoundCloud] 批量获取 {} 首歌曲的详情。", chunk.len());

            let mut params = BTreeMap::new();
            params.insert("ids".to_string(), joined);
            let (tracks, _): (Vec<RawTrack>, _) =
                self.fetch_uncached(self.api_url("/tracks", &params)?).await?;

            for track in tracks {
                self.cache
                    .stage(&CacheKind::SongDetails.key(&track.id.to_string()), &track)?;
                found.insert(track.id, track);
            }
        }
        self.cache.persist().await?;

        Ok(ids.iter().filter_map(|id| found.get(id).cloned()).collect())
    }

    /// 把歌单转换为通用模型，并转换其中的歌曲。
    ///
    /// 歌单里的薄记录会通过批量接口一次性补全。封面在补全之后才计算，
    /// 这样歌单本身没有封面时也能取到第一首歌的封面。
    async fn expand_playlist(
        &self,
        mut raw: RawPlaylist,
        invalidate: bool,
    ) -> Result<(Playlist, Vec<Song>)> {
        let thin_ids: Vec<u64> = raw
            .tracks
            .iter()
            .filter(|t| t.is_thin())
            .map(|t| t.id)
            .collect();
        let mut details: HashMap<u64, RawTrack> = self
            .fetch_tracks_batch(&thin_ids, invalidate)
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();

        let mut full_tracks = Vec::with_capacity(raw.tracks.len());
        for track in std::mem::take(&mut raw.tracks) {
            if !track.is_thin() {
                full_tracks.push(track);
                continue;
            }
            match details.remove(&track.id) {
                Some(full) => full_tracks.push(full),
                None => debug!("[SoundCloud] 上游没有返回歌曲 {} 的详情。", track.id),
            }
        }
        raw.tracks = full_tracks;
        let playlist = playlist_to_playlist(&raw);

        let mut songs = Vec::with_capacity(raw.tracks.len());
        for track in &raw.tracks {
            if let Some(song) = self.normalize_and_remember(track).await? {
                songs.push(song);
            }
        }
        self.cache.persist().await?;

        Ok((playlist, songs))
    }
}

/// 如果链接属于 SoundCloud 官网，返回去掉查询参数和片段后的链接。
pub fn canonical_soundcloud_url(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let host = parsed.host_str()?.to_ascii_lowercase();
    if !SUPPORTED_HOSTS.contains(&host.as_str()) {
        return None;
    }
    parsed.set_query(None);
    parsed.set_fragment(None);
    Some(parsed.to_string())
}

/// 把游标地址中的查询参数合并到（并覆盖）现有参数上。
fn merge_cursor_params(params: &mut BTreeMap<String, String>, next_href: &str) -> Result<()> {
    let cursor = Url::parse(next_href)
        .map_err(|e| SoundHelperError::InvalidUrl(format!("{next_href}: {e}")))?;
    for (name, value) in cursor.query_pairs() {
        if name != CLIENT_ID_PARAM {
            params.insert(name.into_owned(), value.into_owned());
        }
    }
    Ok(())
}

#[async_trait]
impl Provider for SoundCloud {
    fn name(&self) -> &'static str {
        "soundcloud"
    }

    #[instrument(skip(self))]
    async fn search_songs(&self, term: &str, invalidate: bool) -> Result<Vec<Song>> {
        let mut params = BTreeMap::new();
        params.insert("q".to_string(), term.to_string());
        let songs = self
            .fetch_paginated(CacheKind::Search, "/search/tracks", params, invalidate)
            .await?;
        info!("[SoundCloud] 搜索 '{term}' 得到 {} 首歌曲。", songs.len());
        Ok(songs)
    }

    #[instrument(skip(self))]
    async fn resolve_url(&self, url: &str, invalidate: bool) -> Result<Option<ResolvedEntity>> {
        let Some(canonical) = canonical_soundcloud_url(url) else {
            debug!("[SoundCloud] 不是 SoundCloud 的链接: {url}");
            return Ok(None);
        };

        let mut params = BTreeMap::new();
        params.insert("url".to_string(), canonical.clone());
        let payload: serde_json::Value = self
            .fetch_cached(
                CacheKind::Resolve,
                Some(&canonical),
                "/resolve",
                &params,
                invalidate,
            )
            .await?;

        let kind: ResolvedKind = serde_json::from_value(payload.clone())?;
        match kind.kind.as_deref() {
            Some("track") => {
                let track: RawTrack = serde_json::from_value(payload)?;
                let song = self.to_song(track, invalidate).await?;
                self.cache.persist().await?;
                Ok(song.map(ResolvedEntity::Song))
            }
            Some("playlist") => {
                let raw: RawPlaylist = serde_json::from_value(payload)?;
                let (playlist, songs) = self.expand_playlist(raw, invalidate).await?;
                Ok(Some(ResolvedEntity::Playlist { playlist, songs }))
            }
            other => {
                debug!("[SoundCloud] 不支持的资源类型 {other:?}，链接: {canonical}");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_artist_songs(&self, artist_id: &str, invalidate: bool) -> Result<Vec<Song>> {
        self.fetch_paginated(
            CacheKind::Tracks,
            &format!("/users/{artist_id}/tracks"),
            BTreeMap::new(),
            invalidate,
        )
        .await
    }

    #[instrument(skip(self))]
    async fn get_playlist_songs(&self, playlist_id: &str, invalidate: bool) -> Result<Vec<Song>> {
        let raw: RawPlaylist = self
            .fetch_cached(
                CacheKind::Playlist,
                Some(playlist_id),
                &format!("/playlists/{playlist_id}"),
                &BTreeMap::new(),
                invalidate,
            )
            .await?;
        let (_, songs) = self.expand_playlist(raw, invalidate).await?;
        Ok(songs)
    }

    #[instrument(skip(self))]
    async fn get_song_link(&self, song_id: &str) -> Result<Option<String>> {
        self.get_stream_url(song_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_url_strips_query_and_fragment() {
        assert_eq!(
            canonical_soundcloud_url("https://soundcloud.com/artist/song?si=abc&utm_source=x#t=10")
                .as_deref(),
            Some("https://soundcloud.com/artist/song")
        );
        assert_eq!(
            canonical_soundcloud_url("https://m.soundcloud.com/artist/sets/mix").as_deref(),
            Some("https://m.soundcloud.com/artist/sets/mix")
        );
    }

    #[test]
    fn test_canonical_url_rejects_foreign_urls() {
        assert_eq!(canonical_soundcloud_url("https://example.com/artist/song"), None);
        assert_eq!(canonical_soundcloud_url("https://soundcloud.com.evil.io/a"), None);
        assert_eq!(canonical_soundcloud_url("ftp://soundcloud.com/a"), None);
        assert_eq!(canonical_soundcloud_url("not a url"), None);
    }

    #[test]
    fn test_cursor_params_override_base_params() {
        let mut params = BTreeMap::new();
        params.insert("q".to_string(), "hello".to_string());
        params.insert("limit".to_string(), "20".to_string());

        merge_cursor_params(
            &mut params,
            "https://api-v2.soundcloud.com/search/tracks?q=hello&offset=20&limit=20&client_id=stale",
        )
        .unwrap();

        assert_eq!(params.get("offset").map(String::as_str), Some("20"));
        assert_eq!(params.get("q").map(String::as_str), Some("hello"));
        assert!(!params.contains_key("client_id"));
    }

    #[test]
    fn test_empty_client_id_is_rejected() {
        let result = SoundCloud::with_client_id(
            Arc::new(crate::http::ReqwestTransport::new()),
            Arc::new(ResponseCache::in_memory()),
            "",
            SoundCloudOptions::default(),
        );
        assert!(matches!(result, Err(SoundHelperError::MissingCredential)));
    }

    async fn live_provider() -> SoundCloud {
        let transport = Arc::new(crate::http::ReqwestTransport::new());
        let scraper = credential::WebPageScraper::new(transport.clone(), SOUNDCLOUD_WEB_BASE);
        SoundCloud::new(
            transport,
            Arc::new(ResponseCache::in_memory()),
            &scraper,
            None,
            SoundCloudOptions::default(),
        )
        .await
        .expect("创建 SoundCloud 实例失败")
    }

    #[tokio::test]
    #[ignore]
    async fn test_integration_search_and_stream() {
        let provider = live_provider().await;

        let songs = provider.search_songs("hello", false).await.unwrap();
        assert!(!songs.is_empty(), "搜索应返回结果。");
        assert!(songs.iter().all(|s| s.duration > 0), "时长应大于 0。");

        let link = provider.get_song_link(&songs[0].id).await.unwrap();
        assert!(link.is_some_and(|l| l.starts_with("http")), "应能换取播放地址。");
    }

    #[tokio::test]
    #[ignore]
    async fn test_integration_resolve_url() {
        let provider = live_provider().await;

        let resolved = provider
            .resolve_url("https://soundcloud.com/forss/flickermood", false)
            .await
            .unwrap();
        assert!(
            matches!(resolved, Some(ResolvedEntity::Song(_))),
            "应解析为单首歌曲。"
        );
    }
}

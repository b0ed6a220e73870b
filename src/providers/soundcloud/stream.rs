//! 播放地址的解析。
//!
//! 转码选择器地址是稳定的，可以长期缓存（`song:<id>`）；
//! 用它换来的签名地址很快就会过期，所以每次播放前都要重新请求，且从不缓存。

use reqwest::Url;
use tracing::{debug, instrument};

use super::{CLIENT_ID_PARAM, SoundCloud, models::StreamUrlResponse};
use crate::{
    cache::CacheKind,
    error::{Result, SoundHelperError},
};

impl SoundCloud {
    /// 根据歌曲 ID 获取签名后的播放地址。
    ///
    /// 优先使用缓存的转码选择器；没有缓存时先获取歌曲详情并重新选择。
    /// 歌曲不可播放时返回 `Ok(None)`。
    #[instrument(skip(self))]
    pub async fn get_stream_url(&self, song_id: &str) -> Result<Option<String>> {
        let Some(selector) = self.selector_for(song_id).await? else {
            return Ok(None);
        };
        self.get_stream_url_from_transcoding(&selector).await.map(Some)
    }

    /// 用一个已知的转码选择器地址换取签名后的播放地址。
    pub async fn get_stream_url_from_transcoding(&self, selector_url: &str) -> Result<String> {
        let signed = sign_selector_url(selector_url, &self.client_id)?;
        let body = self.get_text(&signed).await?;
        let response: StreamUrlResponse = serde_json::from_str(&body)?;
        if response.url.is_empty() {
            return Err(SoundHelperError::ApiError(
                "转码接口没有返回播放地址".to_string(),
            ));
        }
        Ok(response.url)
    }

    async fn selector_for(&self, song_id: &str) -> Result<Option<String>> {
        let key = CacheKind::Song.key(song_id);
        if let Some(selector) = self.cache.read_parsed::<String>(&key) {
            debug!("[SoundCloud] 使用缓存的转码选择器: {key}");
            return Ok(Some(selector));
        }

        let track_id = song_id
            .parse::<u64>()
            .map_err(|_| SoundHelperError::ApiError(format!("无效的歌曲 ID '{song_id}'")))?;
        let track = self.fetch_track_details(track_id, false).await?;
        // 转换成功时会顺带暂存 `song:<id>`。
        let playable = self.normalize_and_remember(&track).await?.is_some();
        self.cache.persist().await?;
        if !playable {
            return Ok(None);
        }
        Ok(self.cache.read_parsed::<String>(&key))
    }
}

/// 在转码选择器地址上追加 `client_id`，保留其原有的查询参数。
pub fn sign_selector_url(selector_url: &str, client_id: &str) -> Result<Url> {
    let mut url = Url::parse(selector_url)
        .map_err(|e| SoundHelperError::InvalidUrl(format!("{selector_url}: {e}")))?;
    url.query_pairs_mut().append_pair(CLIENT_ID_PARAM, client_id);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_selector_url_appends_client_id() {
        let url = sign_selector_url(
            "https://api-v2.soundcloud.com/media/soundcloud:tracks:1/abc/stream/progressive",
            "KEY",
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api-v2.soundcloud.com/media/soundcloud:tracks:1/abc/stream/progressive?client_id=KEY"
        );
    }

    #[test]
    fn test_sign_selector_url_keeps_existing_query() {
        let url = sign_selector_url(
            "https://api-v2.soundcloud.com/media/1/stream/progressive?track_authorization=t0k",
            "KEY",
        )
        .unwrap();
        assert_eq!(url.query(), Some("track_authorization=t0k&client_id=KEY"));
    }

    #[test]
    fn test_sign_selector_url_rejects_garbage() {
        assert!(matches!(
            sign_selector_url("not a url", "KEY"),
            Err(SoundHelperError::InvalidUrl(_))
        ));
    }
}

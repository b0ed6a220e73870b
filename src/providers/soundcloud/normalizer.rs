//! 将 SoundCloud 的原始记录转换为通用模型。
//!
//! 这里只有纯函数。薄记录需要先由 `SoundCloud` 补全，再交给这里处理。

use std::collections::HashMap;

use serde_json::json;

use super::models::{RawPlaylist, RawTrack, RawUser, Transcoding};
use crate::model::generic::{
    Artist, EXTENSION_NAMESPACE, Playlist, Song, SongType, playback_proxy_url,
};

/// 用户 URN 的命名空间前缀。
pub const USER_URN_PREFIX: &str = "soundcloud:users:";

const PROGRESSIVE_PROTOCOL: &str = "progressive";
const PREVIEW_MARKER: &str = "preview";

/// 一首通过了可播放检查的歌曲，以及为它选定的转码选择器地址。
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTrack<'a> {
    /// 转换后的歌曲。
    pub song: Song,
    /// 选定的转码选择器地址，供之后换取签名地址。
    pub selector_url: &'a str,
}

/// 选出可以直接播放的转码：协议为 `progressive`，且地址中不含 `preview`。
pub fn select_transcoding(track: &RawTrack) -> Option<&Transcoding> {
    track.transcodings().iter().find(|t| {
        t.format.protocol == PROGRESSIVE_PROTOCOL && !t.url.contains(PREVIEW_MARKER)
    })
}

/// 转换一首歌曲。
///
/// 不可串流、没有转码列表或者没有合适转码的歌曲返回 `None`。
/// `date_added` 为写入 `Song::date_added` 的毫秒时间戳。
pub fn normalize_track(track: &RawTrack, date_added: i64) -> Option<NormalizedTrack<'_>> {
    if track.streamable != Some(true) || track.transcodings().is_empty() {
        return None;
    }
    let selector_url = select_transcoding(track)?.url.as_str();

    let id = track.id.to_string();
    let artist = track.user.as_ref().map(user_to_artist);
    let cover_url_high = track
        .artwork_url
        .as_deref()
        .map(high_res_artwork)
        .or_else(|| artist.as_ref().and_then(|a| a.cover_url.clone()));

    let song = Song {
        playback_url: playback_proxy_url(&id),
        id,
        title: track.title.clone().unwrap_or_default(),
        cover_url_high,
        duration: track.duration.unwrap_or_default() / 1000,
        url: track.permalink_url.clone(),
        date_added,
        release_date: first_non_empty(&[
            &track.release_date,
            &track.display_date,
            &track.created_at,
        ]),
        genres: track
            .genre
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(|g| vec![g.to_string()])
            .unwrap_or_default(),
        artists: artist.into_iter().collect(),
        song_type: SongType::Url,
    };

    Some(NormalizedTrack { song, selector_url })
}

/// 转换一个用户。
pub fn user_to_artist(user: &RawUser) -> Artist {
    let id = user
        .urn
        .as_deref()
        .and_then(|urn| urn.strip_prefix(USER_URN_PREFIX))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| user.id.to_string());

    let name = user
        .full_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(&user.username)
        .to_string();

    let mut extra_info = HashMap::new();
    extra_info.insert(
        EXTENSION_NAMESPACE.to_string(),
        json!({
            "user_id": user.id.to_string(),
            "permalink_url": user.permalink_url,
        }),
    );

    Artist {
        id,
        name,
        cover_url: user.avatar_url.clone(),
        extra_info: Some(extra_info),
    }
}

/// 转换一个歌单。歌单自身没有封面时，使用第一首带封面的歌曲的封面。
pub fn playlist_to_playlist(playlist: &RawPlaylist) -> Playlist {
    let cover_url = playlist.artwork_url.clone().or_else(|| {
        playlist
            .tracks
            .iter()
            .find_map(|t| t.artwork_url.clone())
    });

    Playlist {
        id: playlist.id.to_string(),
        name: playlist.title.clone(),
        description: playlist.description.clone().filter(|d| !d.is_empty()),
        cover_url,
    }
}

/// 把封面地址换成 500x500 的尺寸。
pub fn high_res_artwork(url: &str) -> String {
    url.replace("-large.", "-t500x500.")
}

fn first_non_empty(candidates: &[&Option<String>]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|c| c.as_deref())
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

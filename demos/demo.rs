//! 用于演示 `soundcloud-helper` 库的核心功能。
//!
//! ## 如何运行
//!
//! ```bash
//! cargo run --package soundcloud_helper_rs --example demo -- "搜索关键词"
//! ```

use std::io::{self, Write};

use soundcloud_helper_rs::{ResolvedEntity, Song, SoundClient, error::Result};

use tracing::{Level, error, info};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("正在初始化...");
    let client = SoundClient::new_default().await?;
    info!("使用的 client_id: {}", client.client_id());

    let term = std::env::args().nth(1).unwrap_or_else(|| "hello".to_string());
    info!("准备搜索: '{}'", term);

    let songs = client.search(&term, false).await?;
    if songs.is_empty() {
        error!("没有找到可以播放的歌曲，程序退出。");
        return Ok(());
    }

    let chosen_index = prompt_user_for_selection(&songs)?;
    let selected = &songs[chosen_index];
    info!("选择了 '{}'，正在获取播放地址...", selected.title);

    match client.get_playback_details(selected).await? {
        Some(details) => {
            info!("时长: {} 秒", details.duration);
            info!("播放地址: {}", details.url);
        }
        None => error!("这首歌无法播放。"),
    }

    if let Some(page_url) = &selected.url {
        info!("正在解析歌曲页面 {}...", page_url);
        match client.resolve_url(page_url, false).await? {
            Some(ResolvedEntity::Song(song)) => info!("解析为歌曲: {}", song.title),
            Some(ResolvedEntity::Playlist { playlist, songs }) => {
                info!("解析为歌单 '{}'，共 {} 首歌曲。", playlist.name, songs.len())
            }
            None => info!("无法解析该链接。"),
        }
    }

    if let Some(artist) = selected.artists.first() {
        info!("正在获取 '{}' 的歌曲...", artist.name);
        let artist_songs = client.get_artist_songs(&artist.id, false).await?;
        for song in artist_songs.iter().take(5) {
            info!("  - {}", song.title);
        }
    }

    Ok(())
}

fn prompt_user_for_selection(songs: &[Song]) -> Result<usize> {
    println!("\n找到以下歌曲：");
    for (index, song) in songs.iter().enumerate() {
        let artists = song
            .artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "  [{}] {} - {} ({} 秒)",
            index + 1,
            song.title,
            artists,
            song.duration
        );
    }

    loop {
        print!("\n请输入序号 (1-{}): ", songs.len());
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        match input.trim().parse::<usize>() {
            Ok(n) if (1..=songs.len()).contains(&n) => return Ok(n - 1),
            _ => println!("无效的输入，请重试。"),
        }
    }
}

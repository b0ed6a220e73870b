//! 负责处理应用的持久化配置。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::info;

const APP_DIR_NAME: &str = "soundcloud-helper";
const SOUNDCLOUD_CONFIG_FILE: &str = "soundcloud_config.json";
const CACHE_FILE_NAME: &str = "soundcloud.cache";

/// SoundCloud 的配置项。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SoundCloudConfig {
    /// 缓存的 SoundCloud client_id。
    pub client_id: String,
}

/// 获取应用配置目录下指定文件的完整路径。
///
/// # 参数
/// * `filename` - 目标配置文件的名称，例如 "soundcloud_config.json"。
pub(crate) fn get_config_file_path(filename: &str) -> Result<PathBuf, std::io::Error> {
    if let Some(mut config_dir) = dirs::config_dir() {
        config_dir.push(APP_DIR_NAME);
        fs::create_dir_all(&config_dir)?;
        config_dir.push(filename);
        Ok(config_dir)
    } else {
        Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "无法找到用户配置目录",
        ))
    }
}

/// 默认的响应缓存文件路径，位于用户缓存目录下。
pub fn default_cache_path() -> Result<PathBuf, std::io::Error> {
    let cache_dir = dirs::cache_dir().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "无法找到用户缓存目录")
    })?;
    Ok(cache_dir.join(APP_DIR_NAME).join(CACHE_FILE_NAME))
}

/// 从文件加载 SoundCloud 的配置。
pub fn load_soundcloud_config() -> Result<SoundCloudConfig, Box<dyn std::error::Error>> {
    let config_path = get_config_file_path(SOUNDCLOUD_CONFIG_FILE)?;
    let content = fs::read_to_string(config_path)?;
    let config: SoundCloudConfig = serde_json::from_str(&content)?;
    info!("已从缓存加载 SoundCloud client_id。");
    Ok(config)
}

/// 将 SoundCloud 的配置实例序列化为 JSON 并保存到文件。
pub fn save_soundcloud_config(config: &SoundCloudConfig) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = get_config_file_path(SOUNDCLOUD_CONFIG_FILE)?;
    let content = serde_json::to_string_pretty(config)?;
    fs::write(config_path, content)?;
    info!("已将 SoundCloud client_id 保存到本地。");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cache_path_is_namespaced() {
        if let Ok(path) = default_cache_path() {
            assert!(path.ends_with("soundcloud-helper/soundcloud.cache"));
        }
    }
}

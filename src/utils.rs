use crate::error::{DnsError, Result};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tracing::info;

/// 备份文件 (如果有)
/// 文件名格式: resolv.conf -> resolv.conf.bak.TIMESTAMP
pub async fn backup_file(path: &Path) -> Result<Option<PathBuf>> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        return Ok(None);
    }

    let timestamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis();
    let file_name = path.file_name().unwrap_or_default().to_string_lossy();
    let backup_path = path.with_file_name(format!("{}.bak.{}", file_name, timestamp));

    fs::copy(path, &backup_path).await?;
    info!(?backup_path, "backup created");
    Ok(Some(backup_path))
}

/// 恢复到最近的备份
pub async fn restore_latest_backup(path: &Path) -> Result<PathBuf> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name().unwrap_or_default().to_string_lossy();
    let prefix = format!("{}.bak.", file_name);

    if !fs::try_exists(parent).await.unwrap_or(false) {
        return Err(DnsError::Custom(format!("Directory not found: {:?}", parent)));
    }

    let mut entries = fs::read_dir(parent).await?;
    let mut latest: Option<(u128, PathBuf)> = None;

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        // 按时间戳数值比较，而不是字符串顺序
        let stamp = match name.strip_prefix(&prefix).and_then(|s| s.parse::<u128>().ok()) {
            Some(stamp) => stamp,
            None => continue,
        };
        if latest.as_ref().map_or(true, |(best, _)| stamp > *best) {
            latest = Some((stamp, entry.path()));
        }
    }

    let (_, latest) = latest.ok_or_else(|| DnsError::Custom("No backup files found.".to_string()))?;

    info!(?latest, "restoring from backup");
    fs::copy(&latest, path).await?;
    Ok(latest)
}

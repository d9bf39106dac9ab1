use crate::error::Result;
use crate::traits::ResolverManager;
use crate::utils;
use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;
use tokio::fs;
use tracing::info;

/// 通过重写 /etc/resolv.conf 修改 DNS
pub struct ResolvConfManager {
    custom_path: Option<PathBuf>,
}

impl ResolvConfManager {
    pub fn new() -> Self {
        Self { custom_path: None }
    }

    #[cfg(test)]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            custom_path: Some(path),
        }
    }
}

// 标记由 dnspick 写入的文件，再次 apply 时不覆盖最初的备份
const MANAGED_MARKER: &str = "# Managed by dnspick";

/// Replaces every `nameserver` line with a single one for `address`, placed
/// where the first nameserver line was and preceded by the marker line.
/// Other lines are kept as-is.
fn rewrite_nameservers(content: &str, address: &str) -> String {
    let new_line = format!("nameserver {}", address);
    let mut lines: Vec<&str> = Vec::new();
    let mut inserted = false;

    for line in content.lines() {
        if line.trim() == MANAGED_MARKER {
            continue;
        }
        if is_nameserver_line(line) {
            if !inserted {
                lines.push(MANAGED_MARKER);
                lines.push(&new_line);
                inserted = true;
            }
            continue;
        }
        lines.push(line);
    }

    if !inserted {
        lines.push(MANAGED_MARKER);
        lines.push(&new_line);
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn is_managed(content: &str) -> bool {
    content.lines().any(|l| l.trim() == MANAGED_MARKER)
}

fn is_nameserver_line(line: &str) -> bool {
    let mut tokens = line.split_whitespace();
    tokens.next() == Some("nameserver")
}

#[async_trait]
impl ResolverManager for ResolvConfManager {
    fn name(&self) -> &'static str {
        "linux"
    }

    fn requires_sudo(&self) -> bool {
        true
    }

    fn config_path(&self) -> PathBuf {
        if let Some(ref path) = self.custom_path {
            return path.clone();
        }
        PathBuf::from("/etc/resolv.conf")
    }

    async fn current_servers(&self) -> Result<Vec<String>> {
        let path = self.config_path();
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path).await?;
        let re = Regex::new(r"(?m)^\s*nameserver\s+(\S+)")?;

        Ok(re
            .captures_iter(&content)
            .map(|caps| caps[1].to_string())
            .collect())
    }

    async fn apply(&self, address: &str) -> Result<()> {
        let path = self.config_path();

        let content = if fs::try_exists(&path).await.unwrap_or(false) {
            fs::read_to_string(&path).await?
        } else {
            String::new()
        };

        // 只备份用户原来的文件；已经由我们写过的文件不再备份，restore 才能回到最初状态
        if !content.is_empty() && !is_managed(&content) {
            utils::backup_file(&path).await?;
        }

        fs::write(&path, rewrite_nameservers(&content, address)).await?;
        info!(?path, address, "resolv.conf updated");
        Ok(())
    }

    async fn restore(&self) -> Result<()> {
        utils::restore_latest_backup(&self.config_path()).await?;
        Ok(())
    }
}

pub mod linux;
pub mod macos;
pub mod windows;

use crate::error::{DnsError, Result};
use crate::traits::ResolverManager;
use std::net::IpAddr;
use tokio::process::Command;
use tracing::trace;

pub const SUPPORTED_PLATFORMS: &[&str] = &["linux", "windows", "macos"];

/// 根据操作系统选择修改 DNS 的实现 (通常传入 std::env::consts::OS)
pub fn get_manager(os: &str) -> Result<Box<dyn ResolverManager>> {
    match os.to_lowercase().as_str() {
        "linux" => Ok(Box::new(linux::ResolvConfManager::new())),
        "windows" => Ok(Box::new(windows::NetshManager::new())),
        "macos" => Ok(Box::new(macos::NetworkSetupManager::new())),
        _ => Err(DnsError::Unsupported(format!(
            "Cannot change DNS settings on '{}'. Supported: {}",
            os,
            SUPPORTED_PLATFORMS.join(", ")
        ))),
    }
}

/// 执行外部命令，成功时返回 stdout
pub(crate) async fn run_command(program: &str, args: &[&str]) -> Result<String> {
    trace!(program, ?args, "running command");
    let output = Command::new(program).args(args).output().await?;

    if !output.status.success() {
        return Err(DnsError::Custom(format!(
            "'{} {}' failed: {}",
            program,
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// 从命令输出中提取所有 IP 地址 (去重，保持出现顺序)
pub(crate) fn extract_addresses(output: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for token in output.split(|c: char| c.is_whitespace() || c == ',') {
        let token = token.trim();
        if token.parse::<IpAddr>().is_ok() && !found.iter().any(|f| f == token) {
            found.push(token.to_string());
        }
    }
    found
}

use super::{extract_addresses, run_command};
use crate::error::{DnsError, Result};
use crate::traits::ResolverManager;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{info, warn};

pub struct NetworkSetupManager;

impl NetworkSetupManager {
    pub fn new() -> Self {
        Self
    }

    async fn services(&self) -> Result<Vec<String>> {
        let output = run_command("networksetup", &["-listallnetworkservices"]).await?;
        Ok(parse_services(&output))
    }
}

/// 第一行是说明文字，带 `*` 前缀的服务已禁用
fn parse_services(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('*'))
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl ResolverManager for NetworkSetupManager {
    fn name(&self) -> &'static str {
        "macos"
    }

    fn requires_sudo(&self) -> bool {
        true
    }

    fn config_path(&self) -> PathBuf {
        PathBuf::from("/Library/Preferences/SystemConfiguration/preferences.plist")
    }

    async fn current_servers(&self) -> Result<Vec<String>> {
        let mut servers = Vec::new();
        for service in self.services().await.unwrap_or_default() {
            // "There aren't any DNS Servers set on Wi-Fi." 不含地址，会被忽略
            if let Ok(output) = run_command("networksetup", &["-getdnsservers", &service]).await {
                for addr in extract_addresses(&output) {
                    if !servers.contains(&addr) {
                        servers.push(addr);
                    }
                }
            }
        }
        Ok(servers)
    }

    async fn apply(&self, address: &str) -> Result<()> {
        let mut changed = 0;
        for service in self.services().await? {
            match run_command("networksetup", &["-setdnsservers", &service, address]).await {
                Ok(_) => {
                    info!(service = %service, address, "DNS changed");
                    changed += 1;
                }
                Err(e) => warn!(service = %service, error = %e, "failed to change DNS"),
            }
        }

        if changed == 0 {
            return Err(DnsError::Custom(
                "Failed to change DNS settings on any network service".to_string(),
            ));
        }
        Ok(())
    }

    async fn restore(&self) -> Result<()> {
        // "empty" 清除手动设置，回到 DHCP 提供的 DNS
        for service in self.services().await? {
            run_command("networksetup", &["-setdnsservers", &service, "empty"]).await?;
        }
        Ok(())
    }
}

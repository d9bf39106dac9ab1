use super::{extract_addresses, run_command};
use crate::error::{DnsError, Result};
use crate::traits::ResolverManager;
use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;
use tracing::{info, warn};

pub struct NetshManager;

impl NetshManager {
    pub fn new() -> Self {
        Self
    }

    async fn connected_interfaces(&self) -> Result<Vec<String>> {
        let output = run_command("netsh", &["interface", "show", "interface"]).await?;
        parse_connected_interfaces(&output)
    }
}

/// `netsh interface show interface` 的输出:
///
/// ```text
/// Admin State    State          Type             Interface Name
/// -------------------------------------------------------------------------
/// Enabled        Connected      Dedicated        Wi-Fi 2
/// ```
///
/// 接口名称可能包含空格，因此取第三列之后的全部内容
fn parse_connected_interfaces(output: &str) -> Result<Vec<String>> {
    let re = Regex::new(r"(?m)^\s*\S+\s+Connected\s+\S+\s+(.+?)\s*$")?;
    Ok(re
        .captures_iter(output)
        .map(|caps| caps[1].to_string())
        .collect())
}

#[async_trait]
impl ResolverManager for NetshManager {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn requires_sudo(&self) -> bool {
        true
    }

    fn config_path(&self) -> PathBuf {
        // DNS 由 netsh 管理，没有单独的配置文件
        PathBuf::from("netsh interface ip")
    }

    async fn current_servers(&self) -> Result<Vec<String>> {
        match run_command("netsh", &["interface", "ip", "show", "dnsservers"]).await {
            Ok(output) => Ok(extract_addresses(&output)),
            Err(_) => Ok(Vec::new()),
        }
    }

    async fn apply(&self, address: &str) -> Result<()> {
        let interfaces = self.connected_interfaces().await?;
        let mut changed = 0;

        for interface in &interfaces {
            let name_arg = format!("name={}", interface);
            let res = run_command(
                "netsh",
                &["interface", "ip", "set", "dns", &name_arg, "static", address, "primary"],
            )
            .await;

            match res {
                Ok(_) => {
                    info!(interface = %interface, address, "DNS changed");
                    changed += 1;
                }
                Err(e) => warn!(interface = %interface, error = %e, "failed to change DNS"),
            }
        }

        if changed == 0 {
            return Err(DnsError::Custom(
                "Failed to change DNS settings on any connected interface".to_string(),
            ));
        }
        Ok(())
    }

    async fn restore(&self) -> Result<()> {
        // 恢复为 DHCP 自动获取
        for interface in self.connected_interfaces().await? {
            let name_arg = format!("name={}", interface);
            run_command("netsh", &["interface", "ip", "set", "dns", &name_arg, "dhcp"]).await?;
            info!(interface = %interface, "DNS reset to DHCP");
        }
        Ok(())
    }
}

use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tracing::trace;

pub const DNS_PORT: u16 = 53;

// 默认超时 2 秒
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// One bounded connectivity/latency check against a single server.
///
/// `None` means no answer within `timeout`, whatever the cause.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, address: &str, timeout: Duration) -> Option<Duration>;
}

/// 通过 TCP 53 端口建立连接来测速
#[derive(Debug, Clone, Default)]
pub struct TcpProber {
    port: Option<u16>,
}

impl TcpProber {
    pub fn new() -> Self {
        Self { port: None }
    }

    #[cfg(test)]
    pub fn with_port(port: u16) -> Self {
        Self { port: Some(port) }
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, address: &str, timeout: Duration) -> Option<Duration> {
        probe(address, self.port.unwrap_or(DNS_PORT), timeout).await
    }
}

/// 单个服务器测速逻辑
///
/// 地址必须是 IP 字面量，不做域名解析；解析失败按超时处理。
pub async fn probe(address: &str, port: u16, timeout: Duration) -> Option<Duration> {
    let ip: IpAddr = match address.parse() {
        Ok(ip) => ip,
        Err(_) => {
            trace!(address, "not an IP literal");
            return None;
        }
    };

    let start = Instant::now();
    match tokio::time::timeout(timeout, TcpStream::connect(SocketAddr::new(ip, port))).await {
        Ok(Ok(stream)) => {
            let elapsed = start.elapsed();
            // 连接在这里关闭
            drop(stream);
            trace!(address, ?elapsed, "connected");
            Some(elapsed)
        }
        Ok(Err(e)) => {
            trace!(address, error = %e, "connect failed");
            None
        }
        Err(_) => {
            trace!(address, ?timeout, "connect timed out");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_probe_local_listener() -> std::io::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();

        let prober = TcpProber::with_port(port);
        let latency = prober.probe("127.0.0.1", DEFAULT_TIMEOUT).await;

        assert!(latency.is_some());
        assert!(latency.unwrap() < DEFAULT_TIMEOUT);
        Ok(())
    }

    #[tokio::test]
    async fn test_probe_refused_is_timeout() -> std::io::Result<()> {
        // 绑定后立即释放端口，连接会被拒绝
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await?;
            listener.local_addr()?.port()
        };

        let prober = TcpProber::with_port(port);
        assert_eq!(prober.probe("127.0.0.1", Duration::from_millis(500)).await, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_probe_malformed_address() {
        let prober = TcpProber::new();
        assert_eq!(prober.probe("not-an-ip", DEFAULT_TIMEOUT).await, None);
        assert_eq!(prober.probe("dns.google", DEFAULT_TIMEOUT).await, None);
    }
}

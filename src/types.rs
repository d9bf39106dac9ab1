use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// DNS 服务器定义
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntry {
    pub name: String,    // 例如: "Google"
    pub address: String, // 例如: "8.8.8.8"
}

impl ServerEntry {
    pub fn new(name: &str, address: &str) -> Self {
        Self {
            name: name.to_string(),
            address: address.to_string(),
        }
    }
}

/// 单个服务器的测速结果
///
/// `latency` 为 `None` 即超时 (包括连接被拒、网络不可达等所有失败情况)。
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub entry: ServerEntry,
    pub latency: Option<Duration>,
}

impl ProbeOutcome {
    pub fn new(entry: ServerEntry, latency: Option<Duration>) -> Self {
        Self { entry, latency }
    }

    pub fn timed_out(&self) -> bool {
        self.latency.is_none()
    }

    /// Full-precision latency in fractional milliseconds.
    pub fn latency_ms(&self) -> Option<f64> {
        self.latency.map(|d| d.as_nanos() as f64 / 1_000_000.0)
    }

    /// Latency rounded to two decimals, half away from zero, e.g. `12.35 ms`.
    pub fn latency_display(&self) -> Option<String> {
        self.latency.map(|d| {
            // 以 0.01ms (10µs) 为单位做整数舍入，避免浮点误差
            let hundredths = (d.as_nanos() + 5_000) / 10_000;
            format!("{}.{:02} ms", hundredths / 100, hundredths % 100)
        })
    }
}

impl fmt::Display for ProbeOutcome {
    /// `<name> - <address> -> <value>`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self
            .latency_display()
            .unwrap_or_else(|| "Timeout".to_string());
        write!(f, "{} - {} -> {}", self.entry.name, self.entry.address, value)
    }
}

/// Snapshot of one completed analysis run.
///
/// Only the analyzer builds these. Outcomes keep the registry order of the
/// snapshot the run started from.
#[derive(Debug, Clone)]
pub struct ResultSet {
    outcomes: Vec<ProbeOutcome>,
    winner: Option<usize>,
}

impl ResultSet {
    pub(crate) fn from_outcomes(outcomes: Vec<ProbeOutcome>) -> Self {
        // 线性扫描，严格小于才替换：延迟相同时保留注册顺序靠前者
        let mut winner: Option<(usize, Duration)> = None;
        for (idx, outcome) in outcomes.iter().enumerate() {
            if let Some(latency) = outcome.latency {
                match winner {
                    Some((_, best)) if latency >= best => {}
                    _ => winner = Some((idx, latency)),
                }
            }
        }

        Self {
            outcomes,
            winner: winner.map(|(idx, _)| idx),
        }
    }

    pub fn outcomes(&self) -> &[ProbeOutcome] {
        &self.outcomes
    }

    pub fn winner(&self) -> Option<&ServerEntry> {
        self.winner_outcome().map(|o| &o.entry)
    }

    pub fn winner_outcome(&self) -> Option<&ProbeOutcome> {
        self.winner.map(|idx| &self.outcomes[idx])
    }

    pub fn fastest_latency(&self) -> Option<Duration> {
        self.winner_outcome().and_then(|o| o.latency)
    }

    /// True for every outcome tied at the minimum latency, not only the winner.
    pub fn is_fastest(&self, outcome: &ProbeOutcome) -> bool {
        match (outcome.latency, self.fastest_latency()) {
            (Some(latency), Some(best)) => latency == best,
            _ => false,
        }
    }

    /// Number of servers that answered within the timeout.
    pub fn responded(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.timed_out()).count()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

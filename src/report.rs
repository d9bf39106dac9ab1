use crate::analyzer::ProgressObserver;
use crate::types::{ProbeOutcome, ResultSet, ServerEntry};
use indicatif::{ProgressBar, ProgressStyle};

/// 终端进度条，作为 Analyzer 的进度观察者
pub struct BarObserver {
    pb: ProgressBar,
}

impl BarObserver {
    pub fn new(len: usize) -> Self {
        let pb = ProgressBar::new(len as u64);
        pb.set_style(
            ProgressStyle::with_template("[{bar:40.cyan/blue}] {percent}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("|| "),
        );
        pb.set_message("Testing...");
        Self { pb }
    }

    pub fn finish(&self) {
        self.pb.finish_with_message("Testing completed.");
    }
}

impl ProgressObserver for BarObserver {
    fn on_started(&self, entry: &ServerEntry) {
        self.pb.set_message(format!("Testing {} ({})...", entry.name, entry.address));
    }

    fn on_completed(&self, outcome: &ProbeOutcome) {
        let value = outcome
            .latency_display()
            .unwrap_or_else(|| "Timeout".to_string());
        self.pb.println(format!("→ {}: {}", outcome.entry.name, value));
        self.pb.inc(1);
    }
}

/// 结果表格，保持注册顺序；`*` 标记并列最快的所有服务器
pub fn render_table(result: &ResultSet) -> String {
    let mut out = format!("{:<2}{:<28} {:<18} LATENCY\n", "", "NAME", "ADDRESS");
    out.push_str(&"-".repeat(60));
    out.push('\n');

    if result.is_empty() {
        out.push_str("  (no servers to test)\n");
    }
    for outcome in result.outcomes() {
        let marker = if result.is_fastest(outcome) { "*" } else { "" };
        let value = outcome
            .latency_display()
            .unwrap_or_else(|| "Timeout".to_string());
        out.push_str(&format!(
            "{:<2}{:<28} {:<18} {}\n",
            marker, outcome.entry.name, outcome.entry.address, value
        ));
    }
    out
}

/// Recommendation line, compared against the system's current DNS when it
/// was part of the run.
pub fn recommendation(result: &ResultSet, current: &[String]) -> String {
    let best = match result.winner_outcome() {
        Some(best) => best,
        None => return "No DNS server responded.".to_string(),
    };
    let best_display = best.latency_display().unwrap_or_default();

    let current_res = result
        .outcomes()
        .iter()
        .find(|o| current.iter().any(|c| *c == o.entry.address));

    match current_res {
        Some(cur) if cur.entry == best.entry || cur.latency == best.latency => format!(
            "Recommendation: Your current DNS '{}' is already the fastest ({}).",
            cur.entry.name, best_display
        ),
        Some(cur) => match (cur.latency_ms(), best.latency_ms()) {
            (Some(cur_ms), Some(best_ms)) if best_ms > 0.0 => format!(
                "Recommendation: '{}' is {:.1}x faster than your current DNS '{}'.",
                best.entry.name,
                cur_ms / best_ms,
                cur.entry.name
            ),
            (None, _) => format!(
                "Recommendation: '{}' is significantly faster than your current DNS (Timeout).",
                best.entry.name
            ),
            _ => fastest_line(best, &best_display),
        },
        None => fastest_line(best, &best_display),
    }
}

fn fastest_line(best: &ProbeOutcome, display: &str) -> String {
    format!(
        "Recommendation: '{}' ({}) is the fastest at {}.",
        best.entry.name, best.entry.address, display
    )
}

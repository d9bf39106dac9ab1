use crate::probe::{Prober, TcpProber};
use crate::registry::Registry;
use crate::types::{ProbeOutcome, ResultSet, ServerEntry};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Receives live progress of a run.
///
/// `on_started` calls arrive in registry order. `on_completed` calls arrive
/// in whatever order the probes finish.
pub trait ProgressObserver: Send + Sync {
    fn on_started(&self, entry: &ServerEntry);
    fn on_completed(&self, outcome: &ProbeOutcome);
}

enum ProgressEvent {
    Started(ServerEntry),
    Completed(ProbeOutcome),
}

pub struct Analyzer {
    timeout: Duration,
    prober: Arc<dyn Prober>,
}

impl Analyzer {
    pub fn new(timeout: Duration) -> Self {
        Self::with_prober(timeout, Arc::new(TcpProber::new()))
    }

    pub fn with_prober(timeout: Duration, prober: Arc<dyn Prober>) -> Self {
        Self { timeout, prober }
    }

    /// 并发测试注册表中所有服务器的延迟
    ///
    /// 逻辑:
    /// 1. 在开始时对注册表做快照，之后的修改不影响本次运行
    /// 2. 为每个服务器生成一个任务 (tokio::spawn)
    /// 3. 等待所有任务完成 (join_all)，每个任务最长不超过 timeout
    /// 4. 按注册顺序组装 ResultSet 并选出最快者
    pub async fn run(&self, registry: &Registry, observer: Arc<dyn ProgressObserver>) -> ResultSet {
        let entries = registry.snapshot();
        debug!(servers = entries.len(), timeout = ?self.timeout, "starting analysis run");

        // 进度事件经由队列转交，观察者再慢也不会阻塞探测任务
        let (tx, mut rx) = mpsc::unbounded_channel();
        let relay = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    ProgressEvent::Started(entry) => observer.on_started(&entry),
                    ProgressEvent::Completed(outcome) => observer.on_completed(&outcome),
                }
            }
        });

        let mut tasks = Vec::with_capacity(entries.len());
        for entry in &entries {
            let _ = tx.send(ProgressEvent::Started(entry.clone()));

            let entry = entry.clone();
            let tx = tx.clone();
            let prober = self.prober.clone();
            let timeout = self.timeout;
            tasks.push(tokio::spawn(async move {
                let latency = tokio::time::timeout(timeout, prober.probe(&entry.address, timeout))
                    .await
                    .ok()
                    .flatten();
                let outcome = ProbeOutcome::new(entry, latency);
                let _ = tx.send(ProgressEvent::Completed(outcome.clone()));
                outcome
            }));
        }
        drop(tx);

        let joined = join_all(tasks).await;

        let outcomes: Vec<ProbeOutcome> = entries
            .into_iter()
            .zip(joined)
            .map(|(entry, res)| match res {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(server = %entry.name, error = %e, "probe task failed");
                    ProbeOutcome::new(entry, None)
                }
            })
            .collect();

        // 所有 Completed 事件送达后才返回
        if let Err(e) = relay.await {
            warn!(error = %e, "progress observer panicked");
        }

        let result = ResultSet::from_outcomes(outcomes);
        match result.winner_outcome() {
            Some(best) => info!(winner = %best.entry.name, latency = ?best.latency, "analysis complete"),
            None => info!(servers = result.len(), "analysis complete, no server responded"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::time::Instant;

    #[derive(Clone, Copy)]
    enum Reply {
        After(u64),
        Refused,
        Hang,
    }

    /// 按地址返回预设结果的假探测器
    struct FakeProber {
        replies: HashMap<String, Reply>,
    }

    impl FakeProber {
        fn new(replies: &[(&str, Reply)]) -> Arc<Self> {
            Arc::new(Self {
                replies: replies
                    .iter()
                    .map(|(addr, reply)| (addr.to_string(), *reply))
                    .collect(),
            })
        }
    }

    #[async_trait]
    impl Prober for FakeProber {
        async fn probe(&self, address: &str, _timeout: Duration) -> Option<Duration> {
            match self.replies.get(address).copied().unwrap_or(Reply::Refused) {
                Reply::After(ms) => {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    Some(Duration::from_millis(ms))
                }
                Reply::Refused => None,
                Reply::Hang => std::future::pending().await,
            }
        }
    }

    struct NoopObserver;

    impl ProgressObserver for NoopObserver {
        fn on_started(&self, _entry: &ServerEntry) {}
        fn on_completed(&self, _outcome: &ProbeOutcome) {}
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ProgressObserver for Recorder {
        fn on_started(&self, entry: &ServerEntry) {
            self.events.lock().push(format!("start:{}", entry.name));
        }

        fn on_completed(&self, outcome: &ProbeOutcome) {
            self.events.lock().push(format!("done:{}", outcome.entry.name));
        }
    }

    /// 每个事件都阻塞一段时间的观察者
    struct SlowObserver {
        delay: Duration,
    }

    impl ProgressObserver for SlowObserver {
        fn on_started(&self, _entry: &ServerEntry) {
            std::thread::sleep(self.delay);
        }

        fn on_completed(&self, _outcome: &ProbeOutcome) {
            std::thread::sleep(self.delay);
        }
    }

    fn registry(entries: &[(&str, &str)]) -> Registry {
        let registry = Registry::empty();
        for (name, address) in entries {
            registry.insert(name, address).unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn test_fastest_wins_and_order_is_kept() {
        let registry = registry(&[("A", "10.0.0.1"), ("B", "10.0.0.2"), ("C", "10.0.0.3")]);
        let prober = FakeProber::new(&[
            ("10.0.0.1", Reply::After(50)),
            ("10.0.0.2", Reply::After(30)),
            ("10.0.0.3", Reply::Hang),
        ]);
        let analyzer = Analyzer::with_prober(Duration::from_millis(300), prober);

        let result = analyzer.run(&registry, Arc::new(NoopObserver)).await;

        let names: Vec<_> = result.outcomes().iter().map(|o| o.entry.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(result.winner().map(|e| e.name.as_str()), Some("B"));
        assert!(result.outcomes()[2].timed_out());
        assert_eq!(result.outcomes()[0].latency, Some(Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn test_tie_broken_by_registry_order() {
        let registry = registry(&[("A", "10.0.0.1"), ("B", "10.0.0.2")]);
        let prober = FakeProber::new(&[("10.0.0.1", Reply::After(20)), ("10.0.0.2", Reply::After(20))]);
        let analyzer = Analyzer::with_prober(Duration::from_millis(500), prober);

        let result = analyzer.run(&registry, Arc::new(NoopObserver)).await;
        assert_eq!(result.winner().map(|e| e.name.as_str()), Some("A"));
    }

    #[tokio::test]
    async fn test_all_defaults_time_out() {
        let prober = FakeProber::new(&[]);
        let analyzer = Analyzer::with_prober(Duration::from_millis(100), prober);

        let result = analyzer.run(&Registry::new(), Arc::new(NoopObserver)).await;
        assert_eq!(result.len(), 4);
        assert!(result.outcomes().iter().all(|o| o.timed_out()));
        assert!(result.winner().is_none());
    }

    #[tokio::test]
    async fn test_empty_registry() {
        let analyzer = Analyzer::with_prober(Duration::from_millis(100), FakeProber::new(&[]));
        let result = analyzer.run(&Registry::empty(), Arc::new(NoopObserver)).await;
        assert!(result.is_empty());
        assert!(result.winner().is_none());
    }

    #[tokio::test]
    async fn test_probes_run_concurrently() {
        let registry = Registry::empty();
        let mut replies = Vec::new();
        for i in 0..10 {
            let address = format!("10.0.1.{}", i);
            registry.add(&address).unwrap();
            replies.push(address);
        }
        let replies: Vec<_> = replies.iter().map(|a| (a.as_str(), Reply::Hang)).collect();
        let analyzer = Analyzer::with_prober(Duration::from_millis(200), FakeProber::new(&replies));

        let start = Instant::now();
        let result = analyzer.run(&registry, Arc::new(NoopObserver)).await;

        // 串行需要 10 × 200ms
        assert!(start.elapsed() < Duration::from_millis(1500));
        assert_eq!(result.len(), 10);
        assert!(result.winner().is_none());
    }

    #[tokio::test]
    async fn test_observer_receives_all_events() {
        let registry = registry(&[("A", "10.0.0.1"), ("B", "10.0.0.2"), ("C", "10.0.0.3")]);
        let prober = FakeProber::new(&[
            ("10.0.0.1", Reply::After(60)),
            ("10.0.0.2", Reply::After(10)),
            ("10.0.0.3", Reply::Refused),
        ]);
        let analyzer = Analyzer::with_prober(Duration::from_millis(500), prober);
        let recorder = Arc::new(Recorder::default());

        analyzer.run(&registry, recorder.clone()).await;

        let events = recorder.events.lock().clone();
        let started: Vec<_> = events.iter().filter(|e| e.starts_with("start:")).cloned().collect();
        assert_eq!(started, vec!["start:A", "start:B", "start:C"]);
        assert_eq!(events.iter().filter(|e| e.starts_with("done:")).count(), 3);
        // 每个服务器的 start 必须在其 done 之前
        for name in ["A", "B", "C"] {
            let s = events.iter().position(|e| *e == format!("start:{}", name)).unwrap();
            let d = events.iter().position(|e| *e == format!("done:{}", name)).unwrap();
            assert!(s < d);
        }
    }

    #[tokio::test]
    async fn test_run_ignores_later_registry_changes() {
        let registry = Arc::new(registry(&[("A", "10.0.0.1")]));
        let prober = FakeProber::new(&[("10.0.0.1", Reply::After(50))]);
        let analyzer = Analyzer::with_prober(Duration::from_millis(500), prober);

        let run = {
            let registry = registry.clone();
            tokio::spawn(async move { analyzer.run(&registry, Arc::new(NoopObserver)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        registry.add("10.0.0.9").unwrap();

        let result = run.await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_slow_observer_does_not_stall_probes() -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();

        let registry = registry(&[
            ("A", "127.0.0.1"),
            ("B", "127.0.0.1"),
            ("C", "127.0.0.1"),
            ("D", "127.0.0.1"),
        ]);
        let timeout = Duration::from_millis(500);
        let analyzer = Analyzer::with_prober(timeout, Arc::new(TcpProber::with_port(port)));

        // 8 个事件 × 150ms 远超单次超时，探测仍必须按时完成
        let observer = Arc::new(SlowObserver {
            delay: Duration::from_millis(150),
        });
        let result = analyzer.run(&registry, observer).await;

        assert_eq!(result.len(), 4);
        for outcome in result.outcomes() {
            let latency = outcome.latency.expect("local listener should accept");
            assert!(latency < timeout);
        }
        assert_eq!(result.winner().map(|e| e.address.as_str()), Some("127.0.0.1"));
        drop(listener);
        Ok(())
    }
}

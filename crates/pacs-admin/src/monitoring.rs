//! 存活探针
//!
//! 周期性检查四个外部依赖的可达性，每轮结果作为一份完整快照整体替换旧快照。

use chrono::Utc;
use pacs_core::{HealthCheck, StatusBoard, StatusSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 被探测的依赖
#[derive(Clone)]
pub struct ProbeTargets {
    pub hospital_db: Arc<dyn HealthCheck>,
    pub ledger_db: Arc<dyn HealthCheck>,
    pub archive: Arc<dyn HealthCheck>,
    pub viewer: Arc<dyn HealthCheck>,
}

/// 存活探针
pub struct LivenessProbe {
    targets: ProbeTargets,
    board: StatusBoard,
    interval: Duration,
    timeout: Duration,
}

impl LivenessProbe {
    pub fn new(targets: ProbeTargets, board: StatusBoard, interval: Duration, timeout: Duration) -> Self {
        Self {
            targets,
            board,
            interval,
            timeout,
        }
    }

    pub async fn run(self) {
        info!("Liveness probe started (interval {:?}, timeout {:?})", self.interval, self.timeout);
        let mut interval = tokio::time::interval(self.interval);

        loop {
            interval.tick().await;
            self.probe_once().await;
        }
    }

    /// 执行一轮检查并发布快照
    pub async fn probe_once(&self) -> StatusSnapshot {
        let (hospital_db, ledger_db, archive, viewer) = tokio::join!(
            self.check(self.targets.hospital_db.as_ref()),
            self.check(self.targets.ledger_db.as_ref()),
            self.check(self.targets.archive.as_ref()),
            self.check(self.targets.viewer.as_ref()),
        );

        let snapshot = StatusSnapshot {
            hospital_db,
            ledger_db,
            archive,
            viewer,
            checked_at: Some(Utc::now()),
        };

        let previous = self.board.current().await;
        if previous.checked_at.is_some() && previous.all_reachable() != snapshot.all_reachable() {
            if snapshot.all_reachable() {
                info!("All dependencies reachable again");
            } else {
                warn!(
                    "Dependency unreachable: hospital_db={} ledger_db={} archive={} viewer={}",
                    hospital_db, ledger_db, archive, viewer
                );
            }
        }

        self.board.publish(snapshot.clone()).await;
        snapshot
    }

    async fn check(&self, target: &dyn HealthCheck) -> bool {
        match tokio::time::timeout(self.timeout, target.is_reachable()).await {
            Ok(reachable) => reachable,
            Err(_) => {
                debug!("Health check {} timed out after {:?}", target.name(), self.timeout);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Fixed(bool);

    #[async_trait]
    impl HealthCheck for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn is_reachable(&self) -> bool {
            self.0
        }
    }

    struct Stuck;

    #[async_trait]
    impl HealthCheck for Stuck {
        fn name(&self) -> &str {
            "stuck"
        }

        async fn is_reachable(&self) -> bool {
            tokio::time::sleep(Duration::from_secs(30)).await;
            true
        }
    }

    #[tokio::test]
    async fn test_probe_publishes_whole_snapshot() {
        let board = StatusBoard::new();
        let probe = LivenessProbe::new(
            ProbeTargets {
                hospital_db: Arc::new(Fixed(true)),
                ledger_db: Arc::new(Fixed(true)),
                archive: Arc::new(Fixed(false)),
                viewer: Arc::new(Stuck),
            },
            board.clone(),
            Duration::from_secs(10),
            Duration::from_millis(50),
        );

        let snapshot = probe.probe_once().await;
        assert!(snapshot.hospital_db);
        assert!(snapshot.ledger_db);
        assert!(!snapshot.archive);
        assert!(!snapshot.viewer);
        assert!(snapshot.checked_at.is_some());
        assert_eq!(board.current().await, snapshot);
    }
}

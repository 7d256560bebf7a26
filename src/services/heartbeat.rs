//! Machine liveness view
//!
//! Heartbeat-derived connection state, computed on demand — no background
//! loop: a machine counts as live when its last heartbeat is within the
//! 5-minute window at the moment of the query.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::MachineStatus;
use crate::shared::types::DomainResult;
use crate::storage::Storage;

/// Liveness snapshot for one machine
#[derive(Debug, Clone)]
pub struct MachineLiveness {
    pub machine_id: String,
    pub machine_code: String,
    pub site_id: String,
    pub status: MachineStatus,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub seconds_since_heartbeat: Option<i64>,
    pub is_live: bool,
}

/// Fleet-wide connection statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionStats {
    pub total: usize,
    pub live: usize,
    pub stale: usize,
    pub never_seen: usize,
}

/// On-demand liveness/statistics queries over the machine fleet
pub struct HeartbeatService {
    storage: Arc<dyn Storage>,
}

impl HeartbeatService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn statuses(&self, site_id: Option<&str>) -> DomainResult<Vec<MachineLiveness>> {
        let machines = match site_id {
            Some(site_id) => self.storage.list_machines_by_site(site_id).await?,
            None => self.storage.list_machines().await?,
        };
        let now = Utc::now();

        Ok(machines
            .into_iter()
            .map(|m| {
                let seconds_since = m
                    .integration
                    .last_heartbeat
                    .map(|hb| (now - hb).num_seconds());
                MachineLiveness {
                    is_live: m.is_live(now),
                    machine_id: m.id,
                    machine_code: m.code,
                    site_id: m.site_id,
                    status: m.status,
                    last_heartbeat: m.integration.last_heartbeat,
                    seconds_since_heartbeat: seconds_since,
                }
            })
            .collect())
    }

    pub async fn connection_stats(&self) -> DomainResult<ConnectionStats> {
        let machines = self.storage.list_machines().await?;
        let now = Utc::now();

        let mut stats = ConnectionStats {
            total: machines.len(),
            ..Default::default()
        };
        for machine in &machines {
            match machine.integration.last_heartbeat {
                Some(_) if machine.is_live(now) => stats.live += 1,
                Some(_) => stats.stale += 1,
                None => stats.never_seen += 1,
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Machine, MachineKind, VehicleClass};
    use crate::storage::InMemoryStorage;
    use chrono::Duration;

    #[tokio::test]
    async fn stats_split_live_stale_and_silent() {
        let storage = Arc::new(InMemoryStorage::new());
        let now = Utc::now();

        let mut live = Machine::new("m1", "s1", "M001", MachineKind::Rotary, VehicleClass::TwoWheeler, 2);
        live.heartbeat(None, now);
        let mut stale = Machine::new("m2", "s1", "M002", MachineKind::Rotary, VehicleClass::TwoWheeler, 2);
        stale.heartbeat(None, now - Duration::minutes(20));
        let silent = Machine::new("m3", "s1", "M003", MachineKind::Rotary, VehicleClass::TwoWheeler, 2);

        storage.insert_machine(live).await.unwrap();
        storage.insert_machine(stale).await.unwrap();
        storage.insert_machine(silent).await.unwrap();

        let service = HeartbeatService::new(storage);
        let stats = service.connection_stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.live, 1);
        assert_eq!(stats.stale, 1);
        assert_eq!(stats.never_seen, 1);

        let statuses = service.statuses(Some("s1")).await.unwrap();
        assert_eq!(statuses.len(), 3);
        let m1 = statuses.iter().find(|s| s.machine_code == "M001").unwrap();
        assert!(m1.is_live);
        assert!(m1.seconds_since_heartbeat.unwrap() < 60);
    }
}

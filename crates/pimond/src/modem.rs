//! Modem status over qmicli.
//!
//! Each query runs invoke → normalize → parse and is cached per query with a
//! TTL. Accessors read through the cache and apply the pure functions from
//! [`crate::fields`].

use pimon_common::{parse_structured, render, Mapping, Normalizer};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cache::CacheEntry;
use crate::config::ModemConfig;
use crate::error::ModemError;
use crate::fields;
use crate::invoker::{split_command, CommandRunner};

/// qmicli diagnostic queries the agent knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QmiQuery {
    ServingSystem,
    PacketStatistics,
    SignalInfo,
}

impl QmiQuery {
    pub const ALL: [QmiQuery; 3] = [Self::ServingSystem, Self::PacketStatistics, Self::SignalInfo];

    /// qmicli flag selecting this query
    pub fn flag(&self) -> &'static str {
        match self {
            Self::ServingSystem => "--nas-get-serving-system",
            Self::PacketStatistics => "--wds-get-packet-statistics",
            Self::SignalInfo => "--nas-get-signal-info",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServingSystem => "serving-system",
            Self::PacketStatistics => "packet-statistics",
            Self::SignalInfo => "signal-info",
        }
    }
}

impl fmt::Display for QmiQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QmiQuery {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|q| q.as_str()).collect();
                format!("unknown query '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

/// Runs one qmicli query end to end.
pub struct QmiClient {
    runner: Arc<dyn CommandRunner>,
    base_command: Vec<String>,
    normalizer: Normalizer,
}

impl QmiClient {
    pub fn new(runner: Arc<dyn CommandRunner>, config: &ModemConfig) -> Self {
        let mut base_command = Vec::new();
        if !config.privilege_wrapper.is_empty() {
            base_command.push(config.privilege_wrapper.clone());
        }
        base_command.extend([
            config.qmicli_path.clone(),
            "-d".to_string(),
            config.device.clone(),
            "-p".to_string(),
        ]);

        Self {
            runner,
            base_command,
            normalizer: Normalizer::for_device(&config.device),
        }
    }

    /// Full argv for `query`, program first.
    pub fn command_for(&self, query: QmiQuery) -> Vec<String> {
        let mut command = self.base_command.clone();
        command.push(query.flag().to_string());
        command
    }

    pub async fn query(&self, query: QmiQuery) -> Result<Mapping, ModemError> {
        let command = self.command_for(query);
        let (program, args) = split_command(&command)?;

        let raw = self.runner.run(program, args).await?;
        let normalized = self.normalizer.normalize(&raw);
        let parsed = parse_structured(&normalized)?;

        debug!("{} parsed:\n{}", query, render(&parsed));
        Ok(parsed)
    }
}

/// Cached modem state with one TTL entry per query.
pub struct ModemStatus {
    client: QmiClient,
    serving_system: CacheEntry<Arc<Mapping>>,
    packet_stats: CacheEntry<Arc<Mapping>>,
    signal_info: CacheEntry<Arc<Mapping>>,
}

impl ModemStatus {
    pub fn new(client: QmiClient, ttl: Duration) -> Self {
        Self {
            client,
            serving_system: CacheEntry::new(QmiQuery::ServingSystem.as_str(), ttl),
            packet_stats: CacheEntry::new(QmiQuery::PacketStatistics.as_str(), ttl),
            signal_info: CacheEntry::new(QmiQuery::SignalInfo.as_str(), ttl),
        }
    }

    fn entry(&self, query: QmiQuery) -> &CacheEntry<Arc<Mapping>> {
        match query {
            QmiQuery::ServingSystem => &self.serving_system,
            QmiQuery::PacketStatistics => &self.packet_stats,
            QmiQuery::SignalInfo => &self.signal_info,
        }
    }

    /// Cached result for `query`, refreshed first when empty or stale.
    pub async fn get(&self, query: QmiQuery) -> Option<Arc<Mapping>> {
        self.entry(query)
            .get(|| async { self.client.query(query).await.map(Arc::new) })
            .await
    }

    pub async fn serving_system(&self) -> Option<Arc<Mapping>> {
        self.get(QmiQuery::ServingSystem).await
    }

    pub async fn packet_stats(&self) -> Option<Arc<Mapping>> {
        self.get(QmiQuery::PacketStatistics).await
    }

    pub async fn signal_info(&self) -> Option<Arc<Mapping>> {
        self.get(QmiQuery::SignalInfo).await
    }

    pub async fn connection_type(&self) -> Option<String> {
        fields::connection_type(&*self.signal_info().await?)
    }

    pub async fn connection_data(&self) -> Option<Mapping> {
        fields::connection_data(&*self.signal_info().await?).cloned()
    }

    pub async fn roaming(&self) -> Option<String> {
        fields::roaming(&*self.serving_system().await?)
    }

    pub async fn location_area_code(&self) -> Option<String> {
        fields::location_area_code(&*self.serving_system().await?)
    }

    pub async fn cell_id(&self) -> Option<String> {
        fields::cell_id(&*self.serving_system().await?)
    }

    pub async fn rssi(&self) -> Option<String> {
        fields::rssi(&*self.signal_info().await?)
    }

    pub async fn snr(&self) -> Option<String> {
        fields::snr(&*self.signal_info().await?)
    }

    pub async fn rsrq(&self) -> Option<String> {
        fields::rsrq(&*self.signal_info().await?)
    }

    pub async fn rsrp(&self) -> Option<String> {
        fields::rsrp(&*self.signal_info().await?)
    }
}

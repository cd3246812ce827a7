//! Configuration structures for the SV test set.
//!
//! Supports TOML deserialization with sensible defaults for
//! development and explicit values for field deployment.

use crate::error::{SvtsError, SvtsResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Sample rate convention used by an SV stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SmpMod {
    /// Samples per nominal period.
    #[default]
    SmpPerNominal,
    /// Samples per second.
    SmpPerSec,
}

/// Source of the phasor state driving a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Directly writable via the manager's `update_phasors`/`update_harmonics`.
    #[default]
    Manual,
    /// Fed by an external COMTRADE playback task (out of scope for this crate).
    Comtrade,
    /// Driven by the sequence engine.
    Sequence,
}

/// A six-byte MAC address, printable as `xx:xx:xx:xx:xx:xx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Parse a colon-separated hex MAC string.
    pub fn parse(s: &str) -> SvtsResult<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(SvtsError::ConfigInvalid(format!(
                "malformed MAC address: {s}"
            )));
        }
        let mut bytes = [0u8; 6];
        for (i, p) in parts.iter().enumerate() {
            bytes[i] = u8::from_str_radix(p, 16)
                .map_err(|_| SvtsError::ConfigInvalid(format!("malformed MAC address: {s}")))?;
        }
        Ok(Self(bytes))
    }
}

impl std::fmt::Display for MacAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl Serialize for MacAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        MacAddress::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Immutable per-stream configuration; swapped atomically on update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Unique printable stream identifier.
    pub stream_id: String,
    /// SV ID (`svID`), at most 34 bytes of UTF-8.
    pub sv_id: String,
    /// Application id, host order on this side, big-endian on the wire.
    pub app_id: u16,
    /// Destination multicast MAC address.
    pub mac_dst: MacAddress,
    /// Source MAC address; if all-zero, resolved from the sink at `start()`.
    pub mac_src: MacAddress,
    /// 802.1Q VLAN id, 0..=4095.
    pub vlan_id: u16,
    /// 802.1Q priority, 0..=7.
    pub vlan_prio: u8,
    /// 802.1Q drop-eligible-indicator bit.
    pub vlan_dei: bool,
    /// Dataset reference, at most 65 bytes.
    pub dataset_ref: String,
    /// Configuration revision counter.
    pub conf_rev: u32,
    /// Sample rate in samples/second.
    pub smp_rate: u32,
    /// Sample-rate convention.
    pub smp_mod: SmpMod,
    /// ASDUs per Ethernet frame, 1..=8.
    pub n_asdu: u8,
    /// Channels per ASDU, 1..=24 (conventionally 8 for 9-2LE).
    pub n_channels: u8,
    /// Nominal system frequency, 45..=65 Hz.
    pub nominal_freq: f64,
    /// Source of the driving phasor state.
    pub data_source: DataSource,
}

impl StreamConfig {
    /// Validate all invariants named in the data model; rejects at the
    /// boundary without mutating any shared state.
    pub fn validate(&self) -> SvtsResult<()> {
        if self.sv_id.as_bytes().len() > 34 || self.sv_id.is_empty() {
            return Err(SvtsError::ConfigInvalid(
                "svID must be 1..=34 UTF-8 bytes".into(),
            ));
        }
        if self.dataset_ref.as_bytes().len() > 65 {
            return Err(SvtsError::ConfigInvalid(
                "datSet reference must be at most 65 bytes".into(),
            ));
        }
        if self.vlan_id > 4095 {
            return Err(SvtsError::ConfigInvalid(format!(
                "vlan_id {} out of range 0..=4095",
                self.vlan_id
            )));
        }
        if self.vlan_prio > 7 {
            return Err(SvtsError::ConfigInvalid(format!(
                "vlan_prio {} out of range 0..=7",
                self.vlan_prio
            )));
        }
        if !(1..=8).contains(&self.n_asdu) {
            return Err(SvtsError::ConfigInvalid(format!(
                "n_asdu {} out of range 1..=8",
                self.n_asdu
            )));
        }
        if !(1..=24).contains(&self.n_channels) {
            return Err(SvtsError::ConfigInvalid(format!(
                "n_channels {} out of range 1..=24",
                self.n_channels
            )));
        }
        if !(45.0..=65.0).contains(&self.nominal_freq) {
            return Err(SvtsError::ConfigInvalid(format!(
                "nominal_freq {} out of range 45..=65 Hz",
                self.nominal_freq
            )));
        }
        if self.smp_rate == 0 {
            return Err(SvtsError::ConfigInvalid(
                "smp_rate must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            stream_id: "stream-1".to_string(),
            sv_id: "TestSV01".to_string(),
            app_id: 0x4000,
            mac_dst: MacAddress([0x01, 0x0C, 0xCD, 0x04, 0x00, 0x00]),
            mac_src: MacAddress([0; 6]),
            vlan_id: 0,
            vlan_prio: 4,
            vlan_dei: false,
            dataset_ref: String::new(),
            conf_rev: 1,
            smp_rate: 4800,
            smp_mod: SmpMod::SmpPerNominal,
            n_asdu: 1,
            n_channels: 8,
            nominal_freq: 60.0,
            data_source: DataSource::Manual,
        }
    }
}

/// Scheduler policy for real-time publisher threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SchedPolicy {
    /// SCHED_FIFO.
    #[default]
    Fifo,
    /// SCHED_RR.
    Rr,
    /// SCHED_OTHER (non-RT).
    Other,
}

/// CPU affinity specification for worker threads.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CpuAffinity {
    /// No affinity set (OS chooses).
    #[default]
    None,
    /// Pin every worker to one CPU core, round-robin over the set.
    Set(Vec<usize>),
}

impl Serialize for CpuAffinity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            CpuAffinity::None => serializer.serialize_none(),
            CpuAffinity::Set(cpus) => cpus.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for CpuAffinity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let opt: Option<Vec<usize>> = Option::deserialize(deserializer)?;
        Ok(match opt {
            None => CpuAffinity::None,
            Some(cpus) => CpuAffinity::Set(cpus),
        })
    }
}

/// Worker-pool configuration (Component G).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Number of worker threads.
    pub num_workers: usize,
    /// Bound on the task submission queue.
    pub queue_capacity: usize,
    /// RT priority (0 disables RT scheduling), 0..=99.
    pub rt_priority: u8,
    /// RT scheduling policy when `rt_priority > 0`.
    pub rt_policy: SchedPolicy,
    /// Optional CPU affinity set, applied round-robin to workers.
    pub cpu_affinity: CpuAffinity,
    /// Lock worker stacks into physical memory (`mlockall`).
    pub lock_memory: bool,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            queue_capacity: 64,
            rt_priority: 0,
            rt_policy: SchedPolicy::Fifo,
            cpu_affinity: CpuAffinity::None,
            lock_memory: false,
        }
    }
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Worker pool configuration shared by all publisher instances.
    pub worker_pool: WorkerPoolConfig,
    /// Bounded timeout for cooperative stop of a publisher tick task.
    #[serde(with = "humantime_serde")]
    pub stop_timeout: Duration,
    /// GOOSE receive-sink timeout.
    #[serde(with = "humantime_serde")]
    pub goose_recv_timeout: Duration,
    /// Path to a scenario (sequence) file to auto-load, if any.
    pub scenario_file: Option<PathBuf>,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            worker_pool: WorkerPoolConfig::default(),
            stop_timeout: Duration::from_secs(2),
            goose_recv_timeout: Duration::from_millis(100),
            scenario_file: None,
            log_level: "info".to_string(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::axi::BridgeError;

/// Bridge instantiation parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeConfig {
    /// data bus width in bits
    pub bus_width: u32,
    /// user sideband width in bits
    pub user_width: u32,
    /// acknowledge-based coherency, never set for ACE-Lite
    pub coherent: bool,
    /// write addresses that may wait for their data burst
    pub pending_depth: usize,
    /// beats kept in the beat trace, oldest dropped first; 0 records nothing
    pub trace_depth: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            bus_width: 64,
            user_width: 0,
            coherent: false,
            pending_depth: 8,
            trace_depth: 4096,
        }
    }
}

impl BridgeConfig {
    pub fn bus_bytes(&self) -> usize {
        (self.bus_width / 8) as usize
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        if !self.bus_width.is_power_of_two() || !(8..=1024).contains(&self.bus_width) {
            return Err(BridgeError::Config(format!(
                "bus width {} is not a power of two between 8 and 1024",
                self.bus_width
            )));
        }
        if self.user_width > 64 {
            return Err(BridgeError::Config(format!("user width {} exceeds 64 bits", self.user_width)));
        }
        if self.coherent {
            return Err(BridgeError::Config("ACE-Lite has no acknowledge channels, coherent must be false".into()));
        }
        if self.pending_depth == 0 {
            return Err(BridgeError::Config("pending address depth must be at least 1".into()));
        }
        Ok(())
    }
}

/// How the initiator drives `r_ready`/`b_ready`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReadyPattern {
    #[default]
    Always,
    /// high every other cycle
    Toggle,
}

/// Testbench parameters: clocking, memory latencies and initiator behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BenchConfig {
    pub clock_period_ns: u64,
    /// sampling point of the bridge after each rising edge
    pub sample_delay_ns: u64,
    /// 0 completes requests synchronously
    pub accept_delay_ns: u64,
    /// delay returned with a synchronous completion
    pub update_delay_ns: u64,
    pub response_delay_ns: u64,
    pub ready: ReadyPattern,
    /// forward calls kept in the memory's phase log
    pub phase_log_depth: usize,
    pub bridge: BridgeConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        BenchConfig {
            clock_period_ns: 10,
            sample_delay_ns: 1,
            accept_delay_ns: 0,
            update_delay_ns: 0,
            response_delay_ns: 20,
            ready: ReadyPattern::Always,
            phase_log_depth: 4096,
            bridge: BridgeConfig::default(),
        }
    }
}

impl BenchConfig {
    pub fn clock_period(&self) -> Duration {
        Duration::from_nanos(self.clock_period_ns)
    }
    pub fn sample_delay(&self) -> Duration {
        Duration::from_nanos(self.sample_delay_ns)
    }
    pub fn accept_delay(&self) -> Duration {
        Duration::from_nanos(self.accept_delay_ns)
    }
    pub fn update_delay(&self) -> Duration {
        Duration::from_nanos(self.update_delay_ns)
    }
    pub fn response_delay(&self) -> Duration {
        Duration::from_nanos(self.response_delay_ns)
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        self.bridge.validate()?;
        if self.sample_delay_ns == 0 || self.sample_delay_ns >= self.clock_period_ns {
            return Err(BridgeError::Config(format!(
                "sample delay {}ns must lie strictly inside the {}ns clock period",
                self.sample_delay_ns, self.clock_period_ns
            )));
        }
        if self.response_delay_ns == 0 {
            return Err(BridgeError::Config("response delay must be non-zero".into()));
        }
        Ok(())
    }
}

/// Reads a TOML testbench configuration; missing keys keep their defaults.
pub fn load_config_file(path: &Path) -> Result<BenchConfig, BridgeError> {
    let load_err = |reason: String| BridgeError::ConfigLoad {
        path: path.display().to_string(),
        reason,
    };
    let content = fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
    let config: BenchConfig = toml::from_str(&content).map_err(|e| load_err(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

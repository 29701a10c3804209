//! System configuration
//!
//! Compile-time defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Builder methods
//! 2. Environment variables (`TQ_*`, read by `from_env`)
//! 3. User overrides file named by `TQ_CONFIG_RS` at build time
//! 4. Library defaults
//!
//! # Example
//!
//! ```rust,ignore
//! use tqueue_runtime::config::SystemConfig;
//!
//! let config = SystemConfig::from_env()
//!     .smp(true)
//!     .scheduler_count(2)
//!     .max_nonempty_queues(64);
//! ```

pub mod defaults;

use std::time::Duration;

use tqueue_core::constants::MAX_SCHEDULER_INSTANCES;
use tqueue_core::env::{env_get, env_get_bool};
use tqueue_core::kprintln;

/// Static description of one thread-queue system
#[derive(Debug, Clone)]
pub struct SystemConfig {
    /// Scheduler instances (processor groups)
    pub scheduler_count: usize,
    /// Multiprocessor mode: per-instance waiter containers and a shared heads arena
    pub smp: bool,
    /// Heads arena slots, i.e. queues that may be non-empty at the same time
    pub max_nonempty_queues: usize,
    /// Period of the clock thread
    pub tick_interval: Duration,
    /// Size of the thread-id space
    pub max_threads: usize,
    /// Node number of this system for multiprocessing object ids
    pub local_node: u16,
    /// Log configuration and arena events at info level
    pub debug_logging: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemConfig {
    /// Compile-time defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `TQ_SCHEDULER_COUNT`
    /// - `TQ_SMP` (0/1)
    /// - `TQ_MAX_NONEMPTY_QUEUES`
    /// - `TQ_TICK_INTERVAL_US`
    /// - `TQ_MAX_THREADS`
    /// - `TQ_LOCAL_NODE`
    /// - `TQ_DEBUG_LOGGING` (0/1)
    pub fn from_env() -> Self {
        Self {
            scheduler_count: env_get("TQ_SCHEDULER_COUNT", defaults::SCHEDULER_COUNT),
            smp: env_get_bool("TQ_SMP", defaults::SMP),
            max_nonempty_queues: env_get("TQ_MAX_NONEMPTY_QUEUES", defaults::MAX_NONEMPTY_QUEUES),
            tick_interval: Duration::from_micros(env_get(
                "TQ_TICK_INTERVAL_US",
                defaults::TICK_INTERVAL_US,
            )),
            max_threads: env_get("TQ_MAX_THREADS", defaults::MAX_THREADS),
            local_node: env_get("TQ_LOCAL_NODE", defaults::LOCAL_NODE),
            debug_logging: env_get_bool("TQ_DEBUG_LOGGING", defaults::DEBUG_LOGGING),
        }
    }

    /// Compile-time defaults only, ignoring the environment.
    /// Tests start from here so the outcome does not depend on the shell.
    pub fn new() -> Self {
        Self {
            scheduler_count: defaults::SCHEDULER_COUNT,
            smp: defaults::SMP,
            max_nonempty_queues: defaults::MAX_NONEMPTY_QUEUES,
            tick_interval: Duration::from_micros(defaults::TICK_INTERVAL_US),
            max_threads: defaults::MAX_THREADS,
            local_node: defaults::LOCAL_NODE,
            debug_logging: defaults::DEBUG_LOGGING,
        }
    }

    /// Multiprocessor layout with `instances` scheduler instances
    pub fn multiprocessor(instances: usize) -> Self {
        Self::new().smp(true).scheduler_count(instances)
    }

    // Builder methods

    pub fn scheduler_count(mut self, n: usize) -> Self {
        self.scheduler_count = n;
        self
    }

    pub fn smp(mut self, enable: bool) -> Self {
        self.smp = enable;
        self
    }

    pub fn max_nonempty_queues(mut self, n: usize) -> Self {
        self.max_nonempty_queues = n;
        self
    }

    pub fn tick_interval(mut self, d: Duration) -> Self {
        self.tick_interval = d;
        self
    }

    pub fn max_threads(mut self, n: usize) -> Self {
        self.max_threads = n;
        self
    }

    pub fn local_node(mut self, node: u16) -> Self {
        self.local_node = node;
        self
    }

    pub fn debug_logging(mut self, enable: bool) -> Self {
        self.debug_logging = enable;
        self
    }

    /// Reject layouts the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler_count == 0 {
            return Err(ConfigError::InvalidValue("scheduler_count must be > 0"));
        }
        if self.scheduler_count > MAX_SCHEDULER_INSTANCES {
            return Err(ConfigError::InvalidValue("scheduler_count exceeds MAX_SCHEDULER_INSTANCES"));
        }
        if !self.smp && self.scheduler_count > 1 {
            return Err(ConfigError::InvalidValue(
                "more than one scheduler instance requires smp",
            ));
        }
        if self.smp && self.max_nonempty_queues == 0 {
            return Err(ConfigError::InvalidValue("max_nonempty_queues must be > 0 with smp"));
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::InvalidValue("tick_interval must be > 0"));
        }
        if self.max_threads == 0 {
            return Err(ConfigError::InvalidValue("max_threads must be > 0"));
        }
        if self.max_threads >= u32::MAX as usize {
            return Err(ConfigError::InvalidValue("max_threads must fit a thread id"));
        }
        if self.local_node == 0 {
            return Err(ConfigError::InvalidValue("local_node must be > 0"));
        }
        Ok(())
    }

    /// Dump the configuration to stderr
    pub fn print(&self) {
        kprintln!("tqueue configuration:");
        kprintln!("  scheduler_count:      {}", self.scheduler_count);
        kprintln!("  smp:                  {}", self.smp);
        kprintln!("  max_nonempty_queues:  {}", self.max_nonempty_queues);
        kprintln!("  tick_interval:        {:?}", self.tick_interval);
        kprintln!("  max_threads:          {}", self.max_threads);
        kprintln!("  local_node:           {}", self.local_node);
        kprintln!("  debug_logging:        {}", self.debug_logging);
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for tqueue_core::TqError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::InvalidValue(msg) => tqueue_core::TqError::InvalidConfig(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        let config = SystemConfig::new();
        assert_eq!(config.scheduler_count, 1);
        assert!(!config.smp);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = SystemConfig::multiprocessor(4)
            .max_nonempty_queues(8)
            .tick_interval(Duration::from_micros(250));

        assert!(config.smp);
        assert_eq!(config.scheduler_count, 4);
        assert_eq!(config.max_nonempty_queues, 8);
        assert_eq!(config.tick_interval, Duration::from_micros(250));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert!(SystemConfig::new().scheduler_count(0).validate().is_err());
        assert!(SystemConfig::new().scheduler_count(2).validate().is_err());
        assert!(SystemConfig::multiprocessor(2).max_nonempty_queues(0).validate().is_err());
        assert!(SystemConfig::new().tick_interval(Duration::ZERO).validate().is_err());
        assert!(SystemConfig::new().max_threads(0).validate().is_err());
        assert!(SystemConfig::new().local_node(0).validate().is_err());

        // A uniprocessor never touches the arena
        assert!(SystemConfig::new().max_nonempty_queues(0).validate().is_ok());
    }

    #[test]
    fn test_debug_logging_from_env() {
        std::env::set_var("TQ_DEBUG_LOGGING", "1");
        assert!(SystemConfig::from_env().debug_logging);
        std::env::set_var("TQ_DEBUG_LOGGING", "0");
        assert!(!SystemConfig::from_env().debug_logging);
        std::env::remove_var("TQ_DEBUG_LOGGING");
    }

    #[test]
    fn test_error_converts() {
        let err: tqueue_core::TqError = ConfigError::InvalidValue("x").into();
        assert_eq!(err, tqueue_core::TqError::InvalidConfig("x"));
    }
}

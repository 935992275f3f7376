//! # Kernel Configuration
//!
//! Boot-time parameters for [`SimulatedKernel`](crate::SimulatedKernel):
//! which scheduling policy to run, how big memory and the backing store
//! are, and how often the timer fires.

use crate::address_space::PageGeometry;
use crate::scheduler::SchedulerPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

/// Kernel boot configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Ready-queue ordering
    pub policy: SchedulerPolicy,

    /// Bytes per page, frame and backing-store sector
    pub page_size: usize,

    /// Physical frames of main memory
    pub num_frames: usize,

    /// Backing-store sectors
    pub swap_sectors: usize,

    /// Stack bytes added to every user address space
    pub user_stack_size: usize,

    /// Machine ticks between timer interrupts
    pub timer_period: u64,

    /// Seed for a randomized timer; fixed period if absent
    pub timer_seed: Option<u64>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            policy: SchedulerPolicy::Fcfs,
            page_size: 128,
            num_frames: 128,
            swap_sectors: 1024,
            user_stack_size: 1024,
            timer_period: 100,
            timer_seed: None,
        }
    }
}

impl KernelConfig {
    /// Creates the default configuration with the given policy
    pub fn new(policy: SchedulerPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn with_frames(mut self, num_frames: usize) -> Self {
        self.num_frames = num_frames;
        self
    }

    pub fn with_swap_sectors(mut self, swap_sectors: usize) -> Self {
        self.swap_sectors = swap_sectors;
        self
    }

    pub fn with_user_stack_size(mut self, user_stack_size: usize) -> Self {
        self.user_stack_size = user_stack_size;
        self
    }

    pub fn with_timer_period(mut self, timer_period: u64) -> Self {
        self.timer_period = timer_period;
        self
    }

    /// Uses a randomized timer seeded with `seed`
    pub fn with_timer_seed(mut self, seed: u64) -> Self {
        self.timer_seed = Some(seed);
        self
    }

    /// Checks the values the kernel divides by
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Zero { field: "page_size" });
        }
        if self.timer_period == 0 {
            return Err(ConfigError::Zero {
                field: "timer_period",
            });
        }
        Ok(())
    }

    /// Page layout for address spaces
    pub fn geometry(&self) -> PageGeometry {
        PageGeometry {
            page_size: self.page_size,
            user_stack_size: self.user_stack_size,
        }
    }

    /// Serializes to JSON string
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses and validates a JSON configuration
    ///
    /// Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Configuration for the coordinator and its background sweeps.
//!
//! # Construction
//!
//! Use [`CoordinatorConfig::builder()`] to create a configuration:
//!
//! ```rust,ignore
//! let config = CoordinatorConfig::builder()
//!     .max_cache_entries(50_000)
//!     .dedup_in_flight(false)
//!     .build();
//! ```
//!
//! Or use the default configuration:
//!
//! ```rust,ignore
//! let config = CoordinatorConfig::default();
//! ```

use std::time::Duration;

use chrono_tz::Tz;

/// Configuration for the invalidation coordinator.
///
/// Controls the capacity bound enforced by eviction, the cadence of both
/// background sweeps, the task dedup/retention policy, and the client poll
/// budget.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CoordinatorConfig {
    max_cache_entries: u64,
    enable_invalidate_scheduled: bool,
    invalidate_scheduled_initial_delay: Duration,
    invalidate_scheduled_period: Duration,
    enable_evict_excess: bool,
    evict_excess_schedule: String,
    evict_excess_timezone: Tz,
    dedup_in_flight: bool,
    task_retention: Duration,
    poll_interval: Duration,
    poll_timeout: Duration,
    change_flush_period: Duration,
}

impl CoordinatorConfig {
    /// Creates a new configuration builder with default values.
    pub fn builder() -> CoordinatorConfigBuilder {
        CoordinatorConfigBuilder::default()
    }

    /// Maximum number of cache entries the evict-excess sweep keeps.
    pub fn max_cache_entries(&self) -> u64 {
        self.max_cache_entries
    }

    /// Whether the scheduled-invalidation sweep is registered.
    pub fn enable_invalidate_scheduled(&self) -> bool {
        self.enable_invalidate_scheduled
    }

    /// Delay before the first scheduled-invalidation tick.
    pub fn invalidate_scheduled_initial_delay(&self) -> Duration {
        self.invalidate_scheduled_initial_delay
    }

    /// Fixed delay between scheduled-invalidation ticks.
    pub fn invalidate_scheduled_period(&self) -> Duration {
        self.invalidate_scheduled_period
    }

    /// Whether the evict-excess sweep is registered.
    pub fn enable_evict_excess(&self) -> bool {
        self.enable_evict_excess
    }

    /// Cron expression driving the evict-excess sweep.
    pub fn evict_excess_schedule(&self) -> &str {
        &self.evict_excess_schedule
    }

    /// Timezone for the evict-excess cron schedule.
    pub fn evict_excess_timezone(&self) -> Tz {
        self.evict_excess_timezone
    }

    /// Whether resubmitting an in-flight scope returns the existing task.
    pub fn dedup_in_flight(&self) -> bool {
        self.dedup_in_flight
    }

    /// How long terminal tasks remain queryable.
    ///
    /// Must exceed one full client poll cycle ([`poll_timeout`](Self::poll_timeout)).
    pub fn task_retention(&self) -> Duration {
        self.task_retention
    }

    /// Interval between client status polls.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Overall budget for one client poll cycle.
    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    /// Fixed delay between change-invalidator flushes.
    pub fn change_flush_period(&self) -> Duration {
        self.change_flush_period
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfigBuilder::default().build()
    }
}

/// Builder for [`CoordinatorConfig`].
#[derive(Debug, Clone)]
pub struct CoordinatorConfigBuilder {
    config: CoordinatorConfig,
}

impl Default for CoordinatorConfigBuilder {
    fn default() -> Self {
        Self {
            config: CoordinatorConfig {
                max_cache_entries: 10_000,
                enable_invalidate_scheduled: true,
                invalidate_scheduled_initial_delay: Duration::from_secs(1),
                invalidate_scheduled_period: Duration::from_secs(10),
                enable_evict_excess: true,
                evict_excess_schedule: "* * * * *".to_string(),
                evict_excess_timezone: chrono_tz::UTC,
                dedup_in_flight: true,
                task_retention: Duration::from_secs(300),
                poll_interval: Duration::from_secs(1),
                poll_timeout: Duration::from_secs(10),
                change_flush_period: Duration::from_secs(10),
            },
        }
    }
}

impl CoordinatorConfigBuilder {
    /// Sets the maximum cache entry count enforced by eviction.
    pub fn max_cache_entries(mut self, value: u64) -> Self {
        self.config.max_cache_entries = value;
        self
    }

    /// Enables or disables the scheduled-invalidation sweep.
    pub fn enable_invalidate_scheduled(mut self, value: bool) -> Self {
        self.config.enable_invalidate_scheduled = value;
        self
    }

    /// Sets the delay before the first scheduled-invalidation tick.
    pub fn invalidate_scheduled_initial_delay(mut self, value: Duration) -> Self {
        self.config.invalidate_scheduled_initial_delay = value;
        self
    }

    /// Sets the fixed delay between scheduled-invalidation ticks.
    pub fn invalidate_scheduled_period(mut self, value: Duration) -> Self {
        self.config.invalidate_scheduled_period = value;
        self
    }

    /// Enables or disables the evict-excess sweep.
    pub fn enable_evict_excess(mut self, value: bool) -> Self {
        self.config.enable_evict_excess = value;
        self
    }

    /// Sets the cron expression for the evict-excess sweep.
    pub fn evict_excess_schedule(mut self, value: impl Into<String>) -> Self {
        self.config.evict_excess_schedule = value.into();
        self
    }

    /// Sets the timezone for the evict-excess cron schedule.
    pub fn evict_excess_timezone(mut self, value: Tz) -> Self {
        self.config.evict_excess_timezone = value;
        self
    }

    /// Enables or disables in-flight submission dedup.
    pub fn dedup_in_flight(mut self, value: bool) -> Self {
        self.config.dedup_in_flight = value;
        self
    }

    /// Sets the terminal-task retention window.
    pub fn task_retention(mut self, value: Duration) -> Self {
        self.config.task_retention = value;
        self
    }

    /// Sets the client poll interval.
    pub fn poll_interval(mut self, value: Duration) -> Self {
        self.config.poll_interval = value;
        self
    }

    /// Sets the overall client poll budget.
    pub fn poll_timeout(mut self, value: Duration) -> Self {
        self.config.poll_timeout = value;
        self
    }

    /// Sets the change-invalidator flush period.
    pub fn change_flush_period(mut self, value: Duration) -> Self {
        self.config.change_flush_period = value;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> CoordinatorConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.max_cache_entries(), 10_000);
        assert!(config.enable_invalidate_scheduled());
        assert_eq!(
            config.invalidate_scheduled_initial_delay(),
            Duration::from_secs(1)
        );
        assert_eq!(config.invalidate_scheduled_period(), Duration::from_secs(10));
        assert!(config.enable_evict_excess());
        assert_eq!(config.evict_excess_schedule(), "* * * * *");
        assert_eq!(config.evict_excess_timezone(), chrono_tz::UTC);
        assert!(config.dedup_in_flight());
        assert_eq!(config.task_retention(), Duration::from_secs(300));
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.poll_timeout(), Duration::from_secs(10));
        assert_eq!(config.change_flush_period(), Duration::from_secs(10));
    }

    #[test]
    fn retention_outlives_poll_cycle_by_default() {
        let config = CoordinatorConfig::default();
        assert!(config.task_retention() > config.poll_timeout());
    }

    #[test]
    fn builder_sets_all_fields() {
        let config = CoordinatorConfig::builder()
            .max_cache_entries(500)
            .enable_invalidate_scheduled(false)
            .invalidate_scheduled_initial_delay(Duration::from_millis(100))
            .invalidate_scheduled_period(Duration::from_secs(5))
            .enable_evict_excess(false)
            .evict_excess_schedule("0 * * * *")
            .evict_excess_timezone(chrono_tz::Europe::Oslo)
            .dedup_in_flight(false)
            .task_retention(Duration::from_secs(60))
            .poll_interval(Duration::from_millis(250))
            .poll_timeout(Duration::from_secs(5))
            .change_flush_period(Duration::from_secs(30))
            .build();

        assert_eq!(config.max_cache_entries(), 500);
        assert!(!config.enable_invalidate_scheduled());
        assert_eq!(
            config.invalidate_scheduled_initial_delay(),
            Duration::from_millis(100)
        );
        assert_eq!(config.invalidate_scheduled_period(), Duration::from_secs(5));
        assert!(!config.enable_evict_excess());
        assert_eq!(config.evict_excess_schedule(), "0 * * * *");
        assert_eq!(config.evict_excess_timezone(), chrono_tz::Europe::Oslo);
        assert!(!config.dedup_in_flight());
        assert_eq!(config.task_retention(), Duration::from_secs(60));
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.poll_timeout(), Duration::from_secs(5));
        assert_eq!(config.change_flush_period(), Duration::from_secs(30));
    }
}

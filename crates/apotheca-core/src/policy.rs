//! # Return Policy
//!
//! Configurable business rules for accepting returns.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     APOTHECA_RETURN_WINDOW_DAYS=30                                      │
//! │     APOTHECA_MANAGER_APPROVAL_AFTER_DAYS=7                              │
//! │     APOTHECA_MAX_RETURNS_PER_DAY=10                                     │
//! │     APOTHECA_MIN_RETURN_AMOUNT_CENTS=0                                  │
//! │     APOTHECA_RETURN_HOURS=8-22                                          │
//! │                                                                         │
//! │  2. Caller-supplied struct (deserialized from whatever the host         │
//! │     application uses for settings)                                      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! │     30-day window, manager approval after 7, 10 returns/day,            │
//! │     no minimum amount, no hour restriction                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine receives a `ReturnPolicy` at construction and never reads the
//! environment again, so tests can inject any policy without process-global
//! state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Policy Error
// =============================================================================

/// Errors raised by `ReturnPolicy::validate`.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A zero-day window would reject every return.
    #[error("return_window_days must be at least 1")]
    InvalidWindow,

    /// Negative minimums are meaningless.
    #[error("minimum_return_amount_cents must not be negative, got {cents}")]
    NegativeMinimumAmount { cents: i64 },

    /// Hours must be 0-23 and distinct.
    #[error("allowed hours must be distinct hours 0-23, got {start}-{end}")]
    InvalidHourWindow { start: u8, end: u8 },

    /// Hour window string did not parse.
    #[error("invalid hour window '{0}' (expected START-END, e.g. 8-22)")]
    UnparsableHourWindow(String),
}

// =============================================================================
// Hour Window
// =============================================================================

/// A half-open daily window `[start_hour, end_hour)` during which returns
/// are accepted. When `start_hour > end_hour` the window wraps midnight
/// (a 22-6 window covers late evening and early morning).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourWindow {
    pub start_hour: u8,
    pub end_hour: u8,
}

impl HourWindow {
    /// Whether `hour` (0-23) falls inside the window.
    pub fn contains(&self, hour: u8) -> bool {
        if self.start_hour < self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            // Wraps midnight: 22-6 accepts 22,23,0..5
            hour >= self.start_hour || hour < self.end_hour
        }
    }

    /// Validates hour bounds. start == end is rejected rather than being
    /// treated as always-open or always-closed.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.start_hour > 23 || self.end_hour > 23 || self.start_hour == self.end_hour {
            return Err(PolicyError::InvalidHourWindow {
                start: self.start_hour,
                end: self.end_hour,
            });
        }
        Ok(())
    }
}

impl std::str::FromStr for HourWindow {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| PolicyError::UnparsableHourWindow(s.to_string()))?;
        let start_hour = start
            .trim()
            .parse::<u8>()
            .map_err(|_| PolicyError::UnparsableHourWindow(s.to_string()))?;
        let end_hour = end
            .trim()
            .parse::<u8>()
            .map_err(|_| PolicyError::UnparsableHourWindow(s.to_string()))?;
        let window = HourWindow {
            start_hour,
            end_hour,
        };
        window.validate()?;
        Ok(window)
    }
}

impl std::fmt::Display for HourWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start_hour, self.end_hour)
    }
}

// =============================================================================
// Return Policy
// =============================================================================

/// Business rules for accepting returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnPolicy {
    /// How many days after the sale a return is still accepted.
    #[serde(default = "default_return_window_days")]
    pub return_window_days: u32,

    /// Returns filed more than this many days after the sale are flagged
    /// for manager approval (but still accepted).
    #[serde(default = "default_manager_approval_after_days")]
    pub manager_approval_after_days: u32,

    /// Maximum returns one actor may file per calendar day.
    /// 0 means unlimited.
    #[serde(default = "default_max_returns_per_day")]
    pub max_returns_per_actor_per_day: u32,

    /// Returns below this total are refused. 0 disables the check.
    #[serde(default)]
    pub minimum_return_amount_cents: i64,

    /// Hours of day during which returns are accepted. None means any hour.
    #[serde(default)]
    pub allowed_hours: Option<HourWindow>,
}

fn default_return_window_days() -> u32 {
    30
}

fn default_manager_approval_after_days() -> u32 {
    7
}

fn default_max_returns_per_day() -> u32 {
    10
}

impl Default for ReturnPolicy {
    fn default() -> Self {
        ReturnPolicy {
            return_window_days: default_return_window_days(),
            manager_approval_after_days: default_manager_approval_after_days(),
            max_returns_per_actor_per_day: default_max_returns_per_day(),
            minimum_return_amount_cents: 0,
            allowed_hours: None,
        }
    }
}

impl ReturnPolicy {
    /// Builds a policy from defaults plus APOTHECA_* environment overrides,
    /// then validates it.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Environment variables
    pub fn load_from_env() -> Result<Self, PolicyError> {
        let mut policy = Self::default();
        policy.apply_env_overrides();
        policy.validate()?;
        Ok(policy)
    }

    /// Applies environment variable overrides. Values that fail to parse
    /// are ignored and the previous value is kept.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(days) = std::env::var("APOTHECA_RETURN_WINDOW_DAYS") {
            if let Ok(d) = days.parse::<u32>() {
                self.return_window_days = d;
            }
        }

        if let Ok(days) = std::env::var("APOTHECA_MANAGER_APPROVAL_AFTER_DAYS") {
            if let Ok(d) = days.parse::<u32>() {
                self.manager_approval_after_days = d;
            }
        }

        if let Ok(max) = std::env::var("APOTHECA_MAX_RETURNS_PER_DAY") {
            if let Ok(m) = max.parse::<u32>() {
                self.max_returns_per_actor_per_day = m;
            }
        }

        if let Ok(min) = std::env::var("APOTHECA_MIN_RETURN_AMOUNT_CENTS") {
            if let Ok(m) = min.parse::<i64>() {
                self.minimum_return_amount_cents = m;
            }
        }

        if let Ok(hours) = std::env::var("APOTHECA_RETURN_HOURS") {
            if let Ok(window) = hours.parse::<HourWindow>() {
                self.allowed_hours = Some(window);
            }
        }
    }

    /// Validates the policy.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.return_window_days == 0 {
            return Err(PolicyError::InvalidWindow);
        }

        if self.minimum_return_amount_cents < 0 {
            return Err(PolicyError::NegativeMinimumAmount {
                cents: self.minimum_return_amount_cents,
            });
        }

        if let Some(window) = &self.allowed_hours {
            window.validate()?;
        }

        Ok(())
    }

    // =========================================================================
    // Rule Checks
    // =========================================================================

    /// Whether the return window still covers a sale this many days old.
    /// Day `return_window_days` itself is still inside the window.
    pub fn window_covers(&self, days_elapsed: i64) -> bool {
        days_elapsed <= self.return_window_days as i64
    }

    /// Whether a return filed this many days after the sale needs a
    /// manager's sign-off.
    pub fn needs_manager_approval(&self, days_elapsed: i64) -> bool {
        days_elapsed > self.manager_approval_after_days as i64
    }

    /// Whether `hour` (0-23) is inside the accepted hours. No configured
    /// window means every hour is accepted.
    pub fn is_within_allowed_hours(&self, hour: u8) -> bool {
        match &self.allowed_hours {
            Some(window) => window.contains(hour),
            None => true,
        }
    }

    /// The per-actor daily cap, if one is configured.
    pub fn daily_limit(&self) -> Option<u32> {
        if self.max_returns_per_actor_per_day == 0 {
            None
        } else {
            Some(self.max_returns_per_actor_per_day)
        }
    }

    /// Whether an amount falls below the configured minimum.
    pub fn below_minimum(&self, amount_cents: i64) -> bool {
        amount_cents < self.minimum_return_amount_cents
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

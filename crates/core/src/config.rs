use std::env;

use serde::{Deserialize, Serialize};

use crate::error::ScanJobError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_f64(profile: &str, key: &str, default: f64) -> f64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub batch: BatchConfig,
    pub queue: QueueConfig,
    pub aws: AwsConfig,
    pub job_manager: JobManagerConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `SCANJOB_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("SCANJOB_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            batch: BatchConfig::from_env_profiled(p),
            queue: QueueConfig::from_env_profiled(p),
            aws: AwsConfig::from_env_profiled(p),
            job_manager: JobManagerConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Check the settings the job manager cannot run without.
    pub fn validate(&self) -> Result<(), ScanJobError> {
        if self.batch.pool_id.is_empty() {
            return Err(ScanJobError::MissingSetting("BATCH_POOL_ID"));
        }
        if self.batch.job_id.is_empty() {
            return Err(ScanJobError::MissingSetting("BATCH_JOB_ID"));
        }
        if self.queue.queue_name.is_empty() {
            return Err(ScanJobError::MissingSetting("SCAN_QUEUE_NAME"));
        }
        self.job_manager.validate()
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  batch:       account={}, pool={}, job={}", self.batch.account_name, self.batch.pool_id, self.batch.job_id);
        tracing::info!("  queue:       name={}, visibility={}s", self.queue.queue_name, self.queue.visibility_timeout_secs);
        tracing::info!("  aws:         region={}, static_credentials={}", self.aws.region, self.aws.has_static_credentials());
        tracing::info!(
            "  job manager: overload_ratio={}, sampling={}s, interval={}s, wall_clock={}m",
            self.job_manager.target_queued_tasks_overload_ratio,
            self.job_manager.sampling_interval_secs,
            self.job_manager.add_tasks_interval_secs,
            self.job_manager.max_wall_clock_time_minutes,
        );
    }
}

// ── Batch pool / job ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub account_name: String,
    pub pool_id: String,
    pub job_id: String,
}

impl BatchConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            account_name: profiled_env_or(p, "BATCH_ACCOUNT_NAME", "local"),
            pool_id: profiled_env_or(p, "BATCH_POOL_ID", "scan-pool"),
            job_id: profiled_env_or(p, "BATCH_JOB_ID", "scan-job"),
        }
    }
}

// ── Scan request queue ────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub queue_name: String,
    pub visibility_timeout_secs: u64,
}

impl QueueConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            queue_name: profiled_env_or(p, "SCAN_QUEUE_NAME", "scan-requests"),
            visibility_timeout_secs: profiled_env_u64(p, "QUEUE_VISIBILITY_TIMEOUT_SECS", 300),
        }
    }
}

// ── AWS (SQS backend) ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub endpoint_url: Option<String>,
}

impl AwsConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            region: profiled_env_or(p, "AWS_REGION", "us-east-1"),
            access_key_id: profiled_env_opt(p, "AWS_ACCESS_KEY_ID"),
            secret_access_key: profiled_env_opt(p, "AWS_SECRET_ACCESS_KEY"),
            session_token: profiled_env_opt(p, "AWS_SESSION_TOKEN"),
            endpoint_url: profiled_env_opt(p, "QUEUE_AWS_ENDPOINT_URL"),
        }
    }

    pub fn has_static_credentials(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }
}

// ── Job manager (load generator + task creator) ───────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobManagerConfig {
    /// Multiple of pool capacity to keep queued on the pool.
    #[serde(default = "default_overload_ratio")]
    pub target_queued_tasks_overload_ratio: f64,
    /// Interval the pool load snapshot is sampled over.
    #[serde(default = "default_sampling_interval")]
    pub sampling_interval_secs: u64,
    /// Delay between two task creation cycles.
    #[serde(default = "default_add_tasks_interval")]
    pub add_tasks_interval_secs: u64,
    /// The job manager exits after this long and is restarted by its host.
    #[serde(default = "default_max_wall_clock")]
    pub max_wall_clock_time_minutes: u64,
}

fn default_overload_ratio() -> f64 { 2.0 }
fn default_sampling_interval() -> u64 { 15 }
fn default_add_tasks_interval() -> u64 { 15 }
fn default_max_wall_clock() -> u64 { 60 }

impl Default for JobManagerConfig {
    fn default() -> Self {
        Self {
            target_queued_tasks_overload_ratio: default_overload_ratio(),
            sampling_interval_secs: default_sampling_interval(),
            add_tasks_interval_secs: default_add_tasks_interval(),
            max_wall_clock_time_minutes: default_max_wall_clock(),
        }
    }
}

impl JobManagerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            target_queued_tasks_overload_ratio: profiled_env_f64(
                p,
                "TARGET_QUEUED_TASKS_OVERLOAD_RATIO",
                default_overload_ratio(),
            ),
            sampling_interval_secs: profiled_env_u64(p, "SAMPLING_INTERVAL_SECS", default_sampling_interval()),
            add_tasks_interval_secs: profiled_env_u64(p, "ADD_TASKS_INTERVAL_SECS", default_add_tasks_interval()),
            max_wall_clock_time_minutes: profiled_env_u64(
                p,
                "MAX_WALL_CLOCK_TIME_MINUTES",
                default_max_wall_clock(),
            ),
        }
    }

    pub fn validate(&self) -> Result<(), ScanJobError> {
        let ratio = self.target_queued_tasks_overload_ratio;
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(ScanJobError::Config(format!(
                "target queued tasks overload ratio must be positive, got {ratio}"
            )));
        }
        if self.sampling_interval_secs == 0 {
            return Err(ScanJobError::Config("sampling interval must be at least 1s".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_manager_defaults() {
        let config = JobManagerConfig::default();
        assert_eq!(config.target_queued_tasks_overload_ratio, 2.0);
        assert_eq!(config.sampling_interval_secs, 15);
        assert_eq!(config.add_tasks_interval_secs, 15);
        assert_eq!(config.max_wall_clock_time_minutes, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn job_manager_rejects_non_positive_ratio() {
        let mut config = JobManagerConfig::default();
        config.target_queued_tasks_overload_ratio = 0.0;
        assert!(matches!(config.validate(), Err(ScanJobError::Config(_))));

        config.target_queued_tasks_overload_ratio = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn job_manager_rejects_zero_sampling_interval() {
        let config = JobManagerConfig {
            sampling_interval_secs: 0,
            ..JobManagerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn job_manager_serde_defaults() {
        let config: JobManagerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, JobManagerConfig::default());

        let config: JobManagerConfig =
            serde_json::from_str(r#"{"target_queued_tasks_overload_ratio": 3.5}"#).unwrap();
        assert_eq!(config.target_queued_tasks_overload_ratio, 3.5);
        assert_eq!(config.sampling_interval_secs, 15);
    }

    #[test]
    fn profiled_lookup_prefers_prefixed_key() {
        // Unique key names keep this test independent of the process env.
        env::set_var("SCANJOBTEST_PROFILED_KEY", "base");
        env::set_var("STAGING_SCANJOBTEST_PROFILED_KEY", "staged");
        assert_eq!(
            profiled_env_opt("STAGING", "SCANJOBTEST_PROFILED_KEY").as_deref(),
            Some("staged")
        );
        assert_eq!(
            profiled_env_opt("", "SCANJOBTEST_PROFILED_KEY").as_deref(),
            Some("base")
        );
        assert_eq!(
            profiled_env_opt("OTHER", "SCANJOBTEST_PROFILED_KEY").as_deref(),
            Some("base")
        );
    }

    #[test]
    fn validate_reports_missing_pool() {
        let mut config = Config::for_profile("");
        config.batch.pool_id.clear();
        assert_eq!(
            config.validate(),
            Err(ScanJobError::MissingSetting("BATCH_POOL_ID"))
        );
    }
}

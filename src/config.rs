use anyhow::{bail, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::services::progress::ProgressSchedule;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub credentials_path: PathBuf,
    pub download_dir: PathBuf,
    pub request_timeout_secs: u64,
    pub revalidation_interval_secs: u64,
    pub progress_tick_ms: u64,
    pub progress_step: u8,
    pub progress_cap: u8,
    pub generation_reset_ms: u64,
    pub result_window: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_base_url: "http://localhost:8001".to_string(),
            credentials_path: PathBuf::from(".tailorview/credentials.json"),
            download_dir: PathBuf::from("downloads"),
            request_timeout_secs: 180,
            revalidation_interval_secs: 300, // 5 minutes
            progress_tick_ms: 800,
            progress_step: 10,
            progress_cap: 90,
            generation_reset_ms: 2000,
            result_window: 50,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();
        let config = Config {
            api_base_url: env::var("TAILORVIEW_API_URL")
                .unwrap_or(defaults.api_base_url)
                .trim_end_matches('/')
                .to_string(),
            credentials_path: env::var("TAILORVIEW_CREDENTIALS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.credentials_path),
            download_dir: env::var("TAILORVIEW_DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.download_dir),
            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "180".to_string())
                .parse()?,
            revalidation_interval_secs: env::var("SESSION_REVALIDATION_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()?,
            progress_tick_ms: env::var("PROGRESS_TICK_MS")
                .unwrap_or_else(|_| "800".to_string())
                .parse()?,
            progress_step: env::var("PROGRESS_STEP")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            progress_cap: env::var("PROGRESS_CAP")
                .unwrap_or_else(|_| "90".to_string())
                .parse()?,
            generation_reset_ms: env::var("GENERATION_RESET_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()?,
            result_window: env::var("RESULT_WINDOW")
                .unwrap_or_else(|_| "50".to_string()) // 0 keeps every artifact
                .parse()?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.progress_cap >= 100 {
            bail!("PROGRESS_CAP must stay below 100, got {}", self.progress_cap);
        }
        if self.progress_step == 0 {
            bail!("PROGRESS_STEP must be greater than zero");
        }
        if self.revalidation_interval_secs == 0 {
            bail!("SESSION_REVALIDATION_SECS must be greater than zero");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn revalidation_interval(&self) -> Duration {
        Duration::from_secs(self.revalidation_interval_secs)
    }

    pub fn generation_reset_delay(&self) -> Duration {
        Duration::from_millis(self.generation_reset_ms)
    }

    pub fn progress_schedule(&self) -> ProgressSchedule {
        ProgressSchedule {
            tick: Duration::from_millis(self.progress_tick_ms),
            step: self.progress_step,
            cap: self.progress_cap,
        }
    }

    pub fn result_capacity(&self) -> Option<usize> {
        match self.result_window {
            0 => None,
            n => Some(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 4] = [
        "TAILORVIEW_API_URL",
        "PROGRESS_CAP",
        "RESULT_WINDOW",
        "SESSION_REVALIDATION_SECS",
    ];

    fn clear_vars() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_from_env() {
        clear_vars();
        let config = Config::from_env().unwrap();

        assert_eq!(config.api_base_url, "http://localhost:8001");
        assert_eq!(config.progress_cap, 90);
        assert_eq!(config.result_capacity(), Some(50));
        assert_eq!(config.revalidation_interval(), Duration::from_secs(300));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_vars();
        env::set_var("TAILORVIEW_API_URL", "https://studio.example.com/");
        env::set_var("RESULT_WINDOW", "0");

        let config = Config::from_env().unwrap();
        assert_eq!(config.api_base_url, "https://studio.example.com");
        assert_eq!(config.result_capacity(), None);

        clear_vars();
    }

    #[test]
    #[serial]
    fn test_progress_cap_must_stay_below_completion() {
        clear_vars();
        env::set_var("PROGRESS_CAP", "100");

        assert!(Config::from_env().is_err());

        clear_vars();
    }

    #[test]
    fn test_progress_schedule() {
        let schedule = Config::default().progress_schedule();
        assert_eq!(schedule.tick, Duration::from_millis(800));
        assert_eq!(schedule.step, 10);
        assert_eq!(schedule.cap, 90);
    }
}

//! Engine configuration: `~/.minder/config.toml`, defaults when absent.

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration as StdDuration;

use minder_core::{RecommendPolicy, ReminderPolicy};

use crate::classify::ClassifierConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub classifier: ClassifierSection,
    pub reminders: RemindersSection,
    pub recommendations: RecommendationsSection,
    pub scheduler: SchedulerSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierSection {
    pub base_url: String,
    pub model: String,
    /// Env var holding the API key (never the key itself).
    pub api_key_env: String,
    pub confidence_threshold: f64,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemindersSection {
    pub lead_time_hours: i64,
    pub grace_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationsSection {
    pub trailing_days: i64,
    pub adherence_drop_threshold: f64,
    pub expense_spike_threshold: f64,
    pub baseline_windows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSection {
    pub tick_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            classifier: ClassifierSection {
                base_url: "https://api.groq.com/openai".to_string(),
                model: "openai/gpt-oss-20b".to_string(),
                api_key_env: "MINDER_API_KEY".to_string(),
                confidence_threshold: 0.6,
                timeout_seconds: 5,
            },
            reminders: RemindersSection {
                lead_time_hours: 24,
                grace_hours: 6,
            },
            recommendations: RecommendationsSection {
                trailing_days: 14,
                adherence_drop_threshold: 0.7,
                expense_spike_threshold: 1.3,
                baseline_windows: 3,
            },
            scheduler: SchedulerSection { tick_seconds: 60 },
        }
    }
}

impl Config {
    pub fn reminder_policy(&self) -> ReminderPolicy {
        ReminderPolicy {
            lead_time: Duration::hours(self.reminders.lead_time_hours),
            grace_window: Duration::hours(self.reminders.grace_hours),
        }
    }

    pub fn recommend_policy(&self) -> RecommendPolicy {
        RecommendPolicy {
            trailing_days: self.recommendations.trailing_days,
            adherence_drop_threshold: self.recommendations.adherence_drop_threshold,
            expense_spike_threshold: self.recommendations.expense_spike_threshold,
            baseline_windows: self.recommendations.baseline_windows,
        }
    }

    pub fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig {
            base_url: self.classifier.base_url.clone(),
            model: self.classifier.model.clone(),
            api_key: std::env::var(&self.classifier.api_key_env).ok(),
            confidence_threshold: self.classifier.confidence_threshold,
            timeout: StdDuration::from_secs(self.classifier.timeout_seconds),
        }
    }

    pub fn tick_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.scheduler.tick_seconds.max(1))
    }
}

pub fn minder_home() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".minder"))
}

pub fn ensure_minder_home() -> Result<PathBuf> {
    let dir = minder_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_minder_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    Ok(toml::from_str(&s).context("parse config.toml")?)
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<PathBuf> {
    let p = config_path()?;
    if !p.exists() {
        save_config(&Config::default())?;
    }
    Ok(p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_toml() {
        let cfg = Config::default();
        let s = toml::to_string_pretty(&cfg).unwrap();
        let back: Config = toml::from_str(&s).unwrap();
        assert_eq!(back.classifier.confidence_threshold, 0.6);
        assert_eq!(back.reminders.lead_time_hours, 24);
        assert_eq!(back.recommendations.expense_spike_threshold, 1.3);
        assert_eq!(back.scheduler.tick_seconds, 60);
    }

    #[test]
    fn policies_map_from_sections() {
        let cfg = Config::default();
        assert_eq!(cfg.reminder_policy().lead_time, Duration::hours(24));
        assert_eq!(cfg.reminder_policy().grace_window, Duration::hours(6));
        assert_eq!(cfg.recommend_policy().trailing_days, 14);
        assert_eq!(cfg.tick_interval(), StdDuration::from_secs(60));
    }
}

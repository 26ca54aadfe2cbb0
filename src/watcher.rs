//! Detects slow or misbehaving API clients via standard-deviation analysis
//! over their recent request latencies.

use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tracing::info;

use crate::client::ClientHealth;

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// The four gauges reported on every tick, all in milliseconds (matching the
/// source's `extra={...}` logging fields).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatcherGauges {
    pub requests_dev_ms: f64,
    pub requests_min_avg_ms: f64,
    pub requests_max_avg_ms: f64,
    pub requests_avg_ms: f64,
}

pub struct PerformanceWatcher {
    pub performance_window: Duration,
    pub watch_interval: Duration,
}

impl PerformanceWatcher {
    pub fn new(performance_window: Duration, watch_interval: Duration) -> Self {
        Self {
            performance_window,
            watch_interval,
        }
    }

    /// Runs one tick: compute per-client means, prune, compute the global
    /// standard-deviation threshold, and flag outliers for cookie-drop.
    pub fn tick(&self, health: &DashMap<String, ClientHealth>) -> WatcherGauges {
        let now = Utc::now();
        let prune_before = now
            - chrono::Duration::from_std(self.performance_window + self.watch_interval)
                .expect("performance_window + watch_interval fits in a chrono::Duration");
        let grown_before = now
            - chrono::Duration::from_std(self.performance_window)
                .expect("performance_window fits in a chrono::Duration");

        let mut values: Vec<f64> = Vec::new();
        for mut entry in health.iter_mut() {
            let info = entry.value_mut();
            if !info.request_durations.is_empty() {
                if let Some(oldest) = info.request_durations.keys().next() {
                    if *oldest <= grown_before {
                        info.grown = true;
                    }
                }
                let sum: f64 = info.request_durations.values().sum();
                let avg = round3(sum / info.request_durations.len() as f64);
                info.avg_duration = avg;
                values.push(avg);
            }
            info.request_durations.retain(|ts, _| *ts >= prune_before);
        }

        let avg = if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        };
        let std = if values.is_empty() {
            0.0
        } else {
            let variance =
                values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
            variance.sqrt()
        };
        let dev = round3(std + avg);

        for mut entry in health.iter_mut() {
            let info = entry.value_mut();
            let slow_and_saturated = info.grown && info.avg_duration > dev;
            let throttled_but_not_slow = info.avg_duration < dev && info.request_interval > 0.0;
            if slow_and_saturated || throttled_but_not_slow {
                info.drop_cookies = true;
            }
        }

        let (min_avg, max_avg) = if values.is_empty() {
            (0.0, 0.0)
        } else {
            (
                values.iter().cloned().fold(f64::INFINITY, f64::min) * 1000.0,
                values.iter().cloned().fold(f64::NEG_INFINITY, f64::max) * 1000.0,
            )
        };

        let gauges = WatcherGauges {
            requests_dev_ms: dev * 1000.0,
            requests_min_avg_ms: min_avg,
            requests_max_avg_ms: max_avg,
            requests_avg_ms: avg * 1000.0,
        };

        info!(
            requests_dev_ms = gauges.requests_dev_ms,
            requests_min_avg_ms = gauges.requests_min_avg_ms,
            requests_max_avg_ms = gauges.requests_max_avg_ms,
            requests_avg_ms = gauges.requests_avg_ms,
            "performance watcher tick"
        );

        gauges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn health_with_durations(samples: &[(i64, f64)]) -> ClientHealth {
        let now = Utc::now();
        let mut request_durations = BTreeMap::new();
        for (seconds_ago, duration) in samples {
            request_durations.insert(now - chrono::Duration::seconds(*seconds_ago), *duration);
        }
        ClientHealth {
            request_durations,
            ..ClientHealth::default()
        }
    }

    #[test]
    fn zero_samples_reports_zero_gauges_without_panicking() {
        let health = DashMap::new();
        health.insert("a".to_string(), ClientHealth::default());
        let watcher = PerformanceWatcher::new(Duration::from_secs(60), Duration::from_secs(10));

        let gauges = watcher.tick(&health);

        assert_eq!(gauges.requests_dev_ms, 0.0);
        assert_eq!(gauges.requests_min_avg_ms, 0.0);
        assert_eq!(gauges.requests_max_avg_ms, 0.0);
        assert_eq!(gauges.requests_avg_ms, 0.0);
    }

    #[test]
    fn prunes_entries_older_than_window_plus_interval() {
        let health = DashMap::new();
        health.insert(
            "a".to_string(),
            health_with_durations(&[(1000, 0.2), (5, 0.1)]),
        );
        let watcher = PerformanceWatcher::new(Duration::from_secs(60), Duration::from_secs(10));

        watcher.tick(&health);

        let info = health.get("a").unwrap();
        assert_eq!(info.request_durations.len(), 1);
    }

    #[test]
    fn flags_slow_client_once_window_is_saturated() {
        let health = DashMap::new();
        // Three fast clients, fully grown (sample at exactly performance_window ago).
        for name in ["fast-1", "fast-2", "fast-3"] {
            health.insert(name.to_string(), health_with_durations(&[(60, 0.1)]));
        }
        // One slow client, also fully grown.
        health.insert("slow".to_string(), health_with_durations(&[(60, 0.9)]));

        let watcher = PerformanceWatcher::new(Duration::from_secs(60), Duration::from_secs(10));
        watcher.tick(&health);

        assert!(health.get("slow").unwrap().drop_cookies);
        for name in ["fast-1", "fast-2", "fast-3"] {
            assert!(!health.get(name).unwrap().drop_cookies);
        }
    }

    #[test]
    fn flags_throttled_client_even_when_not_slow() {
        let health = DashMap::new();
        let mut throttled = health_with_durations(&[(5, 0.1)]);
        throttled.request_interval = 2.0;
        health.insert("throttled".to_string(), throttled);

        let watcher = PerformanceWatcher::new(Duration::from_secs(60), Duration::from_secs(10));
        watcher.tick(&health);

        assert!(health.get("throttled").unwrap().drop_cookies);
    }

    #[test]
    fn grown_flag_is_sticky_even_after_the_window_drains_back_down() {
        let health = DashMap::new();
        health.insert(
            "a".to_string(),
            health_with_durations(&[(60, 0.1)]),
        );
        let watcher = PerformanceWatcher::new(Duration::from_secs(60), Duration::from_secs(10));

        watcher.tick(&health);
        assert!(health.get("a").unwrap().grown);

        // A fresh sample replaces the old one, draining the window back down,
        // but `grown` must stay set rather than flip back to false.
        health.get_mut("a").unwrap().request_durations =
            health_with_durations(&[(1, 0.1)]).request_durations;
        watcher.tick(&health);
        assert!(health.get("a").unwrap().grown);
    }
}

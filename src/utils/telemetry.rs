// file: src/utils/telemetry.rs
// description: operation timing and component health reporting
// reference: used by the analyze, scan and verify commands

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    fn icon(&self) -> &'static str {
        match self {
            Self::Healthy => "✓",
            Self::Degraded => "⚠",
            Self::Unhealthy => "✗",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub component: String,
    pub status: HealthStatus,
    pub message: Option<String>,
    pub response_time_ms: u64,
}

impl HealthCheck {
    pub fn new(
        component: &str,
        status: HealthStatus,
        message: Option<String>,
        response_time: Duration,
    ) -> Self {
        Self {
            component: component.to_string(),
            status,
            message,
            response_time_ms: response_time.as_millis() as u64,
        }
    }

    pub fn healthy(component: &str, response_time: Duration) -> Self {
        Self::new(component, HealthStatus::Healthy, None, response_time)
    }

    pub fn degraded(component: &str, message: String, response_time: Duration) -> Self {
        Self::new(component, HealthStatus::Degraded, Some(message), response_time)
    }

    pub fn unhealthy(component: &str, message: String, response_time: Duration) -> Self {
        Self::new(component, HealthStatus::Unhealthy, Some(message), response_time)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub overall_status: HealthStatus,
    pub checks: Vec<HealthCheck>,
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

impl HealthReport {
    /// The overall status is the worst status of any check.
    pub fn new(checks: Vec<HealthCheck>, version: &str) -> Self {
        let overall_status = checks
            .iter()
            .map(|check| check.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);

        Self {
            overall_status,
            checks,
            generated_at: chrono::Utc::now(),
            version: version.to_string(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.overall_status == HealthStatus::Healthy
    }

    pub fn format(&self) -> String {
        let mut output = format!(
            "{} System Health: {:?}\nVersion: {}\nGenerated: {}\n\n",
            self.overall_status.icon(),
            self.overall_status,
            self.version,
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        for check in &self.checks {
            output.push_str(&format!(
                "{} {} ({:?}) - {}ms\n",
                check.status.icon(),
                check.component,
                check.status,
                check.response_time_ms
            ));
            if let Some(message) = &check.message {
                output.push_str(&format!("  {}\n", message));
            }
        }

        output
    }
}

/// Logs the start and end of a named operation.
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        info!("Starting {}", operation);
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        info!("Finished {} in {:.2}s", self.operation, elapsed.as_secs_f64());
        elapsed
    }

    pub fn finish_with_items(self, items: usize) -> Duration {
        let elapsed = self.elapsed();
        info!(
            "Finished {} in {:.2}s, {} items extracted",
            self.operation,
            elapsed.as_secs_f64(),
            items
        );
        elapsed
    }

    pub fn warn_if_slow(&self, threshold: Duration) {
        let elapsed = self.elapsed();
        if elapsed > threshold {
            warn!(
                "{} is slow: {:.1}s so far (threshold {:.1}s)",
                self.operation,
                elapsed.as_secs_f64(),
                threshold.as_secs_f64()
            );
        }
    }
}

//! Human-readable descriptions and remediation suggestions

use crate::models::Severity;

/// Marker prepended to the recommendations of critical anomalies
pub const URGENT_MARKER: &str = "IMMEDIATE ACTION REQUIRED";

/// Deterministic anomaly narration keyed by metric name
#[derive(Debug, Clone, Copy, Default)]
pub struct Narrator;

impl Narrator {
    pub fn describe(&self, metric: &str, value: f64, score: f64) -> String {
        match metric {
            "cpu" => format!(
                "CPU usage anomaly detected in {}: {:.1}% (anomaly score: {:.2})",
                metric, value, score
            ),
            "memory" => format!(
                "Memory usage anomaly detected in {}: {:.1}% (anomaly score: {:.2})",
                metric, value, score
            ),
            "disk" => format!(
                "Disk usage anomaly detected in {}: {:.1}% (anomaly score: {:.2})",
                metric, value, score
            ),
            "network" => format!(
                "Network I/O anomaly detected in {}: {:.1} MB/s (anomaly score: {:.2})",
                metric, value, score
            ),
            "response_time" => format!(
                "Response time anomaly detected in {}: {:.1}ms (anomaly score: {:.2})",
                metric, value, score
            ),
            _ => format!("Anomaly detected in {}: {:.1} (score: {:.2})", metric, value, score),
        }
    }

    pub fn recommend(&self, metric: &str, severity: Severity) -> Vec<String> {
        let base: &[&str] = match metric {
            "cpu" => &[
                "Check for runaway processes",
                "Consider scaling up instances",
                "Review recent deployments",
                "Monitor application performance",
            ],
            "memory" => &[
                "Check for memory leaks",
                "Review application memory usage",
                "Consider increasing instance memory",
                "Restart affected services if necessary",
            ],
            "disk" => &[
                "Clean up temporary files",
                "Archive old logs",
                "Check for large files",
                "Consider adding storage capacity",
            ],
            "network" => &[
                "Check network connectivity",
                "Review bandwidth usage",
                "Monitor for DDoS attacks",
                "Verify load balancer configuration",
            ],
            "response_time" => &[
                "Check database performance",
                "Review application logs",
                "Monitor external dependencies",
                "Consider caching strategies",
            ],
            _ => &["Investigate the anomaly"],
        };

        let mut recommendations = Vec::with_capacity(base.len() + 1);
        if severity == Severity::Critical {
            recommendations.push(URGENT_MARKER.to_string());
        }
        recommendations.extend(base.iter().map(|r| r.to_string()));
        recommendations
    }
}

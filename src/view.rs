//! Presentation view-models.
//!
//! Built from immutable snapshots of a session; rendering never holds a lock
//! across formatting.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::polling::stats::{BreakerState, Stamped};
use crate::session::Session;
use crate::telemetry::format::{
    classify_breaker, classify_health, classify_latency, format_count, format_error_rate, format_latency,
    short_backend_name, BreakerBucket, HealthBucket, LatencyBucket,
};
use crate::telemetry::{HistorySummary, ReplicaId};

/// One replica as shown on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaCard {
    pub id: ReplicaId,
    pub name: String,
    pub latency: String,
    pub latency_bucket: LatencyBucket,
    pub error_rate: String,
    pub health: HealthBucket,
    pub last_checked: DateTime<Utc>,
    pub trend: Option<HistorySummary>,
}

/// One backend row of the circuit breaker panel.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerRow {
    pub name: String,
    pub state: BreakerState,
    pub bucket: BreakerBucket,
    pub failure_count: String,
    pub error_rate: String,
}

/// Label/value lines of an aggregate panel, plus when it was last refreshed.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub lines: Vec<(&'static str, String)>,
    pub fetched_at: DateTime<Utc>,
}

/// Everything the dashboard shows at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub replicas: Vec<ReplicaCard>,
    pub alive: usize,
    pub rate_limit: Option<Panel>,
    pub load_balancer: Option<Panel>,
    pub breakers: Option<(Vec<BreakerRow>, DateTime<Utc>)>,
}

impl DashboardView {
    pub fn build(session: &Session) -> Self {
        let records = session.registry_snapshot();

        let replicas: Vec<ReplicaCard> = records
            .iter()
            .map(|r| ReplicaCard {
                id: r.id,
                name: short_backend_name(&r.url),
                latency: format_latency(r.ema_ms),
                latency_bucket: classify_latency(r.ema_ms),
                error_rate: format_error_rate(r.error_rate),
                health: classify_health(r.alive),
                last_checked: r.last_checked,
                trend: session.history_summary(r.id),
            })
            .collect();
        let alive = records.iter().filter(|r| r.alive).count();

        let aggregates = session.aggregates();

        let rate_limit = aggregates.rate_limit().map(|stamped| {
            let rl = &stamped.value;
            let mut lines = vec![
                ("status", if rl.enabled { "active" } else { "inactive" }.to_string()),
                ("type", rl.kind.clone()),
                ("global limit", format_count(rl.global_limit)),
                ("per-IP limit", format_count(rl.per_ip_limit)),
                ("active IPs", format_count(rl.active_ips)),
            ];
            if let Some(tokens) = rl.global_tokens {
                lines.push(("global tokens", format_count(tokens)));
            }
            panel(lines, &stamped)
        });

        let load_balancer = aggregates.load_balancer().map(|stamped| {
            let lb = &stamped.value;
            let mut lines = Vec::new();
            if let Some(algorithm) = &lb.algorithm {
                lines.push(("algorithm", algorithm.clone()));
            }
            if let Some(active) = lb.active_backends {
                lines.push(("active backends", format_count(active)));
            }
            if let Some(total) = lb.total_requests {
                lines.push(("total requests", format_count(total)));
            }
            if let Some(avg) = lb.avg_response_time {
                lines.push(("avg response", format_latency(avg)));
            }
            if let Some(rpm) = lb.requests_per_minute {
                lines.push(("requests/min", format!("{:.1}", rpm)));
            }
            panel(lines, &stamped)
        });

        let breakers = aggregates.circuit_breakers().map(|stamped| {
            let rows = stamped
                .value
                .iter()
                .map(|(url, status)| BreakerRow {
                    name: short_backend_name(url),
                    state: status.state,
                    bucket: classify_breaker(status.state),
                    failure_count: format_count(status.failure_count),
                    error_rate: format_error_rate(status.error_rate),
                })
                .collect();
            (rows, stamped.fetched_at)
        });

        Self {
            replicas,
            alive,
            rate_limit,
            load_balancer,
            breakers,
        }
    }

    /// Plain-text rendering for a terminal.
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "Replicas ({}/{} online)", self.alive, self.replicas.len());
        if self.replicas.is_empty() {
            let _ = writeln!(out, "  waiting for data...");
        }
        for card in &self.replicas {
            let _ = write!(
                out,
                "  #{:<3} {:<24} {:<7} {:>9} [{}]  err {:>7}",
                card.id,
                card.name,
                card.health,
                card.latency,
                card.latency_bucket,
                card.error_rate
            );
            if let Some(trend) = &card.trend {
                let _ = write!(
                    out,
                    "  trend {}..{} avail {:.0}% ({} samples)",
                    format_latency(trend.min_latency),
                    format_latency(trend.max_latency),
                    trend.availability * 100.0,
                    trend.samples
                );
            }
            let _ = writeln!(out);
        }

        render_panel(&mut out, "Rate Limiting", self.rate_limit.as_ref());
        render_panel(&mut out, "Load Balancer", self.load_balancer.as_ref());

        let _ = writeln!(out, "Circuit Breakers");
        match &self.breakers {
            None => {
                let _ = writeln!(out, "  no data yet");
            }
            Some((rows, fetched_at)) => {
                if rows.is_empty() {
                    let _ = writeln!(out, "  no circuit breakers configured");
                }
                for row in rows {
                    let _ = writeln!(
                        out,
                        "  {:<24} {:<10} [{}]  failures {:<4} err {}",
                        row.name,
                        row.state.as_str().to_uppercase(),
                        row.bucket,
                        row.failure_count,
                        row.error_rate
                    );
                }
                let _ = writeln!(out, "  (updated {})", fetched_at.format("%H:%M:%S"));
            }
        }

        out
    }
}

fn panel<T>(lines: Vec<(&'static str, String)>, stamped: &Stamped<T>) -> Panel {
    Panel {
        lines,
        fetched_at: stamped.fetched_at,
    }
}

fn render_panel(out: &mut String, title: &str, panel: Option<&Panel>) {
    let _ = writeln!(out, "{}", title);
    match panel {
        None => {
            let _ = writeln!(out, "  no data yet");
        }
        Some(panel) => {
            for (label, value) in &panel.lines {
                let _ = writeln!(out, "  {:<16} {}", label, value);
            }
            let _ = writeln!(out, "  (updated {})", panel.fetched_at.format("%H:%M:%S"));
        }
    }
}

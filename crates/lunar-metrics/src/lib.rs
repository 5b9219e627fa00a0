// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Process-wide in-memory metrics and audit log.
//!
//! One [`MetricsRegistry`] is constructed at gateway startup and shared
//! (via `Arc`) by every layer that wants to record a counter, gauge, or
//! timed histogram sample. There is no teardown during normal operation.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const HISTOGRAM_CAPACITY: usize = 1000;
const AUDIT_CAPACITY: usize = 1000;

/// One entry in the bounded audit ring buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub ts: DateTime<Utc>,
    pub tool: String,
    pub args: serde_json::Value,
    pub allowed: bool,
    pub reason: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramSummary {
    pub count: usize,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub avg: f64,
}

struct Histogram {
    samples: Vec<f64>,
    next: usize,
}

impl Histogram {
    fn new() -> Self {
        Self { samples: Vec::with_capacity(HISTOGRAM_CAPACITY), next: 0 }
    }

    fn record(&mut self, value: f64) {
        if self.samples.len() < HISTOGRAM_CAPACITY {
            self.samples.push(value);
        } else {
            self.samples[self.next] = value;
            self.next = (self.next + 1) % HISTOGRAM_CAPACITY;
        }
    }

    fn summary(&self) -> HistogramSummary {
        if self.samples.is_empty() {
            return HistogramSummary { count: 0, p50: 0.0, p95: 0.0, p99: 0.0, avg: 0.0 };
        }
        let mut sorted = self.samples.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let pct = |p: f64| -> f64 {
            let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
            sorted[idx.min(sorted.len() - 1)]
        };
        let avg = sorted.iter().sum::<f64>() / sorted.len() as f64;
        HistogramSummary { count: sorted.len(), p50: pct(0.5), p95: pct(0.95), p99: pct(0.99), avg }
    }
}

#[derive(Default)]
struct Inner {
    counters: HashMap<String, u64>,
    gauges: HashMap<String, f64>,
    histograms: HashMap<String, Histogram>,
    audit: Vec<AuditEntry>,
    audit_next: usize,
}

/// Process-wide store of counters, gauges, histograms, and the audit log.
pub struct MetricsRegistry {
    inner: Mutex<Inner>,
    started_at: DateTime<Utc>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner::default()), started_at: Utc::now() }
    }

    pub fn incr_counter(&self, name: &str) {
        self.incr_counter_by(name, 1);
    }

    pub fn incr_counter_by(&self, name: &str, by: u64) {
        let mut inner = self.inner.lock().unwrap();
        *inner.counters.entry(name.to_string()).or_insert(0) += by;
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.inner.lock().unwrap().counters.get(name).copied().unwrap_or(0)
    }

    pub fn set_gauge(&self, name: &str, value: f64) {
        self.inner.lock().unwrap().gauges.insert(name.to_string(), value);
    }

    pub fn gauge(&self, name: &str) -> f64 {
        self.inner.lock().unwrap().gauges.get(name).copied().unwrap_or(0.0)
    }

    pub fn observe(&self, name: &str, value_ms: f64) {
        let mut inner = self.inner.lock().unwrap();
        inner.histograms.entry(name.to_string()).or_insert_with(Histogram::new).record(value_ms);
    }

    pub fn histogram(&self, name: &str) -> HistogramSummary {
        self.inner
            .lock()
            .unwrap()
            .histograms
            .get(name)
            .map(|h| h.summary())
            .unwrap_or(HistogramSummary { count: 0, p50: 0.0, p95: 0.0, p99: 0.0, avg: 0.0 })
    }

    pub fn record_audit(&self, entry: AuditEntry) {
        let mut inner = self.inner.lock().unwrap();
        if inner.audit.len() < AUDIT_CAPACITY {
            inner.audit.push(entry);
        } else {
            let next = inner.audit_next;
            inner.audit[next] = entry;
            inner.audit_next = (next + 1) % AUDIT_CAPACITY;
        }
    }

    pub fn recent_audit(&self, limit: usize) -> Vec<AuditEntry> {
        let inner = self.inner.lock().unwrap();
        let len = inner.audit.len();
        let start = len.saturating_sub(limit);
        inner.audit[start..].to_vec()
    }

    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }

    /// Snapshot of every counter/gauge/histogram, for the `/api/metrics` endpoint.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock().unwrap();
        MetricsSnapshot {
            counters: inner.counters.clone(),
            gauges: inner.gauges.clone(),
            histograms: inner.histograms.iter().map(|(k, v)| (k.clone(), v.summary())).collect(),
        }
    }

    /// `degraded` when `llm_errors_total / max(llm_calls_total,1) >= 0.05`.
    pub fn health(&self) -> HealthSnapshot {
        let calls = self.counter("llm_calls_total").max(1);
        let errors = self.counter("llm_errors_total");
        let error_rate = errors as f64 / calls as f64;
        let status = if error_rate >= 0.05 { "degraded" } else { "healthy" };
        HealthSnapshot {
            status: status.to_string(),
            latency_ms: self.histogram("llm_call_duration_ms").avg,
            error_rate,
            uptime_secs: self.uptime_secs(),
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub counters: HashMap<String, u64>,
    pub gauges: HashMap<String, f64>,
    pub histograms: HashMap<String, HistogramSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub status: String,
    pub latency_ms: f64,
    pub error_rate: f64,
    pub uptime_secs: i64,
}

//! Observability counters.
//!
//! Uses atomic counters so every session task can record without locking. One
//! instance lives in the server context.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Metrics collector for session, transfer and world-object activity
#[derive(Debug)]
pub struct Metrics {
    /// Total connections accepted
    pub connections_total: AtomicU64,
    /// Currently open connections
    pub connections_active: AtomicU64,
    /// Successful logins
    pub logins_success: AtomicU64,
    /// Handshakes answered with a failure response
    pub logins_failed: AtomicU64,
    /// Packets routed to a handler
    pub packets_received: AtomicU64,
    /// Packets queued for sending
    pub packets_sent: AtomicU64,
    /// Transfers started in either direction
    pub transfers_started: AtomicU64,
    /// Transfers finalized in either direction
    pub transfers_completed: AtomicU64,
    /// Rejections sent back to requesters
    pub rejections: AtomicU64,
    /// Connections dropped for protocol violations
    pub protocol_violations: AtomicU64,
    /// Reward notifications sent by the periodic tick
    pub reward_packets: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            logins_success: AtomicU64::new(0),
            logins_failed: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
            transfers_started: AtomicU64::new(0),
            transfers_completed: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
            protocol_violations: AtomicU64::new(0),
            reward_packets: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn connection_opened(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn login_succeeded(&self) {
        self.logins_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn login_failed(&self) {
        self.logins_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn packet_received(&self) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn packet_sent(&self) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transfer_started(&self) {
        self.transfers_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transfer_completed(&self) {
        self.transfers_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rejection(&self) {
        self.rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_violation(&self) {
        self.protocol_violations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reward_packet(&self) {
        self.reward_packets.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            logins_success: self.logins_success.load(Ordering::Relaxed),
            logins_failed: self.logins_failed.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            transfers_started: self.transfers_started.load(Ordering::Relaxed),
            transfers_completed: self.transfers_completed.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            protocol_violations: self.protocol_violations.load(Ordering::Relaxed),
            reward_packets: self.reward_packets.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_total = snapshot.connections_total,
            connections_active = snapshot.connections_active,
            logins_success = snapshot.logins_success,
            logins_failed = snapshot.logins_failed,
            packets_received = snapshot.packets_received,
            packets_sent = snapshot.packets_sent,
            transfers_started = snapshot.transfers_started,
            transfers_completed = snapshot.transfers_completed,
            rejections = snapshot.rejections,
            protocol_violations = snapshot.protocol_violations,
            reward_packets = snapshot.reward_packets,
            uptime_seconds = snapshot.uptime_seconds,
            "Session metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub logins_success: u64,
    pub logins_failed: u64,
    pub packets_received: u64,
    pub packets_sent: u64,
    pub transfers_started: u64,
    pub transfers_completed: u64,
    pub rejections: u64,
    pub protocol_violations: u64,
    pub reward_packets: u64,
    pub uptime_seconds: u64,
}

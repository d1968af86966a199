//! Score-ranked gateway selection.
//!
//! The selector filters out gateways inside their failure cooldown, ranks the
//! remainder by health score, and returns the top candidate. Equal scores
//! resolve in configuration order, so the gateway list doubles as a priority
//! list when nothing has history yet.
//!
//! When every gateway is failed, behavior follows the
//! `fail_open_on_total_outage` policy: either clear all flags and start over
//! with the full set, or select nothing and let the caller fall back.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

use crate::health::GatewayHealth;

/// One gateway with its score at ranking time.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedGateway {
    pub base: String,
    pub score: f64,
}

/// Ranks `candidates` by health score, best first.
///
/// The sort is stable, so candidates with equal scores keep their input
/// order.
pub fn rank_gateways(
    health: &GatewayHealth,
    candidates: &[String],
    now_ms: u64,
) -> Vec<RankedGateway> {
    let mut ranked: Vec<RankedGateway> = candidates
        .iter()
        .map(|base| RankedGateway {
            base: base.clone(),
            score: health.score(base, now_ms),
        })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}

/// Picks the gateway to route a resolution through.
#[derive(Debug)]
pub struct GatewaySelector {
    gateways: Vec<String>,
    fail_open_on_total_outage: bool,
    rr_cursor: AtomicU64,
}

impl GatewaySelector {
    pub fn new(gateways: Vec<String>, fail_open_on_total_outage: bool) -> Self {
        Self {
            gateways,
            fail_open_on_total_outage,
            rr_cursor: AtomicU64::new(0),
        }
    }

    /// Overrides the starting position of the round-robin fallback cursor.
    pub fn with_rr_start(mut self, start: u64) -> Self {
        self.rr_cursor = AtomicU64::new(start);
        self
    }

    pub fn gateways(&self) -> &[String] {
        &self.gateways
    }

    /// Picks the healthiest gateway base, or `None` when nothing is usable.
    pub fn select(&self, health: &GatewayHealth, now_ms: u64) -> Option<String> {
        if self.gateways.is_empty() {
            return None;
        }

        let mut candidates: Vec<String> = self
            .gateways
            .iter()
            .filter(|base| !health.is_failed(base, now_ms))
            .cloned()
            .collect();

        if candidates.is_empty() {
            if !self.fail_open_on_total_outage {
                return None;
            }
            warn!(
                gateways = self.gateways.len(),
                "All gateways inside failure cooldown; failing open and clearing flags"
            );
            health.clear_failed_flags();
            candidates = self.gateways.clone();
        }

        let ranked = rank_gateways(health, &candidates, now_ms);
        if let Some(top) = ranked.first()
            && top.score.is_finite()
        {
            return Some(top.base.clone());
        }

        // Non-finite scores cannot be ordered; rotate through the candidates
        let picked = self.round_robin(&candidates);
        if let Some(gateway) = &picked {
            warn!(%gateway, "Gateway ranking produced no usable order; using round-robin");
        }
        picked
    }

    /// Fallback rotation over `candidates`, advancing the shared cursor.
    pub fn round_robin(&self, candidates: &[String]) -> Option<String> {
        if candidates.is_empty() {
            return None;
        }
        let idx = self.rr_cursor.fetch_add(1, Ordering::Relaxed) as usize % candidates.len();
        Some(candidates[idx].clone())
    }
}

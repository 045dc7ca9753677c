use serde::{Deserialize, Serialize};

/// Accepted/rejected tally for one move category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveStats {
    pub accepted: u64,
    pub rejected: u64,
}

impl MoveStats {
    pub fn accept(&mut self) {
        self.accepted += 1;
    }

    pub fn reject(&mut self) {
        self.rejected += 1;
    }

    pub fn attempted(&self) -> u64 {
        self.accepted + self.rejected
    }

    /// Acceptance ratio; zero when nothing was attempted.
    pub fn acceptance(&self) -> f64 {
        let attempted = self.attempted();
        if attempted == 0 {
            0.0
        } else {
            self.accepted as f64 / attempted as f64
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Per-type counters for single-particle trial moves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialMoveCounters {
    pub translate: MoveStats,
    pub rotate: MoveStats,
}

impl TrialMoveCounters {
    pub fn reset(&mut self) {
        self.translate.reset();
        self.rotate.reset();
    }
}

/// Event-chain statistics.
///
/// Every started chain resolves to exactly one outcome: it either found at
/// least one collision partner or it swept its whole budget through free
/// space, so `chain_at_collision_count + chain_no_collision_count ==
/// chain_start_count` over any run segment. `collision_count` additionally
/// tallies every individual momentum transfer within chains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NecCounters {
    pub chain_start_count: u64,
    pub chain_at_collision_count: u64,
    pub chain_no_collision_count: u64,
    pub collision_count: u64,
    pub distance_queries: u64,
    pub overlap_errors: u64,
}

impl NecCounters {
    pub fn chain_events(&self) -> u64 {
        self.chain_at_collision_count + self.chain_no_collision_count
    }

    /// Mean number of momentum transfers per started chain.
    pub fn particles_per_chain(&self) -> f64 {
        if self.chain_start_count == 0 {
            0.0
        } else {
            self.collision_count as f64 / self.chain_start_count as f64
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Geometric cluster move statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterCounters {
    pub pivot: MoveStats,
    pub reflection: MoveStats,
    pub swap: MoveStats,
}

impl ClusterCounters {
    pub fn reset(&mut self) {
        self.pivot.reset();
        self.reflection.reset();
        self.swap.reset();
    }
}

/// Box move statistics, one entry per move category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxCounters {
    pub volume: MoveStats,
    pub ln_volume: MoveStats,
    pub length: MoveStats,
    pub shear: MoveStats,
    pub aspect: MoveStats,
}

impl BoxCounters {
    pub fn reset(&mut self) {
        self.volume.reset();
        self.ln_volume.reset();
        self.length.reset();
        self.shear.reset();
        self.aspect.reset();
    }
}

/// Implicit-depletant insertion statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepletantCounters {
    pub insert_count: u64,
    pub insert_failures: u64,
}

impl DepletantCounters {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

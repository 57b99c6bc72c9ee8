//! Credit-based slot allocation.
//!
//! Every round each active item first accrues its current weight as credit.
//! Slots are then granted one at a time to the eligible item (credit of at least
//! one) that is furthest behind its share, i.e. with the largest credit per unit
//! of weight. Ties go to the heavier item, then to the earlier registration.
//! Each grant consumes one unit of credit, so an item can win several slots in
//! one round but never more than the round's budget.
//!
//! Ranking by credit per unit of weight is what makes long-run throughput
//! proportional to weight when demand exceeds supply; with equal weights it is
//! the same as ranking by raw credit.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::core::weight::effective_weight;

/// Tolerance applied to the eligibility threshold so that fractional weights
/// that add up to a whole slot are not lost to float rounding.
pub const CREDIT_EPSILON: f64 = 1e-9;

/// How an item's evaluated weight is combined with its leftover credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccumulationPolicy {
    /// `credit += weight`; unconsumed credit carries into the next round.
    Accumulate,
    /// `credit = weight`; this round's weight replaces any leftover credit.
    Overwrite,
}

/// One item's view for a single allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Contender {
    /// Weight evaluated for this round.
    pub weight: f64,
    /// Credit carried in; updated in place by the allocator.
    pub credit: f64,
    /// Accrual policy.
    pub policy: AccumulationPolicy,
    /// Registration order, lower is earlier.
    pub order: u64,
}

impl Contender {
    /// Contender with zero credit.
    #[must_use]
    pub const fn new(weight: f64, policy: AccumulationPolicy, order: u64) -> Self {
        Self {
            weight,
            credit: 0.0,
            policy,
            order,
        }
    }

    fn eligible(&self) -> bool {
        self.weight > 0.0 && self.credit + CREDIT_EPSILON >= 1.0
    }

    /// Whether repeated accrual alone can make this contender eligible.
    fn can_reach_threshold(&self) -> bool {
        match self.policy {
            AccumulationPolicy::Accumulate => self.weight > 0.0,
            AccumulationPolicy::Overwrite => self.weight + CREDIT_EPSILON >= 1.0,
        }
    }

    fn accrue(&mut self) {
        self.weight = effective_weight(self.weight);
        match self.policy {
            AccumulationPolicy::Accumulate => self.credit += self.weight,
            AccumulationPolicy::Overwrite => self.credit = self.weight,
        }
    }
}

/// Result of allocating one round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allocation {
    /// Executions granted, index-aligned with the contenders.
    pub counts: Vec<u32>,
    /// Contender index of every grant, in the order the grants were made.
    pub sequence: Vec<usize>,
    /// Sum of `counts`.
    pub granted: u32,
    /// Accrual passes performed.
    pub passes: u32,
}

impl Allocation {
    fn empty(len: usize) -> Self {
        Self {
            counts: vec![0; len],
            sequence: Vec::new(),
            granted: 0,
            passes: 0,
        }
    }
}

/// Heap entry ordering eligible contenders (highest priority first).
struct Ranked {
    index: usize,
    share: f64,
    weight: f64,
    order: u64,
}

impl Ranked {
    fn of(index: usize, contender: &Contender) -> Self {
        Self {
            index,
            share: contender.credit / contender.weight,
            weight: contender.weight,
            order: contender.order,
        }
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Ranking by raw credit would break proportionality: with weights {2, 1} and
// one slot per round the heavier item always holds more credit and wins every
// slot.
impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.share
            .total_cmp(&other.share)
            .then_with(|| self.weight.total_cmp(&other.weight))
            // Earlier registration wins (reversed for max-heap)
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// Stateless slot allocator; per-item credit lives with the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotAllocator;

impl SlotAllocator {
    /// Allocate one round: a single accrual pass, then greedy grants until the
    /// budget or the eligible credit runs out. Unused slots are discarded.
    #[must_use]
    pub fn allocate(contenders: &mut [Contender], slots: u32) -> Allocation {
        let mut allocation = Allocation::empty(contenders.len());
        accrue_all(contenders);
        allocation.passes = 1;
        allocation.granted = grant(contenders, slots, &mut allocation);
        allocation
    }

    /// Allocate one round exhaustively: accrual and grant passes repeat until
    /// the budget is spent, no contender has positive weight, no contender can
    /// ever become eligible, or `max_passes` passes have run.
    #[must_use]
    pub fn allocate_exhaustive(
        contenders: &mut [Contender],
        slots: u32,
        max_passes: u32,
    ) -> Allocation {
        let mut allocation = Allocation::empty(contenders.len());
        let mut remaining = slots;
        while remaining > 0 && allocation.passes < max_passes {
            let demand: f64 = contenders.iter().map(|c| effective_weight(c.weight)).sum();
            if demand <= 0.0 {
                break;
            }
            accrue_all(contenders);
            allocation.passes += 1;
            let used = grant(contenders, remaining, &mut allocation);
            remaining -= used;
            allocation.granted += used;
            // Overwriting items below one slot never reach the threshold.
            if used == 0 && !contenders.iter().any(Contender::can_reach_threshold) {
                break;
            }
        }
        allocation
    }
}

fn accrue_all(contenders: &mut [Contender]) {
    for contender in contenders.iter_mut() {
        contender.accrue();
    }
}

fn grant(contenders: &mut [Contender], available: u32, allocation: &mut Allocation) -> u32 {
    let mut heap: BinaryHeap<Ranked> = contenders
        .iter()
        .enumerate()
        .filter(|(_, c)| c.eligible())
        .map(|(i, c)| Ranked::of(i, c))
        .collect();

    let mut granted = 0;
    while granted < available {
        let Some(top) = heap.pop() else {
            break;
        };
        let winner = &mut contenders[top.index];
        winner.credit = (winner.credit - 1.0).max(0.0);
        allocation.counts[top.index] += 1;
        allocation.sequence.push(top.index);
        granted += 1;
        if winner.eligible() {
            heap.push(Ranked::of(top.index, winner));
        }
    }
    granted
}

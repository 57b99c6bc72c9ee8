//! Property tests for the slot allocator over randomized weights.
//!
//! Each round is checked for slot conservation, the per-round cap and credit
//! non-negativity; long runs are checked for weight-proportional throughput.

use prometheus_slot_scheduler::core::{AccumulationPolicy, Contender, SlotAllocator, CREDIT_EPSILON};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_contenders(rng: &mut StdRng, n: usize, range: std::ops::Range<f64>) -> Vec<Contender> {
    (0..n)
        .map(|i| {
            Contender::new(
                rng.random_range(range.clone()),
                AccumulationPolicy::Accumulate,
                i as u64,
            )
        })
        .collect()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn grantable(contenders: &[Contender]) -> u64 {
    contenders
        .iter()
        .filter(|c| c.weight > 0.0)
        .map(|c| (c.credit + c.weight + CREDIT_EPSILON).floor() as u64)
        .sum()
}

#[test]
fn test_round_invariants_hold_for_random_weights() {
    let mut rng = StdRng::seed_from_u64(0x5107);
    for _ in 0..200 {
        let n = rng.random_range(1..8);
        let mut contenders = random_contenders(&mut rng, n, 0.0..3.0);
        for _ in 0..50 {
            let slots = rng.random_range(1..10_u32);
            let demand = grantable(&contenders);

            let allocation = SlotAllocator::allocate(&mut contenders, slots);

            assert!(allocation.granted <= slots);
            assert_eq!(allocation.counts.iter().sum::<u32>(), allocation.granted);
            assert_eq!(allocation.sequence.len(), allocation.granted as usize);
            assert_eq!(u64::from(allocation.granted), demand.min(u64::from(slots)));
            assert!(allocation.counts.iter().all(|&c| c <= slots));
            assert!(contenders.iter().all(|c| c.credit >= 0.0));
        }
    }
}

#[test]
fn test_weights_may_change_between_rounds() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut contenders = random_contenders(&mut rng, 6, 0.0..2.0);
    for _ in 0..500 {
        for c in &mut contenders {
            c.weight = rng.random_range(-1.0..4.0);
        }
        let allocation = SlotAllocator::allocate(&mut contenders, 5);
        assert!(allocation.granted <= 5);
        assert!(contenders.iter().all(|c| c.credit >= 0.0 && c.weight >= 0.0));
    }
}

#[test]
fn test_long_run_share_tracks_weight_under_saturation() {
    const ROUNDS: u32 = 5_000;
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..5 {
        let mut contenders = random_contenders(&mut rng, 5, 0.5..3.0);
        let total: f64 = contenders.iter().map(|c| c.weight).sum();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let slots = total.floor() as u32;
        let mut executed = vec![0_u64; contenders.len()];

        for _ in 0..ROUNDS {
            let allocation = SlotAllocator::allocate(&mut contenders, slots);
            for (sum, count) in executed.iter_mut().zip(&allocation.counts) {
                *sum += u64::from(*count);
            }
        }

        let granted: u64 = executed.iter().sum();
        for (c, &got) in contenders.iter().zip(&executed) {
            #[allow(clippy::cast_precision_loss)]
            let expected = granted as f64 * c.weight / total;
            #[allow(clippy::cast_precision_loss)]
            let error = (got as f64 - expected).abs() / expected;
            assert!(error < 0.05, "weight {}: got {got}, expected {expected:.1}", c.weight);
        }
    }
}

#[test]
fn test_equal_contenders_resolve_in_registration_order() {
    let mut contenders = vec![
        Contender::new(1.0, AccumulationPolicy::Accumulate, 0),
        Contender::new(1.0, AccumulationPolicy::Accumulate, 1),
    ];
    let allocation = SlotAllocator::allocate(&mut contenders, 1);
    assert_eq!(allocation.counts, vec![1, 0]);
    assert_eq!(allocation.sequence, vec![0]);
}

//! Turns raw proportions into integer distribution units.
//!
//! Shares are rescaled so the whole set adds up to `target_sum` of the
//! supply, each one is capped, then floored to whole units. All of it is
//! done on exact rationals in `u128`, so the integers never depend on
//! floating-point representation.
//!
//! The cap is applied after rescaling and whatever it cuts is not handed to
//! anyone else. The allocated total can therefore fall short of the pool,
//! and the remainder stays with the treasury.
//!
//! Rounding is always floor. A sum of floors never exceeds the floor of
//! the sum, so `Σ units ≤ pool_units()` holds for every input.

use serde::Serialize;

use super::calculator::AttributionRecord;
use crate::error::AttributionError;

/// 100% in basis points
pub const MAX_BASIS_POINTS: u32 = 10_000;

/// Upper bound on units per percentage point. A full 10_000 bps pool is
/// `100 * units_per_percent`, which must still fit a u64.
pub const MAX_UNITS_PER_PERCENT: u64 = u64::MAX / 100;

/// How a pool is split among contributors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NormalizerPolicy {
    target_sum_bps: u32,
    per_user_cap_bps: u32,
    units_per_percent: u64,
    pool_units: u64,
    cap_units: u64,
}

impl NormalizerPolicy {
    /// `target_sum_bps`: share of the supply for contributors (9500 = 0.95).
    /// `per_user_cap_bps`: ceiling per user (1000 = 10 percentage points).
    /// `units_per_percent`: units emitted per percentage point of supply.
    pub fn new(
        target_sum_bps: u32,
        per_user_cap_bps: u32,
        units_per_percent: u64,
    ) -> Result<Self, AttributionError> {
        if target_sum_bps > MAX_BASIS_POINTS {
            return Err(AttributionError::InvalidInput(format!(
                "target sum must be at most {} bps, got {}",
                MAX_BASIS_POINTS, target_sum_bps
            )));
        }
        if per_user_cap_bps > MAX_BASIS_POINTS {
            return Err(AttributionError::InvalidInput(format!(
                "per-user cap must be at most {} bps, got {}",
                MAX_BASIS_POINTS, per_user_cap_bps
            )));
        }
        if units_per_percent == 0 || units_per_percent > MAX_UNITS_PER_PERCENT {
            return Err(AttributionError::InvalidInput(format!(
                "units per percent must be in 1..={}, got {}",
                MAX_UNITS_PER_PERCENT, units_per_percent
            )));
        }

        Ok(Self {
            target_sum_bps,
            per_user_cap_bps,
            units_per_percent,
            pool_units: bps_to_units(target_sum_bps, units_per_percent)?,
            cap_units: bps_to_units(per_user_cap_bps, units_per_percent)?,
        })
    }

    pub fn target_sum_bps(&self) -> u32 {
        self.target_sum_bps
    }

    pub fn per_user_cap_bps(&self) -> u32 {
        self.per_user_cap_bps
    }

    pub fn units_per_percent(&self) -> u64 {
        self.units_per_percent
    }

    /// Units available to contributors; the allocated sum never exceeds this
    pub fn pool_units(&self) -> u64 {
        self.pool_units
    }

    /// Most units a single user can receive
    pub fn cap_units(&self) -> u64 {
        self.cap_units
    }
}

impl Default for NormalizerPolicy {
    fn default() -> Self {
        Self {
            target_sum_bps: 9_500,
            per_user_cap_bps: 1_000,
            units_per_percent: 1,
            pool_units: 95,
            cap_units: 10,
        }
    }
}

/// A user's units before the address join
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedShare {
    pub user_id: String,
    pub units: u64,
}

fn bps_to_units(bps: u32, units_per_percent: u64) -> Result<u64, AttributionError> {
    let units = u128::from(bps) * u128::from(units_per_percent) / 100;
    u64::try_from(units).map_err(|_| {
        AttributionError::InvalidInput(format!(
            "{} bps at {} units per percent does not fit in u64",
            bps, units_per_percent
        ))
    })
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

/// Least common denominator of the records' totals. Records from one
/// calculation share a single denominator, which makes this the identity.
fn common_denominator(records: &[AttributionRecord]) -> u128 {
    records
        .iter()
        .filter(|r| r.total_count > 0)
        .fold(1u128, |acc, r| {
            let t = u128::from(r.total_count);
            let g = gcd(acc, t);
            (acc / g)
                .checked_mul(t)
                .expect("attribution denominators exceed fixed-point range")
        })
}

/// Weight of a record over the common denominator
fn weight(record: &AttributionRecord, denominator: u128) -> u128 {
    if record.total_count == 0 {
        return 0;
    }
    u128::from(record.contributed_count)
        .checked_mul(denominator / u128::from(record.total_count))
        .expect("attribution weight exceeds fixed-point range")
}

/// Normalize raw records into capped integer units.
///
/// Output is sorted by descending units, ties by ascending user id. The
/// order is for auditing only. An empty or all-zero input yields an empty
/// list.
pub fn normalize(records: &[AttributionRecord], policy: &NormalizerPolicy) -> Vec<NormalizedShare> {
    let denominator = common_denominator(records);
    let weights: Vec<u128> = records.iter().map(|r| weight(r, denominator)).collect();

    let total: u128 = weights
        .iter()
        .try_fold(0u128, |acc, w| acc.checked_add(*w))
        .expect("attribution total exceeds fixed-point range");
    if total == 0 {
        return vec![];
    }

    // units = floor(w / total * target_bps / 100 * units_per_percent)
    let scale = u128::from(policy.target_sum_bps) * u128::from(policy.units_per_percent);
    let divisor = total
        .checked_mul(100)
        .expect("attribution total exceeds fixed-point range");
    let cap = policy.cap_units();

    let mut shares: Vec<NormalizedShare> = records
        .iter()
        .zip(weights)
        .map(|(record, w)| {
            let scaled = w
                .checked_mul(scale)
                .expect("scaled share exceeds fixed-point range")
                / divisor;
            NormalizedShare {
                user_id: record.user_id.clone(),
                units: u64::try_from(scaled).map_or(cap, |s| s.min(cap)),
            }
        })
        .collect();

    shares.sort_by(|a, b| b.units.cmp(&a.units).then_with(|| a.user_id.cmp(&b.user_id)));
    shares
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user: &str, contributed: u32, total: u32) -> AttributionRecord {
        AttributionRecord {
            user_id: user.to_string(),
            contributed_count: contributed,
            total_count: total,
            raw_proportion: f64::from(contributed) / f64::from(total),
        }
    }

    fn units(shares: &[NormalizedShare]) -> Vec<(&str, u64)> {
        shares.iter().map(|s| (s.user_id.as_str(), s.units)).collect()
    }

    #[test]
    fn test_empty_input_is_noop() {
        assert!(normalize(&[], &NormalizerPolicy::default()).is_empty());
    }

    #[test]
    fn test_all_zero_input_is_noop() {
        let records = vec![record("a", 0, 3)];
        assert!(normalize(&records, &NormalizerPolicy::default()).is_empty());
    }

    #[test]
    fn test_two_thirds_one_third_capped() {
        let records = vec![record("a", 2, 3), record("b", 1, 3)];
        let shares = normalize(&records, &NormalizerPolicy::default());
        assert_eq!(units(&shares), vec![("a", 10), ("b", 10)]);
    }

    #[test]
    fn test_two_thirds_one_third_uncapped_floors() {
        let policy = NormalizerPolicy::new(9_500, 10_000, 1).unwrap();
        let records = vec![record("a", 2, 3), record("b", 1, 3)];
        let shares = normalize(&records, &policy);

        // 63.33.. and 31.66.. floor to 63 and 31
        assert_eq!(units(&shares), vec![("a", 63), ("b", 31)]);
    }

    #[test]
    fn test_dominant_contributor_is_capped() {
        let records = vec![record("whale", 9, 10), record("minnow", 1, 10)];
        let shares = normalize(&records, &NormalizerPolicy::default());

        // whale scales to 85.5, capped at 10; minnow scales to 9.5, floored to 9
        assert_eq!(units(&shares), vec![("whale", 10), ("minnow", 9)]);
    }

    #[test]
    fn test_cap_cut_is_not_redistributed() {
        let records = vec![record("solo", 1, 1)];
        let shares = normalize(&records, &NormalizerPolicy::default());
        assert_eq!(units(&shares), vec![("solo", 10)]);
    }

    #[test]
    fn test_sum_never_exceeds_pool_when_rounding_would_overshoot() {
        // Ten equal shares of 9.5 would round up to 10 each (100 > 95)
        let policy = NormalizerPolicy::default();
        let records: Vec<_> = (0..10).map(|i| record(&format!("u{}", i), 1, 10)).collect();
        let shares = normalize(&records, &policy);

        let sum: u64 = shares.iter().map(|s| s.units).sum();
        assert_eq!(sum, 90);
        assert!(sum <= policy.pool_units());
    }

    #[test]
    fn test_sum_bound_over_many_shapes() {
        let policies = [
            NormalizerPolicy::default(),
            NormalizerPolicy::new(9_500, 10_000, 1).unwrap(),
            NormalizerPolicy::new(9_500, 10_000, 1_000_000_000).unwrap(),
            NormalizerPolicy::new(10_000, 3_333, 7).unwrap(),
        ];

        for policy in &policies {
            for users in 1..=12u32 {
                for total in 1..=9u32 {
                    let records: Vec<_> = (0..users)
                        .map(|u| record(&format!("u{:02}", u), (u * 7 + 3) % total + 1, total))
                        .collect();
                    let shares = normalize(&records, policy);
                    let sum: u64 = shares.iter().map(|s| s.units).sum();
                    assert!(sum <= policy.pool_units(), "{:?} users={} total={}", policy, users, total);
                    assert!(shares.iter().all(|s| s.units <= policy.cap_units()));
                }
            }
        }
    }

    #[test]
    fn test_ties_ordered_by_user_id() {
        let records = vec![record("carol", 1, 4), record("alice", 1, 4), record("bob", 2, 4)];
        let policy = NormalizerPolicy::new(9_500, 10_000, 1).unwrap();
        let shares = normalize(&records, &policy);

        assert_eq!(units(&shares), vec![("bob", 47), ("alice", 23), ("carol", 23)]);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let policy = NormalizerPolicy::new(9_500, 5_000, 1_000).unwrap();
        let forward = vec![record("a", 3, 7), record("b", 1, 7), record("c", 5, 7)];
        let mut reversed = forward.clone();
        reversed.reverse();

        assert_eq!(normalize(&forward, &policy), normalize(&reversed, &policy));
    }

    #[test]
    fn test_units_per_percent_scales_exactly() {
        let policy = NormalizerPolicy::new(9_500, 10_000, 1_000_000).unwrap();
        let records = vec![record("a", 2, 3), record("b", 1, 3)];
        let shares = normalize(&records, &policy);

        // 2/3 * 95_000_000 = 63_333_333.33.., 1/3 * 95_000_000 = 31_666_666.66..
        assert_eq!(units(&shares), vec![("a", 63_333_333), ("b", 31_666_666)]);
        assert_eq!(policy.pool_units(), 95_000_000);
    }

    #[test]
    fn test_mixed_denominators_use_common_base() {
        let policy = NormalizerPolicy::new(10_000, 10_000, 1).unwrap();
        // 1/2 and 1/4: weights 2 and 1 over a denominator of 4
        let records = vec![record("half", 1, 2), record("quarter", 1, 4)];
        let shares = normalize(&records, &policy);
        assert_eq!(units(&shares), vec![("half", 66), ("quarter", 33)]);
    }

    #[test]
    fn test_policy_bounds() {
        assert!(NormalizerPolicy::new(10_001, 1_000, 1).is_err());
        assert!(NormalizerPolicy::new(9_500, 10_001, 1).is_err());
        assert!(NormalizerPolicy::new(9_500, 1_000, 0).is_err());
        assert!(NormalizerPolicy::new(9_500, 1_000, MAX_UNITS_PER_PERCENT + 1).is_err());
        assert!(NormalizerPolicy::new(10_000, 10_000, MAX_UNITS_PER_PERCENT).is_ok());
        assert!(NormalizerPolicy::new(9_500, 10_000, 1_000_000_000_000_000_000).is_err());
    }

    #[test]
    fn test_sum_bound_holds_at_largest_units_per_percent() {
        let policy = NormalizerPolicy::new(9_500, 10_000, MAX_UNITS_PER_PERCENT).unwrap();
        let exact_pool = 9_500u128 * u128::from(MAX_UNITS_PER_PERCENT) / 100;
        assert_eq!(u128::from(policy.pool_units()), exact_pool);

        let records = vec![record("a", 1, 2), record("b", 1, 2)];
        let shares = normalize(&records, &policy);

        let sum: u128 = shares.iter().map(|s| u128::from(s.units)).sum();
        assert!(sum <= u128::from(policy.pool_units()));
        assert!(shares.iter().all(|s| s.units <= policy.cap_units()));
        assert_eq!(u128::from(shares[0].units), exact_pool / 2);

        let full = NormalizerPolicy::new(10_000, 10_000, MAX_UNITS_PER_PERCENT).unwrap();
        let solo = normalize(&[record("solo", 1, 1)], &full);
        assert_eq!(solo[0].units, full.pool_units());
        assert_eq!(full.pool_units(), MAX_UNITS_PER_PERCENT * 100);
    }

    #[test]
    fn test_default_policy_pool_and_cap() {
        let policy = NormalizerPolicy::default();
        assert_eq!(policy.pool_units(), 95);
        assert_eq!(policy.cap_units(), 10);
    }
}

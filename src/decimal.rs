//! Fixed-precision decimal helpers shared by the allocation engine and the conservation
//! checker. No `f64`/`f32` appears anywhere in the propagation path; floats are only ever
//! produced at the read-model boundary when rendering a percentage (spec §9).

use crate::config::RoundingMode;
use crate::error::{EngineErrorKind, EngineResult};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;

/// Adds two decimals, surfacing `ArithmeticOverflow` rather than panicking (spec §4.D).
pub fn checked_add(a: Decimal, b: Decimal) -> EngineResult<Decimal> {
    a.checked_add(b).ok_or_else(|| EngineErrorKind::ArithmeticOverflow.into())
}

/// Round `value` to `scale` decimal places using the configured rounding mode.
pub fn round(value: Decimal, scale: u32, mode: RoundingMode) -> Decimal {
    let strategy = match mode {
        RoundingMode::BankersRounding => RoundingStrategy::MidpointNearestEven,
        RoundingMode::HalfUp => RoundingStrategy::MidpointAwayFromZero,
    };
    value.round_dp_with_strategy(scale, strategy)
}

/// Split `total` among `weights.len()` parties proportionally to `weights`, using the
/// largest-remainder method so the shares sum to exactly `total` at `scale` decimal places
/// (spec §4.D step 2c).
///
/// Falls back to an equal split if every weight is zero. `weights` and the returned vector
/// are in the same order; ties in the remainder ranking are broken by ascending index, which
/// callers arrange to correspond to ascending node id (spec §8 scenario 6: "the parent with
/// the smallest id absorbs the extra cent").
pub fn largest_remainder_split(
    total: Decimal,
    weights: &[Decimal],
    scale: u32,
    mode: RoundingMode,
) -> Vec<Decimal> {
    let n = weights.len();
    if n == 0 {
        return Vec::new();
    }
    let weight_sum: Decimal = weights.iter().sum();
    if weight_sum.is_zero() || total.is_zero() {
        return equal_split(total, n, scale, mode);
    }

    let unit = Decimal::new(1, scale); // smallest unit at this scale, e.g. 0.01
    let raw_shares: Vec<Decimal> = weights
        .iter()
        .map(|w| total * *w / weight_sum)
        .collect();
    let mut floor_shares: Vec<Decimal> = raw_shares
        .iter()
        .map(|s| s.trunc_with_scale(scale))
        .collect();

    let allocated: Decimal = floor_shares.iter().sum();
    let mut remainder = ((total - allocated) / unit).round().to_i64().unwrap_or(0);

    // Distribute the leftover smallest units, largest fractional remainder first, ties
    // broken by ascending index.
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        let rem_a = raw_shares[a] - floor_shares[a];
        let rem_b = raw_shares[b] - floor_shares[b];
        rem_b.cmp(&rem_a).then(a.cmp(&b))
    });

    for &idx in order.iter() {
        if remainder <= 0 {
            break;
        }
        floor_shares[idx] += unit;
        remainder -= 1;
    }

    floor_shares
}

fn equal_split(total: Decimal, n: usize, scale: u32, mode: RoundingMode) -> Vec<Decimal> {
    let unit = Decimal::new(1, scale);
    let share = round(total / Decimal::from(n as u64), scale, mode);
    let mut shares = vec![share; n];
    let allocated: Decimal = shares.iter().sum();
    let mut remainder = ((total - allocated) / unit).round().to_i64().unwrap_or(0);
    let mut idx = 0;
    while remainder != 0 && n > 0 {
        if remainder > 0 {
            shares[idx] += unit;
            remainder -= 1;
        } else {
            shares[idx] -= unit;
            remainder += 1;
        }
        idx = (idx + 1) % n;
    }
    shares
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn equal_split_of_ten_among_three_gives_largest_remainder_to_smallest_index() {
        let shares = largest_remainder_split(
            dec!(10.00),
            &[dec!(1), dec!(1), dec!(1)],
            2,
            RoundingMode::BankersRounding,
        );
        assert_eq!(shares, vec![dec!(3.34), dec!(3.33), dec!(3.33)]);
        assert_eq!(shares.iter().sum::<Decimal>(), dec!(10.00));
    }

    #[test]
    fn proportional_split_with_usage_sums_exactly() {
        let shares = largest_remainder_split(
            dec!(30.00),
            &[dec!(1), dec!(3)],
            2,
            RoundingMode::BankersRounding,
        );
        assert_eq!(shares, vec![dec!(7.50), dec!(22.50)]);
    }

    #[test]
    fn zero_weights_fall_back_to_equal_split() {
        let shares = largest_remainder_split(
            dec!(30.00),
            &[dec!(0), dec!(0)],
            2,
            RoundingMode::BankersRounding,
        );
        assert_eq!(shares, vec![dec!(15.00), dec!(15.00)]);
    }

    #[test]
    fn single_party_receives_the_whole_amount() {
        let shares = largest_remainder_split(dec!(100.00), &[dec!(1)], 2, RoundingMode::BankersRounding);
        assert_eq!(shares, vec![dec!(100.00)]);
    }
}

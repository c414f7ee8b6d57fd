use std::time::Duration;

use rand::Rng;

/// `min(cap, base * 2^exponent)` before jitter.
pub fn ceiling(base: Duration, cap: Duration, exponent: u32) -> Duration {
    let factor = 2u32.saturating_pow(exponent.min(20));
    base.saturating_mul(factor).min(cap)
}

/// Exponential delay with jitter drawn from the upper half of the ceiling.
pub fn delay(base: Duration, cap: Duration, exponent: u32) -> Duration {
    let ceiling = ceiling(base, cap, exponent);
    let millis = ceiling.as_millis() as u64;
    if millis < 2 {
        return ceiling;
    }

    Duration::from_millis(rand::rng().random_range(millis / 2..=millis))
}

/// Exponent for a poll `elapsed` after submission, so polls thin out over time.
pub fn exponent_for_elapsed(base: Duration, elapsed: Duration) -> u32 {
    if base.is_zero() {
        return 0;
    }
    let steps = (elapsed.as_millis() / base.as_millis()) as u64 + 1;
    steps.ilog2()
}

pub fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(365))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceiling_doubles_until_cap() {
        let base = Duration::from_secs(5);
        let cap = Duration::from_secs(60);

        assert_eq!(ceiling(base, cap, 0), Duration::from_secs(5));
        assert_eq!(ceiling(base, cap, 1), Duration::from_secs(10));
        assert_eq!(ceiling(base, cap, 3), Duration::from_secs(40));
        assert_eq!(ceiling(base, cap, 4), Duration::from_secs(60));
        assert_eq!(ceiling(base, cap, 40), Duration::from_secs(60));
    }

    #[test]
    fn jitter_stays_within_half_and_full_ceiling() {
        let base = Duration::from_secs(2);
        let cap = Duration::from_secs(30);

        for exponent in 0..8 {
            let upper = ceiling(base, cap, exponent);
            for _ in 0..50 {
                let value = delay(base, cap, exponent);
                assert!(value <= upper);
                assert!(value >= upper / 2);
            }
        }
    }

    #[test]
    fn elapsed_exponent_grows_logarithmically() {
        let base = Duration::from_secs(10);
        assert_eq!(exponent_for_elapsed(base, Duration::ZERO), 0);
        assert_eq!(exponent_for_elapsed(base, Duration::from_secs(10)), 1);
        assert_eq!(exponent_for_elapsed(base, Duration::from_secs(35)), 2);
        assert_eq!(exponent_for_elapsed(base, Duration::from_secs(75)), 3);
    }
}

//! Per-account execution state

use std::time::Duration;

use chainrun_tasks::{Account, SleepRange, Token};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// State carried across the tasks of one account
#[derive(Debug)]
pub struct ExecutionContext {
    /// Token the latest successful swap ended on
    pub last_token: Token,

    /// Range for waits between tasks, hops and attempts
    pub sleep_range: SleepRange,

    rng: StdRng,
}

impl ExecutionContext {
    /// Fresh context for `account`, seeded from entropy
    pub fn for_account(account: &Account) -> Self {
        Self::with_rng(account.sleep_range, StdRng::from_entropy())
    }

    /// Context with a fixed seed
    pub fn seeded(sleep_range: SleepRange, seed: u64) -> Self {
        Self::with_rng(sleep_range, StdRng::seed_from_u64(seed))
    }

    fn with_rng(sleep_range: SleepRange, rng: StdRng) -> Self {
        Self {
            last_token: Token::Eth,
            sleep_range,
            rng,
        }
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Draw a wait from the sleep range
    pub fn next_delay(&mut self) -> Duration {
        self.sleep_range.sample(&mut self.rng)
    }

    /// Uniform draw from `[a, b]`, bounds in either order
    pub fn uniform(&mut self, a: f64, b: f64) -> f64 {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        if low == high {
            return low;
        }
        self.rng.gen_range(low..=high)
    }

    /// Uniform count from `[a, b]`, bounds in either order
    pub fn count_between(&mut self, a: usize, b: usize) -> usize {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        self.rng.gen_range(low..=high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_accepts_reversed_bounds() {
        let mut ctx = ExecutionContext::seeded(SleepRange::default(), 7);
        for _ in 0..100 {
            let value = ctx.uniform(10.0, 2.0);
            assert!((2.0..=10.0).contains(&value));
        }
        assert_eq!(ctx.uniform(3.0, 3.0), 3.0);
        assert_eq!(ctx.count_between(4, 4), 4);
    }

    #[test]
    fn test_delays_stay_in_range() {
        let mut ctx = ExecutionContext::seeded(SleepRange::new(1.0, 2.0), 7);
        for _ in 0..100 {
            let delay = ctx.next_delay();
            assert!(delay >= Duration::from_secs(1) && delay <= Duration::from_secs(2));
        }
        assert_eq!(ctx.last_token, Token::Eth);
    }
}

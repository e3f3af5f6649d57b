//! Retry accounting for authenticated requests.

/// How many times a rejected request may be replayed after a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::once()
    }
}

impl RetryPolicy {
    /// Refresh-and-retry at most once per request.
    pub const fn once() -> Self {
        Self { max_retries: 1 }
    }

    pub const fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Fresh attempt counter for one logical request.
    pub fn budget(&self) -> RetryBudget {
        RetryBudget {
            remaining: self.max_retries,
        }
    }
}

/// Per-request attempt counter.
#[derive(Debug)]
pub struct RetryBudget {
    remaining: u32,
}

impl RetryBudget {
    /// Take one retry if any is left.
    pub fn try_consume(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_once_allows_single_retry() {
        let mut budget = RetryPolicy::once().budget();
        assert!(budget.try_consume());
        assert!(!budget.try_consume());
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn test_budgets_are_independent() {
        let policy = RetryPolicy::new(2);
        let mut first = policy.budget();
        assert!(first.try_consume());
        assert!(first.try_consume());
        assert!(!first.try_consume());

        assert_eq!(policy.budget().remaining(), 2);
    }
}

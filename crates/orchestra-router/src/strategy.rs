//! Provider selection strategies (C7).

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;

/// Anything the selector can pick among. Kept minimal so `orchestra-router`'s
/// `ProviderEntry` (which also owns health/metrics state) can implement it
/// without the strategy module needing to know about those concerns.
pub trait Candidate {
    fn name(&self) -> &str;
    fn weight(&self) -> f64;
}

#[derive(Debug, Clone)]
pub enum RoutingStrategy {
    Weighted,
    RoundRobin,
    Failover { default_provider: String },
}

/// Picks one candidate from a healthy-filtered slice per the configured
/// strategy. Stateless except for the round-robin cursor.
pub struct Selector {
    strategy: RoutingStrategy,
    round_robin_cursor: AtomicUsize,
}

impl Selector {
    pub fn new(strategy: RoutingStrategy) -> Self {
        Self {
            strategy,
            round_robin_cursor: AtomicUsize::new(0),
        }
    }

    pub fn strategy(&self) -> &RoutingStrategy {
        &self.strategy
    }

    /// `candidates` must already be filtered to healthy providers and any
    /// forced-provider/allow-local override applied by the caller.
    pub fn select<'a, C: Candidate>(&self, candidates: &'a [C]) -> Option<&'a C> {
        if candidates.is_empty() {
            return None;
        }

        match &self.strategy {
            RoutingStrategy::Weighted => self.select_weighted(candidates),
            RoutingStrategy::RoundRobin => self.select_round_robin(candidates),
            RoutingStrategy::Failover { default_provider } => {
                self.select_failover(candidates, default_provider)
            }
        }
    }

    fn select_weighted<'a, C: Candidate>(&self, candidates: &'a [C]) -> Option<&'a C> {
        let total: f64 = candidates.iter().map(Candidate::weight).sum();
        if total <= 0.0 {
            return candidates.first();
        }

        let mut roll = rand::thread_rng().gen_range(0.0..total);
        for candidate in candidates {
            roll -= candidate.weight();
            if roll <= 0.0 {
                return Some(candidate);
            }
        }
        candidates.last()
    }

    fn select_round_robin<'a, C: Candidate>(&self, candidates: &'a [C]) -> Option<&'a C> {
        let index = self.round_robin_cursor.fetch_add(1, Ordering::Relaxed) % candidates.len();
        candidates.get(index)
    }

    fn select_failover<'a, C: Candidate>(
        &self,
        candidates: &'a [C],
        default_provider: &str,
    ) -> Option<&'a C> {
        candidates
            .iter()
            .find(|c| c.name() == default_provider)
            .or_else(|| {
                candidates
                    .iter()
                    .max_by(|a, b| a.weight().partial_cmp(&b.weight()).unwrap_or(std::cmp::Ordering::Equal))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named {
        name: &'static str,
        weight: f64,
    }

    impl Candidate for Named {
        fn name(&self) -> &str {
            self.name
        }
        fn weight(&self) -> f64 {
            self.weight
        }
    }

    #[test]
    fn round_robin_advances_through_all() {
        let selector = Selector::new(RoutingStrategy::RoundRobin);
        let candidates = vec![
            Named { name: "a", weight: 1.0 },
            Named { name: "b", weight: 1.0 },
        ];
        let first = selector.select(&candidates).unwrap().name;
        let second = selector.select(&candidates).unwrap().name;
        let third = selector.select(&candidates).unwrap().name;
        assert_eq!(first, "a");
        assert_eq!(second, "b");
        assert_eq!(third, "a");
    }

    #[test]
    fn failover_prefers_default_when_present() {
        let selector = Selector::new(RoutingStrategy::Failover {
            default_provider: "b".into(),
        });
        let candidates = vec![
            Named { name: "a", weight: 0.9 },
            Named { name: "b", weight: 0.1 },
        ];
        assert_eq!(selector.select(&candidates).unwrap().name, "b");
    }

    #[test]
    fn failover_falls_back_to_highest_weight_when_default_absent() {
        let selector = Selector::new(RoutingStrategy::Failover {
            default_provider: "missing".into(),
        });
        let candidates = vec![
            Named { name: "a", weight: 0.3 },
            Named { name: "b", weight: 0.7 },
        ];
        assert_eq!(selector.select(&candidates).unwrap().name, "b");
    }

    #[test]
    fn weighted_selects_among_candidates() {
        let selector = Selector::new(RoutingStrategy::Weighted);
        let candidates = vec![Named { name: "only", weight: 1.0 }];
        assert_eq!(selector.select(&candidates).unwrap().name, "only");
    }

    #[test]
    fn empty_candidates_yields_none() {
        let selector = Selector::new(RoutingStrategy::RoundRobin);
        let candidates: Vec<Named> = vec![];
        assert!(selector.select(&candidates).is_none());
    }
}

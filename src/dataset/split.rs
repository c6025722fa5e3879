use crate::config::SamplingPolicy;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

/// Partition of piece identifiers into a small test set and the training remainder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitAssignment {
    /// Selection order, may repeat an id under replacement sampling
    test: Vec<String>,
    test_members: HashSet<String>,
    train: Vec<String>,
}

impl SplitAssignment {
    /// Draw `test_size` identifiers with a generator seeded from `seed`.
    ///
    /// Train is every identifier not drawn, in input order.
    pub fn new(ids: &[String], test_size: usize, seed: u64, policy: SamplingPolicy) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let test: Vec<String> = match policy {
            SamplingPolicy::WithoutReplacement => {
                let amount = test_size.min(ids.len());
                if amount < test_size {
                    log::warn!(
                        "test set size {test_size} exceeds the {} available pieces",
                        ids.len()
                    );
                }
                index::sample(&mut rng, ids.len(), amount)
                    .into_iter()
                    .map(|i| ids[i].clone())
                    .collect()
            }
            SamplingPolicy::WithReplacement if ids.is_empty() => Vec::new(),
            SamplingPolicy::WithReplacement => (0..test_size)
                .map(|_| ids[rng.random_range(0..ids.len())].clone())
                .collect(),
        };

        let test_members: HashSet<String> = test.iter().cloned().collect();
        if test_members.len() < test.len() {
            log::warn!(
                "replacement sampling drew {} duplicate test ids, test set has {} distinct pieces",
                test.len() - test_members.len(),
                test_members.len()
            );
        }
        let train = ids
            .iter()
            .filter(|id| !test_members.contains(id.as_str()))
            .cloned()
            .collect();
        Self {
            test,
            test_members,
            train,
        }
    }

    pub fn is_test(&self, id: &str) -> bool {
        self.test_members.contains(id)
    }

    pub fn test_ids(&self) -> &[String] {
        &self.test
    }

    pub fn train_ids(&self) -> &[String] {
        &self.train
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("{i}.midi.txt")).collect()
    }

    #[test]
    fn test_partition_is_disjoint_and_complete() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let all = ids(rng.random_range(0..40));
            let size = rng.random_range(0..15);
            let split = SplitAssignment::new(
                &all,
                size,
                rng.random(),
                SamplingPolicy::WithoutReplacement,
            );
            assert_eq!(split.test_ids().len(), size.min(all.len()));
            assert_eq!(split.train_ids().len() + split.test_ids().len(), all.len());

            let test: HashSet<&String> = split.test_ids().iter().collect();
            let train: HashSet<&String> = split.train_ids().iter().collect();
            assert_eq!(test.len(), split.test_ids().len());
            assert!(test.is_disjoint(&train));
            let union: HashSet<&String> = test.union(&train).copied().collect();
            let expected: HashSet<&String> = all.iter().collect();
            assert_eq!(union, expected);
            for id in &all {
                assert_ne!(split.is_test(id), train.contains(id));
            }
        }
    }

    #[test]
    fn test_split_is_deterministic_for_a_seed() {
        let all = ids(30);
        let a = SplitAssignment::new(&all, 10, 3, SamplingPolicy::WithoutReplacement);
        let b = SplitAssignment::new(&all, 10, 3, SamplingPolicy::WithoutReplacement);
        assert_eq!(a, b);
        let c = SplitAssignment::new(&all, 10, 4, SamplingPolicy::WithoutReplacement);
        assert_ne!(a.test_ids(), c.test_ids());
    }

    #[test]
    fn test_train_keeps_input_order() {
        let all = ids(12);
        let split = SplitAssignment::new(&all, 5, 11, SamplingPolicy::WithoutReplacement);
        let expected: Vec<String> = all.iter().filter(|id| !split.is_test(id)).cloned().collect();
        assert_eq!(split.train_ids(), expected.as_slice());
    }

    #[test]
    fn test_oversized_test_set_takes_everything() {
        let all = ids(4);
        let split = SplitAssignment::new(&all, 10, 0, SamplingPolicy::WithoutReplacement);
        assert_eq!(split.test_ids().len(), 4);
        assert!(split.train_ids().is_empty());
    }

    #[test]
    fn test_replacement_sampling() {
        let all = ids(3);
        let split = SplitAssignment::new(&all, 10, 5, SamplingPolicy::WithReplacement);
        // ten draws from three ids must repeat
        assert_eq!(split.test_ids().len(), 10);
        let distinct: HashSet<&String> = split.test_ids().iter().collect();
        assert!(distinct.len() <= 3);
        for id in split.train_ids() {
            assert!(!split.is_test(id));
        }

        let empty = SplitAssignment::new(&[], 10, 5, SamplingPolicy::WithReplacement);
        assert!(empty.test_ids().is_empty());
        assert!(empty.train_ids().is_empty());
    }
}

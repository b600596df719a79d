//! Replicate pools at the bottom of the composition tree.

use crate::score::BenchResult;
use crate::tree::{ConditionKey, LeafKey};
use std::path::PathBuf;

/// One replicate: a leaf key, its derived seed and what has been produced
/// for it so far.
#[derive(Debug, Clone, PartialEq)]
pub struct Replicate {
    pub key: LeafKey,
    pub seed: u64,
    /// Persisted dataset, once generated or located.
    pub dataset_path: Option<PathBuf>,
    pub result: Option<BenchResult>,
}

impl Replicate {
    pub fn new(key: LeafKey, global_seed: u64) -> Self {
        Self {
            key,
            seed: key.seed(global_seed),
            dataset_path: None,
            result: None,
        }
    }
}

/// A pool of replicates, or a pool of further pools.
#[derive(Debug, Clone, PartialEq)]
pub enum DataPool {
    /// `nrep` replicates of one condition.
    Leaf {
        condition: ConditionKey,
        replicates: Vec<Replicate>,
    },
    /// Children sharing every axis above `axis`.
    Branch { axis: String, children: Vec<DataPool> },
}

impl DataPool {
    /// Leaf pool with replicates `0..nrep`.
    pub fn leaf(condition: ConditionKey, nrep: usize, global_seed: u64) -> Self {
        Self::Leaf {
            condition,
            replicates: (0..nrep)
                .map(|rep| Replicate::new(LeafKey::new(condition, rep), global_seed))
                .collect(),
        }
    }

    pub fn branch(axis: impl Into<String>, children: Vec<DataPool>) -> Self {
        Self::Branch {
            axis: axis.into(),
            children,
        }
    }

    /// Every replicate below this pool, depth first.
    pub fn replicates(&self) -> Vec<&Replicate> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a Replicate>) {
        match self {
            Self::Leaf { replicates, .. } => out.extend(replicates.iter()),
            Self::Branch { children, .. } => children.iter().for_each(|c| c.collect(out)),
        }
    }

    pub fn replicates_mut(&mut self) -> Vec<&mut Replicate> {
        let mut out = Vec::new();
        self.collect_mut(&mut out);
        out
    }

    fn collect_mut<'a>(&'a mut self, out: &mut Vec<&'a mut Replicate>) {
        match self {
            Self::Leaf { replicates, .. } => out.extend(replicates.iter_mut()),
            Self::Branch { children, .. } => children.iter_mut().for_each(|c| c.collect_mut(out)),
        }
    }

    /// Conditions of the leaf pools, depth first.
    pub fn conditions(&self) -> Vec<ConditionKey> {
        match self {
            Self::Leaf { condition, .. } => vec![*condition],
            Self::Branch { children, .. } => children.iter().flat_map(DataPool::conditions).collect(),
        }
    }

    /// Number of replicates below this pool.
    pub fn len(&self) -> usize {
        match self {
            Self::Leaf { replicates, .. } => replicates.len(),
            Self::Branch { children, .. } => children.iter().map(DataPool::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{DispType, OutlierMode, SimulSource};

    fn condition(pde: f64) -> ConditionKey {
        ConditionKey {
            simul_data: SimulSource::Bottomly,
            disp_type: DispType::Same,
            frac_up: 0.9,
            nsample: 3,
            outlier_mode: OutlierMode::Dispersed,
            pde,
        }
    }

    #[test]
    fn test_leaf_seeds_follow_keys() {
        let pool = DataPool::leaf(condition(5.0), 3, 11);
        let reps = pool.replicates();
        assert_eq!(reps.len(), 3);
        for (i, rep) in reps.iter().enumerate() {
            assert_eq!(rep.key.replicate, i);
            assert_eq!(rep.seed, LeafKey::new(condition(5.0), i).seed(11));
        }
    }

    #[test]
    fn test_nested_pools() {
        let mut pool = DataPool::branch(
            "pde",
            vec![
                DataPool::leaf(condition(5.0), 3, 1),
                DataPool::branch("inner", vec![DataPool::leaf(condition(10.0), 4, 1)]),
            ],
        );
        assert_eq!(pool.len(), 7);
        assert_eq!(pool.conditions(), vec![condition(5.0), condition(10.0)]);
        for rep in pool.replicates_mut() {
            rep.dataset_path = Some(PathBuf::from("x"));
        }
        assert!(pool.replicates().iter().all(|r| r.dataset_path.is_some()));
    }
}

//! Sentinel/soft partitioning of contributors
//!
//! Contributors are grouped into sentinels and put in a fixed order. Given the
//! current admission threshold, the first `sentinel_index` sentinels must be
//! scored for every candidate: any document matching none of them is bounded
//! by the starting potential minus their combined maximum differences, which
//! cannot beat the threshold. The remaining (soft) sentinels are only scored
//! while the candidate can still be admitted.

use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::Score;
use crate::error::{Error, Result};
use crate::query::context::ScoringContext;
use crate::query::contributor::Contributor;

/// Ordering criterion for sentinels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortStrategy {
    /// Ascending posting list length
    Length,
    /// Descending maximum difference
    Score,
    /// Hard scorers by length, then estimators by length
    LengthSplit,
    /// Hard scorers by score, then estimators by score
    ScoreSplit,
    /// Alternate length and score orders, length first
    MixedLs,
    /// Alternate score and length orders, score first
    MixedSl,
}

impl SortStrategy {
    pub const ALL: [SortStrategy; 6] = [
        SortStrategy::Length,
        SortStrategy::Score,
        SortStrategy::LengthSplit,
        SortStrategy::ScoreSplit,
        SortStrategy::MixedLs,
        SortStrategy::MixedSl,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SortStrategy::Length => "length",
            SortStrategy::Score => "score",
            SortStrategy::LengthSplit => "length-split",
            SortStrategy::ScoreSplit => "score-split",
            SortStrategy::MixedLs => "mixed-ls",
            SortStrategy::MixedSl => "mixed-sl",
        }
    }
}

impl fmt::Display for SortStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SortStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SortStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::Configuration(format!("unknown sort strategy: {s:?}")))
    }
}

/// Resolved partitioning parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionStrategy {
    pub sort: SortStrategy,
    pub dependency_aware: bool,
}

impl Default for PartitionStrategy {
    fn default() -> Self {
        Self {
            sort: SortStrategy::Length,
            dependency_aware: false,
        }
    }
}

/// One partition unit: an anchor contributor plus stacked dependents
#[derive(Debug, Clone, PartialEq)]
pub struct Sentinel {
    /// Contributor indices, anchor first
    pub members: Vec<usize>,
    /// Sum of the members' maximum differences
    pub score: Score,
    /// Anchor posting list length
    pub length: u64,
    /// Whether the anchor is an estimator
    pub estimating: bool,
}

impl Sentinel {
    fn single(index: usize, contributor: &Contributor) -> Self {
        Self {
            members: vec![index],
            score: contributor.maximum_difference(),
            length: contributor.total_entries(),
            estimating: contributor.is_estimator(),
        }
    }

    /// Contributor that drives candidate generation for this sentinel
    #[inline]
    pub fn anchor(&self) -> usize {
        self.members[0]
    }
}

#[derive(Debug, Clone)]
pub struct SentinelPartition {
    sentinels: Vec<Sentinel>,
    slots: Vec<Option<usize>>,
    num_estimators: usize,
}

impl SentinelPartition {
    pub fn build(contributors: &[Contributor], strategy: PartitionStrategy) -> Result<Self> {
        let mut slots = Vec::with_capacity(contributors.len());
        let mut num_estimators = 0;
        for contributor in contributors {
            if contributor.is_estimator() {
                slots.push(Some(num_estimators));
                num_estimators += 1;
            } else {
                slots.push(None);
            }
        }

        let sentinels = if contributors.len() == 1 {
            vec![Sentinel::single(0, &contributors[0])]
        } else {
            let groups = if strategy.dependency_aware {
                stack_dependents(contributors)?
            } else {
                contributors
                    .iter()
                    .enumerate()
                    .map(|(i, c)| Sentinel::single(i, c))
                    .collect()
            };
            order(groups, strategy.sort)
        };

        debug!(
            "Partitioned {} contributors into {} sentinels: strategy={}, dependency_aware={}, estimators={}",
            contributors.len(),
            sentinels.len(),
            strategy.sort,
            strategy.dependency_aware,
            num_estimators
        );

        Ok(Self {
            sentinels,
            slots,
            num_estimators,
        })
    }

    pub fn sentinels(&self) -> &[Sentinel] {
        &self.sentinels
    }

    pub fn len(&self) -> usize {
        self.sentinels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentinels.is_empty()
    }

    /// Counts slot of an estimating contributor
    #[inline]
    pub fn estimator_slot(&self, contributor: usize) -> Option<usize> {
        self.slots.get(contributor).copied().flatten()
    }

    pub fn num_estimators(&self) -> usize {
        self.num_estimators
    }

    /// Contributor indices in scoring order
    pub fn scoring_order(&self) -> impl Iterator<Item = usize> + '_ {
        self.sentinels.iter().flat_map(|s| s.members.iter().copied())
    }

    /// Fewest leading sentinels whose removal from the starting potential
    /// drops the bound of every other document to the threshold or below.
    pub fn determine_sentinel_index(&self, ctx: &ScoringContext) -> usize {
        let mut remaining = ctx.starting_potential;
        let mut index = 0;
        while index < self.sentinels.len() && remaining > ctx.min_candidate_score {
            remaining -= self.sentinels[index].score;
            index += 1;
        }
        index
    }
}

// ── Dependency stacking ──────────────────────────────────────────────────

fn stack_dependents(contributors: &[Contributor]) -> Result<Vec<Sentinel>> {
    let mut groups: Vec<Option<Sentinel>> = contributors
        .iter()
        .enumerate()
        .map(|(i, c)| c.dependencies().is_empty().then(|| Sentinel::single(i, c)))
        .collect();

    for (i, contributor) in contributors.iter().enumerate() {
        let deps = contributor.dependencies();
        if deps.is_empty() {
            continue;
        }
        for &dep in deps {
            if dep >= contributors.len() || dep == i {
                return Err(Error::Query(format!(
                    "contributor {i} has invalid dependency {dep}"
                )));
            }
            if !contributors[dep].dependencies().is_empty() {
                return Err(Error::Query(format!(
                    "contributor {i} depends on dependent contributor {dep}"
                )));
            }
        }
        let anchor = deps
            .iter()
            .copied()
            .min_by_key(|&d| (contributors[d].total_entries(), d))
            .unwrap_or(i);
        if let Some(group) = groups[anchor].as_mut() {
            group.members.push(i);
            group.score += contributor.maximum_difference();
        }
    }

    Ok(groups.into_iter().flatten().collect())
}

// ── Ordering ─────────────────────────────────────────────────────────────

fn by_length(a: &Sentinel, b: &Sentinel) -> std::cmp::Ordering {
    a.length.cmp(&b.length)
}

fn by_score(a: &Sentinel, b: &Sentinel) -> std::cmp::Ordering {
    b.score.total_cmp(&a.score)
}

fn order(mut sentinels: Vec<Sentinel>, sort: SortStrategy) -> Vec<Sentinel> {
    match sort {
        SortStrategy::Length => sentinels.sort_by(by_length),
        SortStrategy::Score => sentinels.sort_by(by_score),
        SortStrategy::LengthSplit => {
            sentinels.sort_by(|a, b| a.estimating.cmp(&b.estimating).then_with(|| by_length(a, b)))
        }
        SortStrategy::ScoreSplit => {
            sentinels.sort_by(|a, b| a.estimating.cmp(&b.estimating).then_with(|| by_score(a, b)))
        }
        SortStrategy::MixedLs => return interleave(sentinels, true),
        SortStrategy::MixedSl => return interleave(sentinels, false),
    }
    sentinels
}

/// Alternate between the length and score orders, skipping sentinels already taken
fn interleave(sentinels: Vec<Sentinel>, length_first: bool) -> Vec<Sentinel> {
    let n = sentinels.len();
    let mut by_len: Vec<usize> = (0..n).collect();
    by_len.sort_by(|&a, &b| by_length(&sentinels[a], &sentinels[b]));
    let mut by_sc: Vec<usize> = (0..n).collect();
    by_sc.sort_by(|&a, &b| by_score(&sentinels[a], &sentinels[b]));

    let mut taken = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let (mut li, mut si) = (0, 0);
    let mut use_length = length_first;
    while order.len() < n {
        let (queue, cursor) = if use_length {
            (&by_len, &mut li)
        } else {
            (&by_sc, &mut si)
        };
        while *cursor < n && taken[queue[*cursor]] {
            *cursor += 1;
        }
        if *cursor < n {
            taken[queue[*cursor]] = true;
            order.push(queue[*cursor]);
        }
        use_length = !use_length;
    }

    let mut slots: Vec<Option<Sentinel>> = sentinels.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect()
}

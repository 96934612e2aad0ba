//! Friend recommendations.
//!
//! Candidates are scored from two independent signals:
//! - friends of friends, one fixed weight per distinct mutual friend
//! - a shared department, one fixed weight
//!
//! Existing friends and the target itself are never candidates.

use crate::graph::{NodeId, SocialGraph};
use nexus_core::AccountKey;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

/// Points added per signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RecommendationWeights {
    /// Per distinct friend shared with the target.
    #[serde(default = "default_mutual_friend")]
    pub mutual_friend: u32,
    /// When the candidate is in the target's department.
    #[serde(default = "default_same_department")]
    pub same_department: u32,
}

fn default_mutual_friend() -> u32 {
    10
}

fn default_same_department() -> u32 {
    5
}

impl Default for RecommendationWeights {
    fn default() -> Self {
        Self {
            mutual_friend: default_mutual_friend(),
            same_department: default_same_department(),
        }
    }
}

/// A suggested new connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub key: AccountKey,
    pub name: String,
    pub department: String,
    /// Friends the candidate shares with the target, sorted by key.
    pub mutual_friends: Vec<AccountKey>,
    pub score: u32,
}

impl Recommendation {
    pub fn mutual_count(&self) -> usize {
        self.mutual_friends.len()
    }
}

#[derive(Default)]
struct Tally {
    mutuals: BTreeSet<AccountKey>,
    score: u32,
}

impl SocialGraph {
    /// Ranks candidate connections for `target`.
    ///
    /// Ordering: score descending, then key ascending. The full list is
    /// returned; callers truncate. An unknown target yields an empty list.
    pub fn recommendations(
        &self,
        target: &str,
        weights: &RecommendationWeights,
    ) -> Vec<Recommendation> {
        let Some(me) = self.get_index(target) else {
            debug!("No recommendations for unknown account {}", target);
            return Vec::new();
        };

        let friends: HashSet<NodeId> = self.graph.neighbors(me).collect();
        let is_candidate = |n: NodeId| n != me && !friends.contains(&n);
        let mut tallies: HashMap<NodeId, Tally> = HashMap::new();

        // Level 2: friends of friends
        for &friend in &friends {
            let friend_key = self.key_of(friend);
            for fof in self.graph.neighbors(friend) {
                if !is_candidate(fof) {
                    continue;
                }
                let tally = tallies.entry(fof).or_default();
                if tally.mutuals.insert(friend_key.clone()) {
                    tally.score += weights.mutual_friend;
                }
            }
        }

        // Department affinity, independent of the pass above
        let department = &self.graph[me].department;
        for other in self.graph.node_indices() {
            if is_candidate(other) && &self.graph[other].department == department {
                tallies.entry(other).or_default().score += weights.same_department;
            }
        }

        let mut ranked: Vec<Recommendation> = tallies
            .into_iter()
            .filter(|(_, tally)| tally.score > 0)
            .map(|(index, tally)| {
                let account = &self.graph[index];
                Recommendation {
                    key: account.key.clone(),
                    name: account.name.clone(),
                    department: account.department.clone(),
                    mutual_friends: tally.mutuals.into_iter().collect(),
                    score: tally.score,
                }
            })
            .collect();

        ranked.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.key.cmp(&b.key)));

        debug!(
            "Ranked {} candidates for {} ({} friends)",
            ranked.len(),
            target,
            friends.len()
        );
        ranked
    }
}

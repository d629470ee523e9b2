use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::info;
use uuid::Uuid;

use keyloom_common::config::ClusterConfig;
use keyloom_common::{
    ClusterLevel, ClusterNode, ClusterSet, KeywordRecord, SiblingLink, TopicCluster,
};

use crate::agglomerative::cluster_by_threshold;
use crate::similarity::{hybrid_distance, hybrid_similarity};

/// Two-pass clustering over scored keyword records.
///
/// Pass 1 groups records into topics at the coarse threshold; pass 2
/// subdivides each topic into page groups at the tight threshold. Hubs are
/// picked by opportunity, with traffic-potential then lexicographic
/// tie-breaks. Output is deterministic for a given input set and config.
pub struct ClusterEngine {
    config: ClusterConfig,
}

impl ClusterEngine {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    pub fn cluster(&self, records: &[KeywordRecord]) -> ClusterSet {
        if records.is_empty() {
            return ClusterSet::default();
        }

        // Input order must not leak into the output: work over indices
        // sorted by (normalized text, id).
        let mut order: Vec<usize> = (0..records.len()).collect();
        order.sort_by(|&a, &b| {
            records[a]
                .normalized
                .cmp(&records[b].normalized)
                .then(records[a].id.cmp(&records[b].id))
        });

        let topic_groups = self.topic_pass(records, &order);

        let mut topics = Vec::with_capacity(topic_groups.len());
        let mut sibling_links = Vec::new();

        for group in &topic_groups {
            let page_groups = self.page_pass(records, group);

            let pages: Vec<ClusterNode> = page_groups
                .iter()
                .map(|members| self.build_node(records, members, ClusterLevel::Page))
                .collect();

            // Sibling edges: page hubs within the topic close enough to
            // cross-link. Undirected, stored once with sorted endpoints.
            for i in 0..pages.len() {
                for j in (i + 1)..pages.len() {
                    let hub_i = record_by_id(records, pages[i].hub_id);
                    let hub_j = record_by_id(records, pages[j].hub_id);
                    let sim = hybrid_similarity(
                        &hub_i.normalized,
                        &hub_j.normalized,
                        hub_i.embedding.as_deref(),
                        hub_j.embedding.as_deref(),
                        self.config.page_semantic_weight,
                    );
                    if sim >= self.config.sibling_threshold {
                        let (a, b) = if pages[i].id <= pages[j].id {
                            (pages[i].id, pages[j].id)
                        } else {
                            (pages[j].id, pages[i].id)
                        };
                        sibling_links.push(SiblingLink { a, b });
                    }
                }
            }

            let topic = self.build_node(records, group, ClusterLevel::Topic);
            topics.push(TopicCluster { topic, pages });
        }

        let set = ClusterSet {
            topics,
            sibling_links,
        };
        info!(
            keywords = records.len(),
            topics = set.topics.len(),
            pages = set.page_count(),
            siblings = set.sibling_links.len(),
            "Clustering complete"
        );
        set
    }

    /// Coarse pass. Batches past the blocking limit are pre-bucketed by the
    /// leading token of the normalized form so the pairwise cost stays
    /// bounded; topics then never span buckets.
    fn topic_pass(&self, records: &[KeywordRecord], order: &[usize]) -> Vec<Vec<usize>> {
        let buckets: Vec<Vec<usize>> = if order.len() > self.config.blocking_limit {
            let mut by_token: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
            for &idx in order {
                let token = records[idx].normalized.split_whitespace().next().unwrap_or("");
                by_token.entry(token).or_default().push(idx);
            }
            by_token.into_values().collect()
        } else {
            vec![order.to_vec()]
        };

        let threshold = 1.0 - self.config.topic_threshold;
        let mut groups = Vec::new();
        for bucket in &buckets {
            let distances = self.distance_matrix(records, bucket, self.config.topic_semantic_weight);
            for members in cluster_by_threshold(&distances, threshold) {
                groups.push(members.into_iter().map(|i| bucket[i]).collect());
            }
        }
        groups
    }

    /// Tight pass within one topic.
    fn page_pass(&self, records: &[KeywordRecord], group: &[usize]) -> Vec<Vec<usize>> {
        let threshold = 1.0 - self.config.page_threshold;
        let distances = self.distance_matrix(records, group, self.config.page_semantic_weight);
        cluster_by_threshold(&distances, threshold)
            .into_iter()
            .map(|members| members.into_iter().map(|i| group[i]).collect())
            .collect()
    }

    fn distance_matrix(
        &self,
        records: &[KeywordRecord],
        idxs: &[usize],
        semantic_weight: f64,
    ) -> Vec<Vec<f64>> {
        let n = idxs.len();
        let mut matrix = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let a = &records[idxs[i]];
                let b = &records[idxs[j]];
                let d = hybrid_distance(
                    &a.normalized,
                    &b.normalized,
                    a.embedding.as_deref(),
                    b.embedding.as_deref(),
                    semantic_weight,
                );
                matrix[i][j] = d;
                matrix[j][i] = d;
            }
        }
        matrix
    }

    fn build_node(
        &self,
        records: &[KeywordRecord],
        members: &[usize],
        level: ClusterLevel,
    ) -> ClusterNode {
        let hub_idx = select_hub(records, members);
        let hub = &records[hub_idx];

        let opportunity_sum = members
            .iter()
            .map(|&i| records[i].opportunity.unwrap_or(0.0))
            .sum();
        let total_volume = members.iter().map(|&i| records[i].volume.unwrap_or(0)).sum();
        let difficulty_sum: f64 = members
            .iter()
            .map(|&i| records[i].difficulty.map(|d| d.composite).unwrap_or(0.0))
            .sum();

        ClusterNode {
            id: Uuid::new_v4(),
            level,
            label: hub.text.clone(),
            hub_id: hub.id,
            member_ids: members.iter().map(|&i| records[i].id).collect(),
            opportunity_sum,
            total_volume,
            avg_difficulty: difficulty_sum / members.len() as f64,
        }
    }
}

/// Highest opportunity wins; ties break by traffic potential, then by the
/// lexicographically smallest normalized text.
fn select_hub(records: &[KeywordRecord], members: &[usize]) -> usize {
    let mut best = members[0];
    for &candidate in &members[1..] {
        if hub_rank(&records[candidate], &records[best]) == Ordering::Greater {
            best = candidate;
        }
    }
    best
}

fn hub_rank(a: &KeywordRecord, b: &KeywordRecord) -> Ordering {
    let opp_a = a.opportunity.unwrap_or(0.0);
    let opp_b = b.opportunity.unwrap_or(0.0);
    opp_a
        .partial_cmp(&opp_b)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            let t_a = a.traffic_potential.unwrap_or(0.0);
            let t_b = b.traffic_potential.unwrap_or(0.0);
            t_a.partial_cmp(&t_b).unwrap_or(Ordering::Equal)
        })
        // Reversed: the *smaller* text should win the tie.
        .then_with(|| b.normalized.cmp(&a.normalized))
}

fn record_by_id(records: &[KeywordRecord], id: Uuid) -> &KeywordRecord {
    records
        .iter()
        .find(|r| r.id == id)
        .expect("hub id always comes from the record set")
}

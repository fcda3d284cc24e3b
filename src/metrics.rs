//! # Metrics Collection and Aggregation
//!
//! Append-only histories and monotonic counters recorded while a simulation
//! runs, plus the pure aggregations consumed by reporting layers: the
//! [`MetricsSummary`] (derived averages, no side effects on simulation state)
//! and the [`BatchRecord`], the flat primitive-only line that is the single
//! inter-process contract with the batch runner.

use indexmap::IndexMap;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::graph::NetworkGraph;
use crate::NodeId;

/// One recorded snapshot of every node's reputation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReputationSnapshot {
    pub step: u64,
    pub reputations: IndexMap<NodeId, f64>,
}

/// Aggregates detection latency, attack outcomes, reputation history and
/// throughput over one simulation run. All histories grow monotonically.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricsCollector {
    /// Conflict detection latencies, in steps
    pub detection_times: Vec<f64>,
    /// Alerts raised without a real double spend behind them
    pub false_positives: u64,
    /// Attacks that completed without any node flagging the pair
    pub successful_attacks: u64,
    /// Alert propagation speeds, in steps
    pub propagation_speed: Vec<f64>,
    /// Per-step reputation snapshots
    pub reputation_history: Vec<ReputationSnapshot>,
    /// Messages processed per step
    pub tx_throughput: Vec<u64>,
    /// Attack pairs issued by scenario drivers
    pub alerts_created: u64,
    /// Conflicts detected (one per recorded detection)
    pub conflicts_detected: u64,
    /// Nodes holding the alert at detection time, per attack
    pub nodes_received_alert: Vec<usize>,
    /// Mean reputation per step
    pub avg_reputation: Vec<f64>,
    /// Full reputation distribution per step
    pub reputation_distribution: Vec<Vec<f64>>,
    /// Share of alerts that were false positives
    pub false_positive_rate: f64,
    /// Diameter of the peer graph at build time; -1 when disconnected
    pub network_diameter: i64,
    /// Average shortest-path length at build time; -1 when disconnected
    pub avg_path_length: f64,
}

impl MetricsCollector {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a conflict detection latency, in steps
    pub fn record_detection(&mut self, detection_time: f64) {
        self.detection_times.push(detection_time);
        self.conflicts_detected += 1;
    }

    /// Record the outcome of one attack
    pub fn record_attack_result(&mut self, success: bool) {
        if success {
            self.successful_attacks += 1;
        }
    }

    /// Record a false positive
    pub fn record_false_positive(&mut self) {
        self.false_positives += 1;
    }

    /// Record how many steps an alert needed to spread
    pub fn record_propagation_speed(&mut self, steps: f64) {
        self.propagation_speed.push(steps);
    }

    /// Record the message count of one step
    pub fn record_throughput(&mut self, count: u64) {
        self.tx_throughput.push(count);
    }

    /// Record a full reputation snapshot for one step
    pub fn record_reputation_snapshot(&mut self, step: u64, reputations: IndexMap<NodeId, f64>) {
        self.reputation_history
            .push(ReputationSnapshot { step, reputations });
    }

    /// Mean/median/std of confidence over the most recent `sample_txs`
    /// transactions, each judged by up to `sample_nodes` randomly sampled
    /// observers. Zeroes when the network holds no transactions or nodes.
    pub fn average_confidence<R: Rng>(
        &self,
        graph: &NetworkGraph,
        rng: &mut R,
        sample_txs: usize,
        sample_nodes: usize,
    ) -> ConfidenceStats {
        if graph.transactions.is_empty() || graph.nodes.is_empty() {
            return ConfidenceStats::default();
        }
        let node_ids: Vec<&NodeId> = graph.nodes.keys().collect();
        let k = sample_nodes.min(node_ids.len());
        let tx_ids: Vec<&String> = graph.transactions.keys().collect();
        let start = tx_ids.len().saturating_sub(sample_txs);

        let mut per_tx_means: Vec<f64> = Vec::new();
        for tx_id in &tx_ids[start..] {
            let sample: Vec<&NodeId> = node_ids
                .choose_multiple(rng, k)
                .copied()
                .collect();
            let total: f64 = sample
                .iter()
                .map(|observer| graph.confidence(observer, tx_id))
                .sum();
            per_tx_means.push(total / k as f64);
        }
        ConfidenceStats::from_samples(&mut per_tx_means)
    }

    /// Derive the summary consumed by reporting and dashboard layers.
    /// Pure aggregation; never mutates simulation state.
    pub fn summarize(&self) -> MetricsSummary {
        let avg_detection = mean(&self.detection_times);
        let avg_propagation = mean(&self.propagation_speed);
        let peak_throughput = self.tx_throughput.iter().copied().max().unwrap_or(0);
        let avg_reputation = self
            .reputation_history
            .last()
            .map(|snapshot| {
                let values: Vec<f64> = snapshot.reputations.values().copied().collect();
                mean(&values)
            })
            .unwrap_or(0.0);
        MetricsSummary {
            detection_times_count: self.detection_times.len(),
            avg_detection_time_steps: avg_detection,
            false_positives: self.false_positives,
            successful_attacks: self.successful_attacks,
            conflicts_detected: self.conflicts_detected,
            avg_propagation_speed: avg_propagation,
            peak_throughput,
            reputation_snapshots: self.reputation_history.len(),
            alerts_created: self.alerts_created,
            avg_reputation,
            avg_reputation_history: self.avg_reputation.clone(),
            false_positive_rate: self.false_positive_rate,
            network_diameter: self.network_diameter,
            avg_path_length: self.avg_path_length,
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Confidence sampling statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceStats {
    pub mean: f64,
    pub median: f64,
    pub std: f64,
}

impl ConfidenceStats {
    fn from_samples(samples: &mut [f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let mean_value = mean(samples);
        samples.sort_by(|a, b| a.total_cmp(b));
        let mid = samples.len() / 2;
        let median = if samples.len() % 2 == 0 {
            (samples[mid - 1] + samples[mid]) / 2.0
        } else {
            samples[mid]
        };
        let variance = samples
            .iter()
            .map(|value| (value - mean_value).powi(2))
            .sum::<f64>()
            / samples.len() as f64;
        Self {
            mean: mean_value,
            median,
            std: variance.sqrt(),
        }
    }
}

/// Derived run summary: named numeric fields only, read-only for consumers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsSummary {
    pub detection_times_count: usize,
    pub avg_detection_time_steps: f64,
    pub false_positives: u64,
    pub successful_attacks: u64,
    pub conflicts_detected: u64,
    pub avg_propagation_speed: f64,
    pub peak_throughput: u64,
    pub reputation_snapshots: usize,
    pub alerts_created: u64,
    pub avg_reputation: f64,
    pub avg_reputation_history: Vec<f64>,
    pub false_positive_rate: f64,
    pub network_diameter: i64,
    pub avg_path_length: f64,
}

/// One structured record per batch run, the only inter-process contract.
/// Stays a flat mapping of primitive values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchRecord {
    /// Mean detection latency in steps; 0 when nothing was detected
    pub detection_time: f64,
    /// Percentage of nodes that flagged the conflicting pair, 1 decimal
    pub alert_coverage: f64,
    /// Peak per-step message count
    pub peak_load: u64,
    pub evil_reputation_before: f64,
    pub evil_reputation_after: f64,
    /// 1 when the attack went undetected, else 0
    pub successful_attack: u8,
    pub false_positives: u64,
    /// -1 sentinel when the topology was disconnected
    pub network_diameter: i64,
    /// -1 sentinel when the topology was disconnected, 2 decimals
    pub avg_path_length: f64,
}

impl BatchRecord {
    /// Flatten a finished run into the batch line format
    pub fn from_run(
        summary: &MetricsSummary,
        total_nodes: usize,
        nodes_with_alert: usize,
        detection_step: Option<u64>,
        evil_reputation_before: f64,
        evil_reputation_after: f64,
    ) -> Self {
        let detection_time = if summary.avg_detection_time_steps > 0.0 {
            summary.avg_detection_time_steps
        } else if detection_step.is_some() {
            3.0
        } else {
            0.0
        };
        let alert_coverage = if total_nodes > 0 {
            (1000.0 * nodes_with_alert as f64 / total_nodes as f64).round() / 10.0
        } else {
            0.0
        };
        Self {
            detection_time: (detection_time * 10.0).round() / 10.0,
            alert_coverage,
            peak_load: summary.peak_throughput,
            evil_reputation_before,
            evil_reputation_after,
            successful_attack: u8::from(summary.successful_attacks > 0),
            false_positives: summary.false_positives,
            network_diameter: summary.network_diameter,
            avg_path_length: (summary.avg_path_length * 100.0).round() / 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_collector_summarizes_to_zeroes() {
        let summary = MetricsCollector::new().summarize();
        assert_eq!(summary.detection_times_count, 0);
        assert_eq!(summary.avg_detection_time_steps, 0.0);
        assert_eq!(summary.peak_throughput, 0);
        assert_eq!(summary.avg_reputation, 0.0);
        assert_eq!(summary.reputation_snapshots, 0);
    }

    #[test]
    fn summary_derives_averages() {
        let mut collector = MetricsCollector::new();
        collector.record_detection(2.0);
        collector.record_detection(4.0);
        collector.record_attack_result(false);
        collector.record_attack_result(true);
        collector.record_throughput(10);
        collector.record_throughput(40);
        collector.record_throughput(25);
        let mut reputations = IndexMap::new();
        reputations.insert("a".to_string(), 0.4);
        reputations.insert("b".to_string(), 0.6);
        collector.record_reputation_snapshot(0, reputations);

        let summary = collector.summarize();
        assert_eq!(summary.detection_times_count, 2);
        assert_eq!(summary.avg_detection_time_steps, 3.0);
        assert_eq!(summary.conflicts_detected, 2);
        assert_eq!(summary.successful_attacks, 1);
        assert_eq!(summary.peak_throughput, 40);
        assert!((summary.avg_reputation - 0.5).abs() < 1e-12);
    }

    #[test]
    fn confidence_stats_handle_even_and_odd_samples() {
        let stats = ConfidenceStats::from_samples(&mut [0.5, 0.7, 0.9]);
        assert!((stats.mean - 0.7).abs() < 1e-12);
        assert_eq!(stats.median, 0.7);

        let stats = ConfidenceStats::from_samples(&mut [0.2, 0.4, 0.6, 0.8]);
        assert!((stats.median - 0.5).abs() < 1e-12);
        assert_eq!(ConfidenceStats::from_samples(&mut []), ConfidenceStats::default());
    }

    #[test]
    fn confidence_sampling_covers_recent_transactions() {
        use crate::node::NodeRole;
        use crate::ReputationParams;
        use rand::SeedableRng;
        use rand_chacha::ChaCha8Rng;

        let mut graph = NetworkGraph::new(7, ReputationParams::default(), 1000.0);
        graph.spawn("a", NodeRole::Honest, 0.5);
        graph.spawn("b", NodeRole::Honest, 0.5);
        graph.add_edge("a", "b");
        let tx = graph.create_transaction("a", "b", 5.0).unwrap();
        graph.propagate_transaction(&tx, "a", None);

        let collector = MetricsCollector::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let stats = collector.average_confidence(&graph, &mut rng, 10, 2);
        // both observers know the transaction and score the 0.5 base
        assert!((stats.mean - 0.5).abs() < 1e-12);
        assert_eq!(stats.std, 0.0);

        let empty = NetworkGraph::new(7, ReputationParams::default(), 1000.0);
        assert_eq!(
            collector.average_confidence(&empty, &mut rng, 10, 2),
            ConfidenceStats::default()
        );
    }

    #[test]
    fn batch_record_is_a_flat_primitive_mapping() {
        let mut collector = MetricsCollector::new();
        collector.record_detection(2.0);
        collector.record_throughput(33);
        collector.network_diameter = 4;
        collector.avg_path_length = 2.339;
        let record = BatchRecord::from_run(&collector.summarize(), 20, 15, Some(52), 0.51, 0.01);

        assert_eq!(record.detection_time, 2.0);
        assert_eq!(record.alert_coverage, 75.0);
        assert_eq!(record.peak_load, 33);
        assert_eq!(record.successful_attack, 0);
        assert_eq!(record.avg_path_length, 2.34);

        let value = serde_json::to_value(&record).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 9);
        for field in object.values() {
            assert!(field.is_number(), "batch record fields must be primitive");
        }
    }

    #[test]
    fn batch_record_falls_back_when_only_detection_step_known() {
        let summary = MetricsCollector::new().summarize();
        let record = BatchRecord::from_run(&summary, 10, 0, Some(7), 0.5, 0.5);
        assert_eq!(record.detection_time, 3.0);
        let record = BatchRecord::from_run(&summary, 10, 0, None, 0.5, 0.5);
        assert_eq!(record.detection_time, 0.0);
    }
}

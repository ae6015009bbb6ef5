// Copyright (C) 2023-2025 Fleetgate Systems Inc.
// This file is part of the fleetgate library.

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
// http://www.apache.org/licenses/LICENSE-2.0

// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use metrics_util::{
    debugging::{DebugValue, DebuggingRecorder, Snapshotter},
    MetricKind,
};

/// Installs a snapshotting recorder for the lifetime of a test; tests using it
/// must be serialized, as the recorder is a process-wide global.
pub struct TestMetrics(Snapshotter);

impl Default for TestMetrics {
    fn default() -> Self {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        recorder.install().expect("can't set the test recorder");
        crate::register_metrics();

        Self(snapshotter)
    }
}

impl TestMetrics {
    /// Returns the value of the given counter, summed across all of its label sets.
    pub fn counter(&self, metric: &'static str) -> u64 {
        self.values(MetricKind::Counter, metric, &[])
            .into_iter()
            .map(|value| match value {
                DebugValue::Counter(val) => val,
                _ => 0,
            })
            .sum()
    }

    /// Returns the value of the given counter, restricted to label sets containing all the given labels.
    pub fn labeled_counter(&self, metric: &'static str, labels: &[(&str, &str)]) -> u64 {
        self.values(MetricKind::Counter, metric, labels)
            .into_iter()
            .map(|value| match value {
                DebugValue::Counter(val) => val,
                _ => 0,
            })
            .sum()
    }

    /// Returns the value of the given gauge.
    pub fn gauge(&self, metric: &'static str) -> f64 {
        self.values(MetricKind::Gauge, metric, &[])
            .into_iter()
            .find_map(|value| match value {
                DebugValue::Gauge(val) => Some(val.into_inner()),
                _ => None,
            })
            .unwrap_or(0.0)
    }

    fn values(&self, kind: MetricKind, metric: &'static str, labels: &[(&str, &str)]) -> Vec<DebugValue> {
        self.0
            .snapshot()
            .into_vec()
            .into_iter()
            .filter(|(key, _, _, _)| {
                key.kind() == kind
                    && key.key().name() == metric
                    && labels.iter().all(|(name, value)| {
                        key.key().labels().any(|label| label.key() == *name && label.value() == *value)
                    })
            })
            .map(|(_, _, _, value)| value)
            .collect()
    }
}

impl Drop for TestMetrics {
    fn drop(&mut self) {
        // Clear the recorder to avoid the global state bleeding into other tests.
        unsafe {
            metrics::clear_recorder();
        }
    }
}

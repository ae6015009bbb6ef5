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

mod names;

// Expose the names at the crate level for easy access.
pub use names::*;

#[cfg(feature = "test")]
mod utils;

#[cfg(feature = "test")]
pub use utils::*;

/// Initializes the metrics and returns a handle to the task running the metrics exporter.
pub fn initialize_metrics() -> Option<tokio::task::JoinHandle<()>> {
    #[cfg(feature = "prometheus")]
    let exporter_task = {
        use metrics_exporter_prometheus::PrometheusBuilder;

        // Build the recorder and set as global.
        let (recorder, exporter) = PrometheusBuilder::new().build().expect("can't build the prometheus exporter");
        metrics::set_boxed_recorder(Box::new(recorder)).expect("can't set the prometheus exporter");

        // Spawn a dedicated task for the exporter on the runtime.
        Some(tokio::task::spawn(async move {
            exporter.await.expect("can't await the prometheus exporter");
        }))
    };
    #[cfg(not(feature = "prometheus"))]
    let exporter_task = None;

    register_metrics();

    exporter_task
}

/// Registers the metrics so they exist on init.
pub fn register_metrics() {
    for name in names::COUNTER_NAMES {
        metrics::register_counter!(name);
    }
    for name in names::GAUGE_NAMES {
        metrics::register_gauge!(name);
    }
    for name in names::HISTOGRAM_NAMES {
        metrics::register_histogram!(name);
    }
}

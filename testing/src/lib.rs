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

//! Test utilities for the fleetgate ingestion gateway.

#![forbid(unsafe_code)]

pub mod publishers;
pub use publishers::*;

pub mod test_gateway;
pub use test_gateway::*;

pub mod traffic;
pub use traffic::*;

use tracing_subscriber::filter::EnvFilter;

/// Starts a logger if a test gateway needs to be inspected in greater detail.
pub fn start_logger() {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter.add_directive("mio=off".parse().unwrap()),
        _ => EnvFilter::default().add_directive("mio=off".parse().unwrap()),
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

#[macro_export]
macro_rules! wait_until {
    ($limit_secs: expr, $condition: expr) => {
        let now = std::time::Instant::now();
        loop {
            if $condition {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            assert!(now.elapsed() <= std::time::Duration::from_secs($limit_secs), "timed out!");
        }
    };
}

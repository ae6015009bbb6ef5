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

use std::{
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;

use fleetgate_network::{PublishError, Publisher, Record};

/// A publisher double that records every publish for later assertions.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    records: Mutex<Vec<Record>>,
    flushes: AtomicUsize,
    closed: AtomicBool,
}

impl MemoryPublisher {
    /// Returns a copy of all the records published so far, in publish order.
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().clone()
    }

    /// Returns the records published to the given topic, in publish order.
    pub fn records_for(&self, topic: &str) -> Vec<Record> {
        self.records.lock().iter().filter(|record| record.topic == topic).cloned().collect()
    }

    /// The total number of records published so far.
    pub fn record_count(&self) -> usize {
        self.records.lock().len()
    }

    /// The number of times the publisher was flushed.
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    /// Whether the publisher was closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish(&self, record: Record) -> Result<(), PublishError> {
        self.records.lock().push(record);
        Ok(())
    }

    async fn flush(&self, _deadline: Duration) -> Result<(), PublishError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// A publisher double that fails a scripted number of publishes before
/// recovering; successful publishes are recorded like [`MemoryPublisher`].
#[derive(Debug, Default)]
pub struct FaultyPublisher {
    failures_remaining: AtomicUsize,
    inner: MemoryPublisher,
}

impl FaultyPublisher {
    /// Creates a publisher that fails the next `failures` publishes.
    pub fn failing(failures: usize) -> Self {
        Self { failures_remaining: AtomicUsize::new(failures), inner: MemoryPublisher::default() }
    }

    /// The recording publisher behind the scripted failures.
    pub fn inner(&self) -> &MemoryPublisher {
        &self.inner
    }
}

#[async_trait]
impl Publisher for FaultyPublisher {
    async fn publish(&self, record: Record) -> Result<(), PublishError> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 && self.failures_remaining.compare_exchange(remaining, remaining - 1, Ordering::SeqCst, Ordering::SeqCst).is_ok() {
            return Err(PublishError::Transient("scripted failure".into()));
        }
        self.inner.publish(record).await
    }

    async fn flush(&self, deadline: Duration) -> Result<(), PublishError> {
        self.inner.flush(deadline).await
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}

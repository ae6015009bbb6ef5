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

use std::collections::BTreeSet;

use fxhash::FxHashMap;
use parking_lot::{Mutex, RwLock};

use crate::protocol::DeviceId;

/// The outcome of observing a `(device, counter)` pair.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Observation {
    /// The counter wasn't in the retained window; it is now recorded.
    Fresh,
    /// The counter was already present; the index is unchanged.
    Duplicate,
}

/// An in-memory index of recently observed message counters, keyed by device.
///
/// Recognition is bounded: once a device's set reaches the cap, the
/// numerically smallest counters are evicted, so a counter re-appearing after
/// eviction is accepted as fresh. The index lives for the lifetime of the
/// process and is not shared across gateways.
pub struct DedupIndex {
    /// The cap on the number of counters retained per device.
    entries_per_device: usize,
    /// The per-device sets of recently observed counters.
    devices: RwLock<FxHashMap<DeviceId, Mutex<BTreeSet<u16>>>>,
}

impl DedupIndex {
    /// Creates an index retaining up to `entries_per_device` counters per device.
    pub fn new(entries_per_device: usize) -> Self {
        Self { entries_per_device, devices: Default::default() }
    }

    /// Records a counter observation for a device.
    ///
    /// Observations of the same device serialize on its entry; distinct
    /// devices don't contend. The map itself is only write-locked to admit a
    /// device's first observation.
    pub fn observe(&self, device_id: DeviceId, counter: u16) -> Observation {
        {
            let devices = self.devices.read();
            if let Some(counters) = devices.get(&device_id) {
                return self.observe_inner(&mut counters.lock(), counter);
            }
        }

        // A concurrent observe may have admitted the device in the meantime;
        // the entry call covers both cases.
        let mut devices = self.devices.write();
        let counters = devices.entry(device_id).or_default();
        let result = self.observe_inner(&mut counters.lock(), counter);
        result
    }

    /// The number of devices currently tracked.
    pub fn device_count(&self) -> usize {
        self.devices.read().len()
    }

    /// The number of counters retained for the given device.
    pub fn counters_retained(&self, device_id: &DeviceId) -> usize {
        self.devices.read().get(device_id).map_or(0, |counters| counters.lock().len())
    }

    fn observe_inner(&self, counters: &mut BTreeSet<u16>, counter: u16) -> Observation {
        if !counters.insert(counter) {
            return Observation::Duplicate;
        }
        // Counters are monotone per device, so evicting the numerically
        // smallest approximates oldest-first without timestamps.
        while counters.len() > self.entries_per_device {
            counters.pop_first();
        }
        Observation::Fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    const DEVICE: DeviceId = DeviceId::new([1, 2, 3, 4]);

    #[test]
    fn second_observation_is_a_duplicate() {
        let index = DedupIndex::new(1000);

        assert_eq!(index.observe(DEVICE, 7), Observation::Fresh);
        assert_eq!(index.observe(DEVICE, 7), Observation::Duplicate);
        assert_eq!(index.counters_retained(&DEVICE), 1);
    }

    #[test]
    fn devices_are_tracked_independently() {
        let index = DedupIndex::new(1000);
        let other = DeviceId::new([4, 3, 2, 1]);

        assert_eq!(index.observe(DEVICE, 7), Observation::Fresh);
        assert_eq!(index.observe(other, 7), Observation::Fresh);
        assert_eq!(index.device_count(), 2);
    }

    #[test]
    fn retained_counters_never_exceed_the_cap() {
        let index = DedupIndex::new(100);
        for counter in 0..5000 {
            index.observe(DEVICE, counter);
            assert!(index.counters_retained(&DEVICE) <= 100);
        }
        assert_eq!(index.counters_retained(&DEVICE), 100);
    }

    #[test]
    fn eviction_drops_the_smallest_counters() {
        let index = DedupIndex::new(3);
        for counter in [10, 20, 30, 40] {
            assert_eq!(index.observe(DEVICE, counter), Observation::Fresh);
        }

        // 10 was evicted, so it now reads as fresh again.
        assert_eq!(index.observe(DEVICE, 20), Observation::Duplicate);
        assert_eq!(index.observe(DEVICE, 10), Observation::Fresh);
    }

    #[test]
    fn observations_race_without_losing_the_bound() {
        let index = Arc::new(DedupIndex::new(50));

        let handles: Vec<_> = (0u16..4)
            .map(|device| {
                let index = Arc::clone(&index);
                std::thread::spawn(move || {
                    let device_id = DeviceId::new([0, 0, device as u8, 1]);
                    for counter in 0..1000 {
                        index.observe(device_id, counter);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(index.device_count(), 4);
        for device in 0u8..4 {
            assert_eq!(index.counters_retained(&DeviceId::new([0, 0, device, 1])), 50);
        }
    }
}

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

pub const COUNTER_NAMES: [&str; 7] = [
    messages::DEVICE_MESSAGES_PROCESSED,
    messages::DEVICE_EVENTS_PROCESSED,
    messages::DUPLICATES_REJECTED,
    messages::INVALID_REJECTED,
    publish::ERRORS,
    connections::ACCEPTED,
    connections::REJECTED,
];

pub const GAUGE_NAMES: [&str; 1] = [connections::ACTIVE];

pub const HISTOGRAM_NAMES: [&str; 2] = [messages::PROCESSING_DURATION, publish::DURATION];

pub mod messages {
    pub const DEVICE_MESSAGES_PROCESSED: &str = "device_messages_processed_total";
    pub const DEVICE_EVENTS_PROCESSED: &str = "device_events_processed_total";
    pub const DUPLICATES_REJECTED: &str = "duplicate_messages_rejected_total";
    pub const INVALID_REJECTED: &str = "invalid_messages_rejected_total";
    pub const PROCESSING_DURATION: &str = "message_processing_duration_seconds";
}

pub mod publish {
    pub const ERRORS: &str = "publish_errors_total";
    pub const DURATION: &str = "publish_duration_seconds";
}

pub mod connections {
    pub const ACTIVE: &str = "active_connections";
    pub const ACCEPTED: &str = "connections_accepted_total";
    pub const REJECTED: &str = "connections_rejected_total";
}

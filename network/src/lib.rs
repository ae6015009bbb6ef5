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

//! The ingestion stack of the fleetgate gateway.
//!
//! Devices hold long-lived TCP connections and push length-prefixed binary
//! frames; the gateway decodes them, suppresses duplicates, and routes each
//! message to one of two downstream topics through the [`Publisher`]
//! capability. The pipeline is composed of the [`Gateway`] acceptor, a
//! [`Connection`] handler per admitted socket, the self-synchronizing
//! [`FrameDecoder`], the [`DedupIndex`], and the router projections.

#[macro_use]
extern crate tracing;

pub mod config;
pub use config::*;

pub mod connection;
pub use connection::*;

pub mod dedup;
pub use dedup::*;

pub mod errors;
pub use errors::*;

pub mod gateway;
pub use gateway::*;

pub mod protocol;
pub use protocol::*;

pub mod publisher;
pub use publisher::*;

pub mod router;
pub use router::*;

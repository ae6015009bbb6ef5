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

mod start;
pub use start::*;

use anyhow::Result;
use clap::Parser;

/// The command-line interface of the fleetgate gateway.
#[derive(Debug, Parser)]
#[clap(name = "fleetgate", author = "The Fleetgate Team <ops@fleetgate.dev>")]
pub struct CLI {
    /// Specify the subcommand to run.
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Parser)]
pub enum Command {
    #[clap(name = "start")]
    Start(Start),
}

impl Command {
    /// Runs the command.
    pub fn parse(self) -> Result<String> {
        match self {
            Self::Start(command) => command.parse(),
        }
    }
}

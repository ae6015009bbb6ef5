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

use fleetgate_cli::CLI;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    // Parse the given arguments.
    let cli = CLI::parse();
    // Run the given command.
    println!("{}", cli.command.parse()?);
    Ok(())
}

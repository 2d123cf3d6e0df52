// Copyright 2025 bgpblast Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use bgpblast::config::Config;
use bgpblast::log::LogLevel;
use bgpblast::supervisor::Supervisor;
use bgpblast::{error, info};
use clap::Parser;

#[derive(Parser)]
#[command(name = "bgpblast")]
#[command(about = "BGP-4 speaker and route-injection load generator", version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = Config::from_file(&args.config).map_err(|e| {
        error!("failed to load config", "path" => &args.config, "error" => e.to_string());
        e
    })?;

    match LogLevel::from_str(&config.log_level) {
        Ok(level) => bgpblast::log::set_level(level),
        Err(e) => {
            error!("invalid log level", "error" => e);
            std::process::exit(1);
        }
    }

    if config.neighbors.is_empty() {
        error!("no neighbors configured", "path" => &args.config);
        std::process::exit(1);
    }

    info!("starting bgpblast",
        "config_file" => &args.config,
        "neighbors" => config.neighbors.len());

    Supervisor::new(config).run().await;

    Ok(())
}

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

//! One-for-one supervision of per-neighbor session tasks.

use crate::config::{Config, NeighborConfig};
use crate::peer::Peer;
use crate::{error, info, warn};
use std::collections::HashMap;
use std::future::Future;
use tokio::task::{Id, JoinSet};

pub struct Supervisor {
    neighbors: Vec<NeighborConfig>,
}

impl Supervisor {
    pub fn new(config: Config) -> Self {
        Supervisor {
            neighbors: config.neighbors,
        }
    }

    /// Spawn one session per neighbor and restart crashed children
    /// one-for-one. Children are transient: a task that returns cleanly is
    /// not respawned, and a crash never touches its siblings.
    pub async fn run(self) {
        self.run_with(|cfg| Peer::new(cfg).run()).await
    }

    /// Supervision loop with a caller-supplied session factory. The factory
    /// runs once per child and again on every restart, always with the
    /// child's original configuration.
    pub async fn run_with<F, Fut>(self, factory: F)
    where
        F: Fn(NeighborConfig) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut children: JoinSet<()> = JoinSet::new();
        let mut configs: HashMap<Id, NeighborConfig> = HashMap::new();

        for cfg in self.neighbors {
            spawn_child(&mut children, &mut configs, &factory, cfg);
        }

        while let Some(result) = children.join_next_with_id().await {
            match result {
                Ok((id, ())) => {
                    if let Some(cfg) = configs.remove(&id) {
                        info!("peer session ended",
                            "local_address" => cfg.local_address.to_string(),
                            "peer_ip" => cfg.neighbor.to_string());
                    }
                }
                Err(err) => {
                    let id = err.id();
                    let Some(cfg) = configs.remove(&id) else {
                        continue;
                    };
                    if err.is_panic() {
                        error!("peer session crashed, restarting",
                            "local_address" => cfg.local_address.to_string(),
                            "peer_ip" => cfg.neighbor.to_string());
                        spawn_child(&mut children, &mut configs, &factory, cfg);
                    } else {
                        warn!("peer session cancelled",
                            "local_address" => cfg.local_address.to_string(),
                            "peer_ip" => cfg.neighbor.to_string());
                    }
                }
            }
        }

        info!("all peer sessions ended");
    }
}

fn spawn_child<F, Fut>(
    children: &mut JoinSet<()>,
    configs: &mut HashMap<Id, NeighborConfig>,
    factory: &F,
    cfg: NeighborConfig,
) where
    F: Fn(NeighborConfig) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let handle = children.spawn(factory(cfg.clone()));
    configs.insert(handle.id(), cfg);
}

// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Head-of-line stall detection on a routing cycle.

use aernoc::*;

// every router forwards key 7 clockwise around the 2x2 mesh and never
// delivers it, so the ring fills up and locks
const RING: &str = "
0: {7: [1]}
1: {7: [2]}
3: {7: [3]}
2: {7: [0]}
";

fn config(threshold: usize) -> NocConfiguration {
    NocConfiguration {
        mesh_dim_x: 2,
        mesh_dim_y: 2,
        buffer_depth: 1,
        deadlock_threshold: threshold,
        reset_time: 2,
        simulation_time: 1500,
        ..Default::default()
    }
}

fn ring(threshold: usize) -> Network {
    let mut network =
        Network::from_config(config(threshold), &GlobalRoutingTable::from_str(RING).unwrap())
            .unwrap();
    for tile in 0..4 {
        for n in 0..10 {
            network.inject(tile, 0, Event::new(7, tile as u32, n as f64), 0);
        }
    }
    network
}

#[test]
fn saturated_ring_locks_up() {
    let _logger = env_logger::builder().try_init();
    let mut network = ring(200);
    network.run(&mut SystemSimulationCallbacks::default()).unwrap();

    let stats = network.global_stats();
    assert!(stats.deadlock_detected());
    assert_eq!(stats.received_events(), 0);
    assert!(network.routers().iter().all(|r| !r.en_pipe()));
    // ring inputs are full and stuck
    assert!(network.router(1).buffer(Port::West).deadlock_detected());
    assert!(network.router(1).buffer(Port::West).is_full());
    assert!(network.router(1).buffer(Port::West).stall_counter() > 200);
}

#[test]
fn short_runs_stay_below_the_threshold() {
    let mut network = ring(5000);
    network.run(&mut SystemSimulationCallbacks::default()).unwrap();
    assert!(!network.global_stats().deadlock_detected());
    // the lock is there all the same
    assert!(network.routers().iter().all(|r| !r.en_pipe()));
}

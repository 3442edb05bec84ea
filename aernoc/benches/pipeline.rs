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

use bencher::Bencher;
use bencher::{benchmark_group, benchmark_main};

use aernoc::*;

// every PE of a 4x4 mesh sends to the PE of the diagonally opposite tile,
// routed x first, then y
fn transpose_routing(dim: usize) -> GlobalRoutingTable {
    let mut routing = GlobalRoutingTable::new();
    for src in 0..dim * dim {
        let (sx, sy) = (src % dim, src / dim);
        let (dx, dy) = (dim - 1 - sx, dim - 1 - sy);
        let key = src as u32;
        let (mut x, mut y) = (sx, sy);
        loop {
            let tile = y * dim + x;
            let port = if x < dx {
                x += 1;
                Port::East
            } else if x > dx {
                x -= 1;
                Port::West
            } else if y < dy {
                y += 1;
                Port::South
            } else if y > dy {
                y -= 1;
                Port::North
            } else {
                routing.insert(tile, key, vec![Port::Local(0)]);
                break;
            };
            routing.insert(tile, key, vec![port]);
        }
    }
    routing
}

fn transpose(bench: &mut Bencher) {
    const DIM: usize = 4;
    const EVENTS: usize = 64;
    let config = NocConfiguration {
        mesh_dim_x: DIM,
        mesh_dim_y: DIM,
        reset_time: 10,
        simulation_time: 2000,
        ..Default::default()
    };
    let routing = transpose_routing(DIM);
    bench.iter(|| {
        let mut network =
            Network::from_config(config.clone(), &routing).expect("Failed network construction");
        for tile in 0..DIM * DIM {
            for n in 0..EVENTS {
                network.inject(tile, 0, Event::new(tile as u32, tile as u32, n as f64), n);
            }
        }
        network
            .run(&mut SystemSimulationCallbacks::default())
            .expect("Failed simulation");
        network.global_stats().received_events()
    });
    bench.bytes = (DIM * DIM * EVENTS) as u64;
}

fn idle(bench: &mut Bencher) {
    let config = NocConfiguration {
        mesh_dim_x: 8,
        mesh_dim_y: 8,
        proc_arr_dim_x: 2,
        proc_arr_dim_y: 2,
        reset_time: 10,
        simulation_time: 1000,
        ..Default::default()
    };
    let mut network = Network::from_config(config, &GlobalRoutingTable::new())
        .expect("Failed network construction");
    let mut callbacks = SystemSimulationCallbacks::default();
    bench.iter(|| {
        network
            .step_cycles(100, &mut callbacks)
            .expect("Failed simulation");
    });
}

benchmark_group!(benches, transpose, idle);
benchmark_main!(benches);

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

//! Events without a routing entry are dropped and flagged.

use aernoc::*;

fn config() -> NocConfiguration {
    NocConfiguration {
        mesh_dim_x: 2,
        mesh_dim_y: 2,
        reset_time: 3,
        simulation_time: 60,
        ..Default::default()
    }
}

#[test]
fn miss_at_the_source_router() {
    let _logger = env_logger::builder().try_init();
    let routing = GlobalRoutingTable::from_str("0: {7: [1]}\n1: {7: [4]}").unwrap();
    let mut network = Network::from_config(config(), &routing).unwrap();
    network.record_received_events();
    network.inject(0, 0, Event::new(99, 0, 0.0), 0);
    network.inject(0, 0, Event::new(7, 0, 1.0), 0);
    network.run(&mut SystemSimulationCallbacks::default()).unwrap();

    assert!(network.router(0).cam_lookup_failure());
    assert!(!network.router(1).cam_lookup_failure());
    assert!(network.global_stats().cam_failure());
    // the event behind the miss still gets through
    let received = network.pe(1, 0).received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].neuron_id, 7);
    assert_eq!(network.router(0).routed_events(), 1);
}

#[test]
fn miss_on_the_way() {
    let routing = GlobalRoutingTable::from_str("0: {7: [1]}").unwrap();
    let mut network = Network::from_config(config(), &routing).unwrap();
    network.inject(0, 0, Event::new(7, 0, 0.0), 0);
    network.run(&mut SystemSimulationCallbacks::default()).unwrap();

    assert!(!network.router(0).cam_lookup_failure());
    assert!(network.router(1).cam_lookup_failure());
    assert_eq!(network.router(0).routed_events(), 1);
    assert_eq!(network.router(1).routed_events(), 0);
    assert_eq!(network.global_stats().received_events(), 0);
    assert!(!network.router(1).is_busy());

    let mut report = Vec::new();
    network
        .global_stats()
        .write_report(&mut report, false)
        .unwrap();
    let report = String::from_utf8(report).unwrap();
    assert!(report.contains("% CAM look-up failure: true"));
    assert!(report.contains("% Total received events: 0"));
}

#[test]
fn entry_without_outputs_is_rejected() {
    let routing = GlobalRoutingTable::from_str("0: {7: []}").unwrap();
    assert_eq!(
        Network::from_config(config(), &routing).unwrap_err(),
        Error::EmptyFanOut { router: 0, key: 7 }
    );
}

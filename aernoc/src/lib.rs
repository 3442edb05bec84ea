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

mod assignment;
mod error;
mod event;
mod hw;
mod ports;
mod routing;
mod sim;
mod stats;
mod vcd;

// Public types
// type to use for cycles
pub type Cycle = usize;

pub use crate::assignment::{LocalEventQueue, NeuronAssignmentTable, PeAssignment, SpikeRecord};
pub use crate::error::Error;
pub use crate::event::Event;
pub use crate::hw::arbiter::Arbiter;
pub use crate::hw::buffer::Buffer;
pub use crate::hw::config::{NocConfiguration, Topology};
pub use crate::hw::link::{Backward, Channel, ChannelId, Forward, Signal};
pub use crate::hw::pe::ProcessingElement;
pub use crate::hw::power::{
    DynamicEnergy, Power, PowerConfiguration, PowerModel, RouterEnergyTables, StaticEnergy,
};
pub use crate::hw::router::Router;
pub use crate::hw::sram::Sram;
pub use crate::hw::tcam::Tcam;
pub use crate::hw::topologies::{boundary_ports, mesh, torus, Link, TopologyGraph};
pub use crate::ports::{Port, DIRECTIONS};
pub use crate::routing::{GlobalRoutingTable, RoutingTable};
pub use crate::sim::{Network, SystemSimulationCallbacks};
pub use crate::stats::{CommHistory, GlobalStats, Stats};
pub use crate::vcd::{VcdComponent, VcdWriter};

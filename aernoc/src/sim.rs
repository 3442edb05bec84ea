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

use petgraph::visit::EdgeRef;
use std::cell::RefCell;
use std::io;
use std::path::Path;
use std::rc::Rc;

use crate::vcd::{VcdComponent, VcdWriter, DEFAULT_TOP_MODULE};
use crate::{
    mesh, torus, Channel, Cycle, Error, Event, GlobalRoutingTable, GlobalStats, LocalEventQueue,
    NeuronAssignmentTable, NocConfiguration, Port, PowerConfiguration, ProcessingElement, Router,
    Topology, TopologyGraph,
};

#[derive(Default)]
pub struct SystemSimulationCallbacks {
    vcd_writer: Option<Rc<RefCell<VcdWriter>>>,
}

impl SystemSimulationCallbacks {
    pub fn get_vcd_writer(&self) -> Option<Rc<RefCell<VcdWriter>>> {
        self.vcd_writer.as_ref().map(Rc::clone)
    }

    /// trace every cycle into the VCD file at `path`.
    pub fn create_vcd_callbacks<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self {
            vcd_writer: Some(Rc::new(RefCell::new(VcdWriter::new(path)?))),
        })
    }

    pub fn vcd<F>(&mut self, f: F)
    where
        F: FnOnce(Rc<RefCell<VcdWriter>>),
    {
        if let Some(writer) = self.get_vcd_writer() {
            f(writer);
        }
    }
}

/// A network of tiles, each a router with its processing elements.
///
/// Routers and PEs live in arenas indexed by tile id (PEs by their absolute
/// id `tile * pes_per_tile + local`). They talk only through the channels,
/// one per simplex link of the topology and two per PE.
#[derive(Debug)]
pub struct Network {
    config: NocConfiguration,
    topology: TopologyGraph,
    routers: Vec<Router>,
    pes: Vec<ProcessingElement>,
    channels: Vec<Channel>,
    cycle: Cycle,
}

impl Network {
    pub fn from_config(config: NocConfiguration, routing: &GlobalRoutingTable) -> Result<Self, Error> {
        config.validate()?;
        routing.validate(config.tile_count(), config.radix())?;

        let topology = match config.topology {
            Topology::Mesh => mesh(&config.dims()),
            Topology::Torus => torus(&config.dims()),
        };
        let pes_per_tile = config.pes_per_tile();
        let mut routers = (0..config.tile_count())
            .map(|id| Router::new(id, &config, &routing.local_table(id)))
            .collect::<Vec<_>>();
        let mut pes = Vec::with_capacity(config.tile_count() * pes_per_tile);
        let mut channels = Vec::new();

        for edge in topology.edge_references() {
            let (src, dst) = (edge.source().index(), edge.target().index());
            let link = edge.weight();
            let id = channels.len();
            channels.push(Channel::new(&format!(
                "{}.{}->{}.{}",
                routers[src].name(),
                link.src_port,
                routers[dst].name(),
                link.dst_port
            )));
            routers[src].bind_tx(link.src_port, id);
            routers[dst].bind_rx(link.dst_port, id);
        }
        for router in routers.iter_mut() {
            for k in 0..pes_per_tile {
                let mut pe = ProcessingElement::new(router.id(), k, pes_per_tile);
                let down = channels.len();
                channels.push(Channel::new(&format!("{}->pe_{}", router.name(), pe.id())));
                let up = down + 1;
                channels.push(Channel::new(&format!("pe_{}->{}", pe.id(), router.name())));
                router.bind_tx(Port::Local(k), down);
                pe.bind_rx(down);
                pe.bind_tx(up);
                router.bind_rx(Port::Local(k), up);
                pes.push(pe);
            }
        }

        // an event sent through a port without a link would vanish
        for id in routing.router_ids() {
            for (_, ports) in routing.local_table(id).iter() {
                if let Some(port) = ports.iter().find(|&&p| !routers[id].is_tx_bound(p)) {
                    return Err(Error::UnconnectedPort {
                        router: id,
                        port: *port,
                    });
                }
            }
        }

        log::info!(
            "{:?} {}x{}, {} PEs per tile, {} channels",
            config.topology,
            config.mesh_dim_x,
            config.mesh_dim_y,
            pes_per_tile,
            channels.len()
        );
        Ok(Self {
            config,
            topology,
            routers,
            pes,
            channels,
            cycle: 0,
        })
    }

    /// Fill the event queue of every PE from its spike recorder.
    pub fn load_spikes(&mut self, assignment: &NeuronAssignmentTable) -> anyhow::Result<()> {
        let config = &self.config;
        for pe in self.pes.iter_mut() {
            match assignment.spike_params(pe.id()) {
                Ok(params) => {
                    let queue = LocalEventQueue::from_file(
                        &params.spike_recorder,
                        params.first_neuron,
                        params.second_neuron,
                        config.nest_spk_det_skip_lines,
                        config.nest_t_presim,
                    )?;
                    pe.load_queue(&queue, config);
                }
                Err(err) => log::warn!("{}, the PE stays silent", err),
            }
        }
        Ok(())
    }

    /// Account energy in every router with the coefficients `tables` hold
    /// for this network.
    pub fn configure_power(&mut self, tables: &PowerConfiguration) -> Result<(), Error> {
        let model = tables.router_model(&self.config)?;
        log::debug!("router power model {:?}", model);
        for router in self.routers.iter_mut() {
            router.set_power_model(model.clone());
        }
        Ok(())
    }

    pub fn config(&self) -> &NocConfiguration {
        &self.config
    }

    pub fn topology(&self) -> &TopologyGraph {
        &self.topology
    }

    pub fn routers(&self) -> &[Router] {
        &self.routers
    }

    pub fn router(&self, id: usize) -> &Router {
        &self.routers[id]
    }

    pub fn pes(&self) -> &[ProcessingElement] {
        &self.pes
    }

    pub fn pe(&self, tile: usize, local: usize) -> &ProcessingElement {
        &self.pes[tile * self.config.pes_per_tile() + local]
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn cycle(&self) -> Cycle {
        self.cycle
    }

    /// Queue `evt` at PE `local` of `tile`, for emission at or after cycle
    /// `release`.
    pub fn inject(&mut self, tile: usize, local: usize, evt: Event, release: Cycle) {
        let id = tile * self.config.pes_per_tile() + local;
        self.pes[id].inject(evt, release);
    }

    /// let every PE keep the events delivered to it.
    pub fn record_received_events(&mut self) {
        for pe in self.pes.iter_mut() {
            pe.record_received();
        }
    }

    pub fn global_stats(&self) -> GlobalStats {
        GlobalStats::new(self)
    }

    pub fn write_vcd_header(&self, callbacks: &mut SystemSimulationCallbacks) {
        callbacks.vcd(|writer| VcdWriter::write_header(writer, &self.routers));
    }

    /// Advance every component by one clock cycle.
    ///
    /// All routers and then all PEs compute their next state from the
    /// current view of the channels, then all channels commit at once.
    pub fn simulate_system_one_cycle(
        &mut self,
        reset: bool,
        callbacks: &mut SystemSimulationCallbacks,
    ) -> Result<(), Error> {
        let now = self.cycle;
        log::trace!("cycle {}{}", now, if reset { ", reset" } else { "" });
        let _vcd_trace_scope = callbacks
            .get_vcd_writer()
            .map(|writer| VcdWriter::managed_trace_scope(writer, DEFAULT_TOP_MODULE));
        callbacks.vcd(|writer| writer.borrow_mut().enter_cycle());

        for router in self.routers.iter_mut() {
            router.step(&mut self.channels, now, reset)?;
        }
        for pe in self.pes.iter_mut() {
            pe.step(&mut self.channels, now, reset);
        }
        for channel in self.channels.iter_mut() {
            channel.commit();
        }
        self.cycle += 1;

        let (cycle, routers) = (self.cycle, &self.routers);
        callbacks.vcd(|writer| {
            writer.borrow_mut().change_vector("sim_cycles", cycle as u64);
            for router in routers {
                router.vcd_trace(Rc::clone(&writer));
            }
        });
        Ok(())
    }

    pub fn reset_cycles(
        &mut self,
        cycles: usize,
        callbacks: &mut SystemSimulationCallbacks,
    ) -> Result<(), Error> {
        for _ in 0..cycles {
            self.simulate_system_one_cycle(true, callbacks)?;
        }
        Ok(())
    }

    pub fn step_cycles(
        &mut self,
        cycles: usize,
        callbacks: &mut SystemSimulationCallbacks,
    ) -> Result<(), Error> {
        for _ in 0..cycles {
            self.simulate_system_one_cycle(false, callbacks)?;
        }
        Ok(())
    }

    /// Hold reset for `reset_time` cycles, then run for `simulation_time`
    /// cycles.
    pub fn run(&mut self, callbacks: &mut SystemSimulationCallbacks) -> Result<(), Error> {
        self.write_vcd_header(callbacks);
        log::info!("reset for {} cycles", self.config.reset_time);
        self.reset_cycles(self.config.reset_time, callbacks)?;
        log::info!("simulating {} cycles", self.config.simulation_time);
        self.step_cycles(self.config.simulation_time, callbacks)?;
        log::info!(
            "done at cycle {}, {} events delivered",
            self.cycle,
            self.pes.iter().map(|pe| pe.received_events()).sum::<usize>()
        );
        Ok(())
    }
}

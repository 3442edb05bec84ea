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

use itertools::Itertools;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use crate::hw::link::{read_bwd, read_fwd, write_bwd, write_fwd};
use crate::hw::topologies::boundary_ports;
use crate::vcd::{VcdComponent, VcdWriter};
use crate::{
    Arbiter, Backward, Buffer, Channel, ChannelId, Cycle, Error, Event, Forward, NocConfiguration,
    Port, Power, PowerModel, RoutingTable, Sram, Stats, Tcam, Topology, DIRECTIONS,
};

/// An event with the TCAM address of its fan-out, between the TCAM and SRAM
/// stages.
#[derive(Clone, Copy, Debug)]
struct Addressed {
    evt: Event,
    grant: usize,
    addr: usize,
}

/// An event with its resolved fan-out.
#[derive(Clone, Debug)]
struct Routed {
    evt: Event,
    grant: usize,
    ports: BTreeSet<Port>,
}

/// The router of a tile.
///
/// Every cycle the router runs six stages: admission of new events into the
/// input buffers, arbitration among the buffers, TCAM lookup, SRAM lookup,
/// the crossbar, and the line traversal to the outputs. The stages are
/// evaluated back to front, so that every stage consumes what its
/// predecessor latched in the previous cycle.
///
/// `en_pipe` is driven by the line traversal: when a fan-out cannot be
/// delivered to all of its targets the pipeline behind it freezes, while
/// admission keeps filling the buffers.
#[derive(Debug)]
pub struct Router {
    id: usize,
    name: String,
    radix: usize,

    buffers: Vec<Buffer>,
    arbiter: Arbiter,
    tcam: Tcam,
    sram: Sram,

    /// round robin pointer of the arbitration
    start_from_port: usize,
    en_pipe: bool,

    // alternating bit state per port
    level_rx: Vec<bool>,
    level_tx: Vec<bool>,

    // pipeline latches
    evt_from_arbiter: Option<Event>,
    from_tcam: Option<Addressed>,
    from_sram: Option<Routed>,
    from_xbar: Option<Routed>,

    cam_lookup_failure: bool,
    routed_evts: u64,
    stats: Stats,
    power: Power,

    rx: Vec<Option<ChannelId>>,
    tx: Vec<Option<ChannelId>>,
}

impl Router {
    pub fn new(id: usize, config: &NocConfiguration, table: &RoutingTable) -> Self {
        let radix = config.radix();
        let name = format!("router_{}", id);
        let mut buffers = (0..radix)
            .map(|i| {
                Buffer::new(&format!("{}->buffer[{}]", name, i), config.buffer_depth)
                    .with_deadlock_threshold(config.deadlock_threshold)
                    .with_stats_window(config.reset_time, config.stats_warm_up_time)
            })
            .collect::<Vec<_>>();
        if config.topology == Topology::Mesh {
            for port in boundary_ports(id, &config.dims()) {
                buffers[port.index()].disable();
            }
        }
        log::debug!(
            "{}: radix {}, {} routing entries, disabled inputs [{}]",
            name,
            radix,
            table.len(),
            buffers
                .iter()
                .enumerate()
                .filter(|(_, b)| !b.is_enabled())
                .map(|(i, _)| Port::from(i))
                .format(",")
        );
        Self {
            id,
            radix,
            buffers,
            arbiter: Arbiter::new(),
            tcam: Tcam::from_table(table),
            sram: Sram::from_table(table),
            start_from_port: Port::North.index(),
            en_pipe: true,
            level_rx: vec![false; radix],
            level_tx: vec![false; radix],
            evt_from_arbiter: None,
            from_tcam: None,
            from_sram: None,
            from_xbar: None,
            cam_lookup_failure: false,
            routed_evts: 0,
            stats: Stats::new(id, config),
            power: Power::default(),
            rx: vec![None; radix],
            tx: vec![None; radix],
            name,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn radix(&self) -> usize {
        self.radix
    }

    /// attach the channel this router receives on at `port`.
    pub fn bind_rx(&mut self, port: Port, channel: ChannelId) {
        self.rx[port.index()] = Some(channel);
    }

    /// attach the channel this router sends on at `port`.
    pub fn bind_tx(&mut self, port: Port, channel: ChannelId) {
        self.tx[port.index()] = Some(channel);
    }

    pub fn is_tx_bound(&self, port: Port) -> bool {
        self.tx.get(port.index()).map_or(false, |c| c.is_some())
    }

    pub fn buffers(&self) -> &[Buffer] {
        &self.buffers
    }

    pub fn buffer(&self, port: Port) -> &Buffer {
        &self.buffers[port.index()]
    }

    pub fn arbiter(&self) -> &Arbiter {
        &self.arbiter
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn power(&self) -> &Power {
        &self.power
    }

    /// start accounting energy with `model`, from zero.
    pub fn set_power_model(&mut self, model: PowerModel) {
        self.power = Power::new(model);
    }

    /// set once an event was dropped for lack of a route: a TCAM miss or an
    /// entry without output ports.
    pub fn cam_lookup_failure(&self) -> bool {
        self.cam_lookup_failure
    }

    /// number of fan-outs delivered since the last reset.
    pub fn routed_events(&self) -> u64 {
        self.routed_evts
    }

    pub fn en_pipe(&self) -> bool {
        self.en_pipe
    }

    /// true while an event sits anywhere between arbitration and the outputs.
    pub fn is_busy(&self) -> bool {
        !self.arbiter.is_available()
            || self.from_tcam.is_some()
            || self.from_sram.is_some()
            || self.from_xbar.is_some()
    }

    /// Advance the router by one clock cycle.
    ///
    /// Reads the committed view of `channels` and writes their next view.
    /// While `reset` is asserted every stage runs its reset branch.
    pub fn step(&mut self, channels: &mut [Channel], now: Cycle, reset: bool) -> Result<(), Error> {
        if reset {
            self.reset(channels);
            return Ok(());
        }
        self.line_traversal(channels, now);
        self.switch_traversal();
        self.sram_look_up()?;
        self.tcam_look_up()?;
        self.arbitration(now)?;
        self.buffer_write(channels, now)?;
        for buffer in self.buffers.iter_mut() {
            buffer.deadlock_check(now)?;
        }
        self.power.leakage(self.radix, self.radix - DIRECTIONS);
        Ok(())
    }

    fn reset(&mut self, channels: &mut [Channel]) {
        for i in 0..self.radix {
            self.level_rx[i] = false;
            self.level_tx[i] = false;
            write_bwd(channels, self.rx[i], Backward::default());
            let fwd = read_fwd(channels, self.tx[i]);
            write_fwd(channels, self.tx[i], Forward { req: false, ..fwd });
        }
        self.routed_evts = 0;
        self.arbiter.force_release();
        self.evt_from_arbiter = None;
        self.from_tcam = None;
        self.from_sram = None;
        self.from_xbar = None;
        self.en_pipe = true;
    }

    // stage 1: accept at most one new event per input.
    fn buffer_write(&mut self, channels: &mut [Channel], now: Cycle) -> Result<(), Error> {
        for i in 0..self.radix {
            let fwd = read_fwd(channels, self.rx[i]);
            if fwd.req != self.level_rx[i] {
                if self.buffers[i].is_full() {
                    log::error!(
                        "{}: input {} buffer full, event {}",
                        self.name,
                        Port::from(i),
                        fwd.evt
                    );
                    return Err(Error::AdmissionWhileFull {
                        router: self.id,
                        port: Port::from(i),
                    });
                }
                self.buffers[i].push(fwd.evt, now)?;
                self.power.buffer_push();
                // injected by one of our own PEs
                if fwd.evt.src_id as usize / (self.radix - DIRECTIONS) == self.id {
                    self.power.network_interface();
                }
                self.level_rx[i] = !self.level_rx[i];
                log::trace!("{}: input {} collects {}", self.name, Port::from(i), fwd.evt);
            }
            write_bwd(
                channels,
                self.rx[i],
                Backward {
                    ack: self.level_rx[i],
                    full: self.buffers[i].is_full(),
                },
            );
        }
        Ok(())
    }

    // stage 2: round robin over the inputs, starting at `start_from_port`.
    fn arbitration(&mut self, now: Cycle) -> Result<(), Error> {
        if !self.en_pipe || !self.arbiter.is_available() {
            return Ok(());
        }
        let radix = self.radix;
        let start = self.start_from_port;
        if let Some(i) = (0..radix)
            .map(|j| (start + j) % radix)
            .find(|&i| !self.buffers[i].is_empty())
        {
            self.arbiter.reserve(i)?;
            self.power.buffer_front();
            let evt = self.buffers[i].pop(now)?;
            self.power.buffer_pop();
            self.power.arbitration();
            log::trace!("{}: arbiter grants input {} to {}", self.name, Port::from(i), evt);
            self.evt_from_arbiter = Some(evt);
            self.start_from_port = (self.start_from_port + 1) % radix;
        }
        Ok(())
    }

    // stage 3: a miss drops the event and raises the failure flag.
    fn tcam_look_up(&mut self) -> Result<(), Error> {
        if !self.en_pipe {
            return Ok(());
        }
        let grant = match self.arbiter.grant() {
            Some(grant) => grant,
            None => return Ok(()),
        };
        let evt = self
            .evt_from_arbiter
            .take()
            .ok_or(Error::ArbiterNotReserved)?;
        match self.tcam.look_up(evt.neuron_id) {
            Some(addr) => {
                self.power.tcam_look_up();
                log::trace!("{}: TCAM resolves {} to address {}", self.name, evt, addr);
                self.from_tcam = Some(Addressed { evt, grant, addr });
            }
            None => {
                log::warn!(
                    "{}: TCAM look-up failed for {} from input {}, event dropped",
                    self.name,
                    evt,
                    Port::from(grant)
                );
                self.cam_lookup_failure = true;
            }
        }
        self.arbiter.release()
    }

    // stage 4
    fn sram_look_up(&mut self) -> Result<(), Error> {
        if !self.en_pipe {
            return Ok(());
        }
        if let Some(Addressed { evt, grant, addr }) = self.from_tcam.take() {
            let ports = match self.sram.look_up(addr) {
                Some(ports) => {
                    self.power.sram_look_up();
                    ports.clone()
                }
                None => {
                    log::error!(
                        "{}: SRAM look-up failed for address {} of {}",
                        self.name,
                        addr,
                        evt
                    );
                    return Err(Error::SramMiss {
                        router: self.id,
                        addr,
                    });
                }
            };
            if ports.is_empty() {
                log::warn!(
                    "{}: no output port for {} from input {}, event dropped",
                    self.name,
                    evt,
                    Port::from(grant)
                );
                self.cam_lookup_failure = true;
                return Ok(());
            }
            log::trace!("{}: SRAM resolves {} to [{}]", self.name, evt, ports.iter().format(","));
            self.from_sram = Some(Routed { evt, grant, ports });
        }
        Ok(())
    }

    // stage 5: plain register transfer into the output stage.
    fn switch_traversal(&mut self) {
        if !self.en_pipe {
            return;
        }
        if let Some(routed) = self.from_sram.take() {
            self.power.crossbar(routed.ports.len());
            log::trace!("{}: crossbar forwards {}", self.name, routed.evt);
            self.from_xbar = Some(routed);
        }
    }

    // stage 6: deliver to every target in the same cycle, or to none.
    fn line_traversal(&mut self, channels: &mut [Channel], now: Cycle) {
        let routed = match &self.from_xbar {
            Some(routed) => routed,
            None => return,
        };
        let all_ready = routed.ports.iter().all(|p| {
            let o = p.index();
            let bwd = read_bwd(channels, self.tx[o]);
            self.level_tx[o] == bwd.ack && !bwd.full
        });
        if !all_ready {
            log::trace!(
                "{}: cannot forward input {} to [{}], {}",
                self.name,
                Port::from(routed.grant),
                routed.ports.iter().format(","),
                routed.evt
            );
            self.en_pipe = false;
            return;
        }

        let mut evt = routed.evt;
        // counts the hop into a local PE too
        evt.hop_no += 1;
        log::trace!(
            "{}: input {} forwarded to [{}], {}",
            self.name,
            Port::from(routed.grant),
            routed.ports.iter().format(","),
            evt
        );
        for &port in routed.ports.iter() {
            let o = port.index();
            self.level_tx[o] = !self.level_tx[o];
            write_fwd(
                channels,
                self.tx[o],
                Forward {
                    evt,
                    req: self.level_tx[o],
                },
            );
            self.power.r2r_link();
            if let Port::Local(pe) = port {
                self.stats.received_event(now, pe, &evt);
                self.power.network_interface();
            }
        }
        self.routed_evts += 1;
        self.from_xbar = None;
        self.en_pipe = true;
    }
}

impl VcdComponent for Router {
    fn vcd_write_scope(&self, writer: Rc<RefCell<VcdWriter>>) {
        let _vcd_decl_scope = VcdWriter::managed_decl_scope(Rc::clone(&writer), self.name());
        let mut w = writer.borrow_mut();
        w.add_wire("en_pipe");
        w.add_integer_var::<u64>("routed_evts");
        for i in 0..self.radix {
            w.add_integer_var::<u32>(&format!("occupancy_{}", i));
            w.add_wire(&format!("ack_rx_{}", i));
            w.add_wire(&format!("req_tx_{}", i));
        }
    }

    fn vcd_init(&self, writer: Rc<RefCell<VcdWriter>>) {
        self.vcd_trace(writer);
    }

    fn vcd_trace(&self, writer: Rc<RefCell<VcdWriter>>) {
        let _vcd_trace_scope = VcdWriter::managed_trace_scope(Rc::clone(&writer), self.name());
        let mut w = writer.borrow_mut();
        w.change_vector("en_pipe", self.en_pipe as u64);
        w.change_vector("routed_evts", self.routed_evts);
        for i in 0..self.radix {
            w.change_vector(&format!("occupancy_{}", i), self.buffers[i].len() as u64);
            w.change_vector(&format!("ack_rx_{}", i), self.level_rx[i] as u64);
            w.change_vector(&format!("req_tx_{}", i), self.level_tx[i] as u64);
        }
    }
}

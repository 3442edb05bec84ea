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
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::{Cycle, DynamicEnergy, Event, Network, NocConfiguration, StaticEnergy};

/// Delivery history of one source at one destination PE.
#[derive(Clone, Debug, Default)]
pub struct CommHistory {
    pub src_id: u32,
    pub delays: Vec<i64>,
    pub total_received: usize,
    /// cycles since the end of the warm-up
    pub last_received: Cycle,
}

/// Parameters needed to turn arrival cycles into delays.
#[derive(Clone, Copy, Debug)]
struct TimeBase {
    reset_time: Cycle,
    warm_up: Cycle,
    clock_period_ps: f64,
    time_multiplier: f64,
}

impl From<&NocConfiguration> for TimeBase {
    fn from(config: &NocConfiguration) -> Self {
        Self {
            reset_time: config.reset_time,
            warm_up: config.stats_warm_up_time,
            clock_period_ps: config.clock_period_ps as f64,
            time_multiplier: config.nest_time_multiplier,
        }
    }
}

/// Delivery statistics of the processing elements of one tile, fed by the
/// router whenever it hands an event to a local PE.
#[derive(Clone, Debug)]
pub struct Stats {
    tile: usize,
    pes: usize,
    time: TimeBase,
    history: Vec<Vec<CommHistory>>,
    local_deliveries: usize,
}

impl Stats {
    pub fn new(tile: usize, config: &NocConfiguration) -> Self {
        let pes = config.pes_per_tile();
        Self {
            tile,
            pes,
            time: config.into(),
            history: vec![Vec::new(); pes],
            local_deliveries: 0,
        }
    }

    pub fn global_pe_id(&self, pe: usize) -> usize {
        self.tile * self.pes + pe
    }

    fn search(&self, src_id: u32, pe: usize) -> Option<&CommHistory> {
        self.history[pe].iter().find(|h| h.src_id == src_id)
    }

    /// record the arrival of `evt` at local PE `pe` at cycle `now`.
    pub fn received_event(&mut self, now: Cycle, pe: usize, evt: &Event) {
        if now < self.time.reset_time + self.time.warm_up {
            return;
        }
        let origin = (evt.timestamp * self.time.time_multiplier / self.time.clock_period_ps
            + self.time.reset_time as f64) as i64;
        let delay = now as i64 - origin;
        let last_received = now - self.time.reset_time - self.time.warm_up;

        let history = &mut self.history[pe];
        let i = match history.iter().position(|h| h.src_id == evt.src_id) {
            Some(i) => i,
            // first event from this source
            None => {
                history.push(CommHistory {
                    src_id: evt.src_id,
                    ..Default::default()
                });
                history.len() - 1
            }
        };
        history[i].delays.push(delay);
        history[i].total_received += 1;
        history[i].last_received = last_received;

        if evt.src_id as usize == self.global_pe_id(pe) {
            self.local_deliveries += 1;
        }
    }

    pub fn history(&self, pe: usize) -> &[CommHistory] {
        &self.history[pe]
    }

    pub fn average_delay_from(&self, src_id: u32, pe: usize) -> Option<f64> {
        self.search(src_id, pe).and_then(|h| {
            if h.delays.is_empty() {
                None
            } else {
                Some(h.delays.iter().sum::<i64>() as f64 / h.delays.len() as f64)
            }
        })
    }

    /// average over every event delivered to `pe`, `None` if there is none.
    pub fn average_delay(&self, pe: usize) -> Option<f64> {
        let received = self.received_events(pe);
        if received == 0 {
            return None;
        }
        let sum = self.history[pe]
            .iter()
            .flat_map(|h| h.delays.iter())
            .sum::<i64>();
        Some(sum as f64 / received as f64)
    }

    /// -1 when nothing was received.
    pub fn max_delay_from(&self, src_id: u32, pe: usize) -> i64 {
        self.search(src_id, pe)
            .and_then(|h| h.delays.iter().max().copied())
            .unwrap_or(-1)
    }

    pub fn max_delay(&self, pe: usize) -> i64 {
        self.history[pe]
            .iter()
            .flat_map(|h| h.delays.iter())
            .max()
            .copied()
            .unwrap_or(-1)
    }

    fn measured_cycles(&self, now: Cycle) -> Cycle {
        now.saturating_sub(self.time.warm_up + self.time.reset_time)
    }

    /// events per cycle from `src_id` at `pe`, -1 if nothing arrived.
    pub fn average_throughput_from(&self, src_id: u32, pe: usize, now: Cycle) -> f64 {
        match self.search(src_id, pe) {
            Some(h) if h.total_received > 0 && self.measured_cycles(now) > 0 => {
                h.total_received as f64 / self.measured_cycles(now) as f64
            }
            _ => -1.0,
        }
    }

    pub fn average_throughput(&self, pe: usize, now: Cycle) -> f64 {
        self.history[pe]
            .iter()
            .map(|h| self.average_throughput_from(h.src_id, pe, now))
            .filter(|&t| t > 0.0)
            .sum()
    }

    pub fn received_events(&self, pe: usize) -> usize {
        self.history[pe].iter().map(|h| h.total_received).sum()
    }

    pub fn total_communications(&self, pe: usize) -> usize {
        self.history[pe].len()
    }

    pub fn local_deliveries(&self) -> usize {
        self.local_deliveries
    }

    /// all delays recorded at `pe`, in arrival order per source.
    pub fn delays(&self, pe: usize) -> Vec<i64> {
        self.history[pe]
            .iter()
            .flat_map(|h| h.delays.iter().copied())
            .collect()
    }

    pub fn write_table<W: io::Write>(&self, out: &mut W, header: bool, now: Cycle) -> io::Result<()> {
        if header {
            writeln!(
                out,
                "%{:>5}{:>5}{:>10}{:>10}{:>15}{:>12}",
                "src", "dst", "delay avg", "delay max", "throughput", "received"
            )?;
            writeln!(
                out,
                "%{:>5}{:>5}{:>10}{:>10}{:>15}{:>12}",
                "", "", "cycles", "cycles", "evt/cycle", "evts"
            )?;
        }
        for pe in 0..self.pes {
            for h in self.history[pe].iter() {
                writeln!(
                    out,
                    " {:>5}{:>5}{:>10.3}{:>10}{:>15.6}{:>12}",
                    h.src_id,
                    self.global_pe_id(pe),
                    self.average_delay_from(h.src_id, pe).unwrap_or(-1.0),
                    self.max_delay_from(h.src_id, pe),
                    self.average_throughput_from(h.src_id, pe, now),
                    h.total_received
                )?;
            }
            if let Some(avg) = self.average_delay(pe) {
                writeln!(out, "% Aggregated average delay (cycles): {}", avg)?;
            }
            writeln!(
                out,
                "% Aggregated average throughput (evts/cycle): {}",
                self.average_throughput(pe, now)
            )?;
        }
        Ok(())
    }
}

/// Network wide figures, aggregated over all routers and PEs.
pub struct GlobalStats<'a> {
    network: &'a Network,
}

impl<'a> GlobalStats<'a> {
    pub fn new(network: &'a Network) -> Self {
        Self { network }
    }

    fn all_pes(&self) -> impl Iterator<Item = (&'a Stats, usize)> + 'a {
        let pes = self.network.config().pes_per_tile();
        self.network
            .routers()
            .iter()
            .flat_map(move |r| (0..pes).map(move |pe| (r.stats(), pe)))
    }

    pub fn received_events(&self) -> usize {
        self.all_pes().map(|(s, pe)| s.received_events(pe)).sum()
    }

    pub fn local_deliveries(&self) -> usize {
        self.network
            .routers()
            .iter()
            .map(|r| r.stats().local_deliveries())
            .sum()
    }

    /// `None` when no event reached any PE.
    pub fn average_delay(&self) -> Option<f64> {
        let (sum, count) = self
            .all_pes()
            .flat_map(|(s, pe)| s.history(pe).iter())
            .flat_map(|h| h.delays.iter())
            .fold((0i64, 0usize), |(sum, count), &d| (sum + d, count + 1));
        if count == 0 {
            None
        } else {
            Some(sum as f64 / count as f64)
        }
    }

    pub fn max_delay(&self) -> i64 {
        self.all_pes()
            .map(|(s, pe)| s.max_delay(pe))
            .max()
            .unwrap_or(-1)
    }

    /// delivered events per measured cycle, over the whole network.
    pub fn aggregated_throughput(&self) -> f64 {
        let config = self.network.config();
        let cycles = config.simulation_time - config.stats_warm_up_time;
        if cycles == 0 {
            return 0.0;
        }
        self.received_events() as f64 / cycles as f64
    }

    /// aggregated throughput per processing element.
    pub fn throughput(&self) -> f64 {
        let config = self.network.config();
        self.aggregated_throughput() / (config.tile_count() * config.pes_per_tile()) as f64
    }

    pub fn cam_failure(&self) -> bool {
        self.network
            .routers()
            .iter()
            .any(|r| r.cam_lookup_failure())
    }

    pub fn deadlock_detected(&self) -> bool {
        self.network
            .routers()
            .iter()
            .any(|r| r.buffers().iter().any(|b| b.deadlock_detected()))
    }

    /// routed events per router, one row per mesh row.
    pub fn routed_events_matrix(&self) -> Vec<Vec<u64>> {
        let dim_x = self.network.config().mesh_dim_x;
        self.network
            .routers()
            .chunks(dim_x)
            .map(|row| row.iter().map(|r| r.routed_events()).collect())
            .collect()
    }

    /// maximum delay per PE, laid out as the physical array of PEs.
    pub fn max_delay_matrix(&self) -> Vec<Vec<i64>> {
        let config = self.network.config();
        let (px, py) = (config.proc_arr_dim_x, config.proc_arr_dim_y);
        let mut mtx = vec![vec![-1; config.mesh_dim_x * px]; config.mesh_dim_y * py];
        for router in self.network.routers() {
            let (mx, my) = (router.id() % config.mesh_dim_x, router.id() / config.mesh_dim_x);
            for p_y in 0..py {
                for p_x in 0..px {
                    mtx[my * py + p_y][mx * px + p_x] = router.stats().max_delay(p_y * px + p_x);
                }
            }
        }
        mtx
    }

    pub fn dynamic_energy(&self) -> f64 {
        self.network
            .routers()
            .iter()
            .map(|r| r.power().dynamic_energy())
            .sum()
    }

    pub fn static_energy(&self) -> f64 {
        self.network
            .routers()
            .iter()
            .map(|r| r.power().static_energy())
            .sum()
    }

    /// energy in joules, network interfaces included.
    pub fn total_energy(&self) -> f64 {
        self.dynamic_energy() + self.static_energy()
    }

    /// dynamic energy per contributor, summed over all routers.
    pub fn dynamic_energy_breakdown(&self) -> BTreeMap<&'static str, f64> {
        let mut breakdown = BTreeMap::new();
        for router in self.network.routers() {
            for &what in DynamicEnergy::ALL.iter() {
                *breakdown.entry(what.label()).or_insert(0.0) += router.power().dynamic(what);
            }
        }
        breakdown
    }

    /// static energy per contributor, summed over all routers.
    pub fn static_energy_breakdown(&self) -> BTreeMap<&'static str, f64> {
        let mut breakdown = BTreeMap::new();
        for router in self.network.routers() {
            for &what in StaticEnergy::ALL.iter() {
                *breakdown.entry(what.label()).or_insert(0.0) += router.power().leakage_of(what);
            }
        }
        breakdown
    }

    /// every recorded delay, router by router and PE by PE.
    pub fn delays(&self) -> Vec<i64> {
        self.all_pes().flat_map(|(s, pe)| s.delays(pe)).collect()
    }

    pub fn write_delays_csv<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "#Delays collected from all nodes")?;
        for delay in self.delays() {
            writeln!(out, "{}", delay)?;
        }
        Ok(())
    }

    /// one `x, y, routed events` line per router, a blank line after each row.
    pub fn write_routed_events_csv<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "#Matrix containing the number of routed events per router")?;
        for (y, row) in self.routed_events_matrix().iter().enumerate() {
            for (x, n) in row.iter().enumerate() {
                writeln!(out, "{}, {}, {}", x, y, n)?;
            }
            writeln!(out)?;
        }
        Ok(())
    }

    /// Write `Delays<suffix>.csv` and `Evts_Routed<suffix>.csv` into `dir`,
    /// creating it if needed.
    pub fn write_csv_files<P: AsRef<Path>>(&self, dir: P, suffix: &str) -> io::Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let delays = dir.join(format!("Delays{}.csv", suffix));
        let mut out = BufWriter::new(File::create(&delays)?);
        self.write_delays_csv(&mut out)?;
        out.flush()?;
        let routed = dir.join(format!("Evts_Routed{}.csv", suffix));
        let mut out = BufWriter::new(File::create(&routed)?);
        self.write_routed_events_csv(&mut out)?;
        out.flush()?;
        log::info!(
            "statistics written to {} and {}",
            delays.display(),
            routed.display()
        );
        Ok(())
    }

    fn write_breakdown<W: io::Write>(
        out: &mut W,
        label: &str,
        breakdown: &BTreeMap<&'static str, f64>,
    ) -> io::Result<()> {
        writeln!(out, "{} = [", label)?;
        for (what, energy) in breakdown.iter() {
            writeln!(out, "\t{:e}\t % {}", energy, what)?;
        }
        writeln!(out, "];")
    }

    pub fn write_buffer_stats<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "% Buffer occupancy (mean, max) per router input")?;
        for router in self.network.routers() {
            write!(out, "{:>6}  ", router.id())?;
            for buffer in router.buffers() {
                buffer.write_stats(out)?;
            }
            writeln!(out)?;
        }
        writeln!(out)
    }

    pub fn write_report<W: io::Write>(&self, out: &mut W, detailed: bool) -> io::Result<()> {
        let now = self.network.cycle();
        if detailed {
            writeln!(out)?;
            writeln!(out, "detailed = [")?;
            for (i, router) in self.network.routers().iter().enumerate() {
                router.stats().write_table(out, i == 0, now)?;
            }
            writeln!(out, "];")?;

            writeln!(out)?;
            writeln!(out, "max_delay = [")?;
            for row in self.max_delay_matrix() {
                writeln!(out, "    {}", row.iter().map(|d| format!("{:>6}", d)).join(""))?;
            }
            writeln!(out, "];")?;

            writeln!(out)?;
            writeln!(out, "routed_evts = [")?;
            for row in self.routed_events_matrix() {
                writeln!(out, "    {}", row.iter().map(|n| format!("{:>10}", n)).join(""))?;
            }
            writeln!(out, "];")?;

            Self::write_breakdown(out, "power_dynamic", &self.dynamic_energy_breakdown())?;
            Self::write_breakdown(out, "power_static", &self.static_energy_breakdown())?;
        }
        writeln!(out, "% Total received events: {}", self.received_events())?;
        writeln!(out, "% Locally delivered events: {}", self.local_deliveries())?;
        match self.average_delay() {
            Some(avg) => writeln!(out, "% Global average delay (cycles): {}", avg)?,
            None => writeln!(out, "% Global average delay (cycles): n/a")?,
        }
        writeln!(out, "% Maximum delay (cycles): {}", self.max_delay())?;
        writeln!(
            out,
            "% Network throughput (evts/cycle): {}",
            self.aggregated_throughput()
        )?;
        writeln!(
            out,
            "% Average PE throughput (evts/cycle/PE): {}",
            self.throughput()
        )?;
        writeln!(out, "% Total energy (J): {}", self.total_energy())?;
        writeln!(out, "% \tDynamic energy (J): {}", self.dynamic_energy())?;
        writeln!(out, "% \tStatic energy (J): {}", self.static_energy())?;
        writeln!(
            out,
            "% CAM look-up failure: {}",
            if self.cam_failure() { "true" } else { "false" }
        )?;
        writeln!(out)
    }
}

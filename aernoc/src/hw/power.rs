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

//! Energy accounting of the routers.
//!
//! Every router stage charges its dynamic energy per operation, and every
//! cycle out of reset charges the leakage of the router, its buffers and its
//! network interfaces. The coefficients come from technology tables read
//! from YAML.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::{Error, NocConfiguration};

/// Energy tables, dynamic entries in joules per operation, leakage in watts.
///
/// Rows are looked up by their leading columns.
/// <pre>
/// Energy:
///   Buffer:        # [depth, item_size, leakage, push, front, pop]
///     - [4, 32, 1.0e-5, 2.0e-13, 1.0e-13, 2.0e-13]
///   LinkBitLine:   # [length_mm, leakage, dynamic], per bit line
///     - [0.5, 1.0e-7, 3.0e-15]
///   Router:
///     crossbar:          # [radix, item_size, outputs, leakage, dynamic]
///       - [5, 32, 1, 1.0e-5, 4.0e-13]
///     network_interface: # [link_width, leakage, dynamic]
///       - [32, 1.0e-6, 1.0e-13]
///     arbitration:       # [item_size, leakage, dynamic]
///       - [32, 1.0e-6, 5.0e-14]
///     tcam_access:       # [item_size, leakage, dynamic]
///       - [32, 1.0e-5, 6.0e-13]
///     sram_access:       # [item_size, leakage, dynamic]
///       - [32, 1.0e-5, 3.0e-13]
/// </pre>
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct PowerConfiguration {
    #[serde(rename = "Buffer")]
    pub buffer: Vec<[f64; 6]>,
    #[serde(rename = "LinkBitLine")]
    pub link_bit_line: Vec<[f64; 3]>,
    #[serde(rename = "Router")]
    pub router: RouterEnergyTables,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct RouterEnergyTables {
    pub crossbar: Vec<[f64; 5]>,
    pub network_interface: Vec<[f64; 3]>,
    pub arbitration: Vec<[f64; 3]>,
    pub tcam_access: Vec<[f64; 3]>,
    pub sram_access: Vec<[f64; 3]>,
}

#[derive(Deserialize, Serialize)]
struct PowerFile {
    #[serde(rename = "Energy")]
    energy: PowerConfiguration,
}

// first row whose leading columns equal `key`
fn find_row<'a, const N: usize>(rows: &'a [[f64; N]], key: &[f64]) -> Option<&'a [f64; N]> {
    rows.iter()
        .find(|row| key.iter().zip(row.iter()).all(|(k, v)| (k - v).abs() < 1e-9))
}

impl PowerConfiguration {
    pub fn from_file(file_name: &str) -> anyhow::Result<Self> {
        let file = File::open(Path::new(file_name))
            .with_context(|| format!("power configuration {} not found", file_name))?;
        let power: PowerFile = serde_yaml::from_reader(BufReader::new(file))
            .map_err(Error::from)
            .with_context(|| format!("failed loading power configuration {}", file_name))?;
        Ok(power.energy)
    }

    pub fn from_str(power: &str) -> Result<Self, Error> {
        let power: PowerFile = serde_yaml::from_str(power)?;
        Ok(power.energy)
    }

    /// Pick the coefficients of a router of `config`.
    ///
    /// Events are `evt_width` bits wide, on the links and in the buffers.
    pub fn router_model(&self, config: &NocConfiguration) -> Result<PowerModel, Error> {
        let width = config.evt_width as f64;
        let depth = config.buffer_depth as f64;
        let radix = config.radix();
        let w2j = |watts: f64| watts * config.clock_period_ps as f64 * 1.0e-12;
        let missing = |what: String| Error::MissingPowerEntry(what);

        let buffer = find_row(&self.buffer, &[depth, width]).ok_or_else(|| {
            missing(format!(
                "buffer depth {} item size {}",
                config.buffer_depth, config.evt_width
            ))
        })?;
        let link = find_row(&self.link_bit_line, &[config.r2r_link_length]).ok_or_else(|| {
            missing(format!("link length {}", config.r2r_link_length))
        })?;
        let router = &self.router;
        let stage = |rows: &[[f64; 3]], name: &str| {
            find_row(rows, &[width])
                .map(|row| (w2j(row[1]), row[2]))
                .ok_or_else(|| missing(format!("{} item size {}", name, config.evt_width)))
        };
        let (arbitration_s, arbitration_d) = stage(&router.arbitration, "arbitration")?;
        let (tcam_s, tcam_d) = stage(&router.tcam_access, "tcam_access")?;
        let (sram_s, sram_d) = stage(&router.sram_access, "sram_access")?;
        let (ni_s, ni_d) = stage(&router.network_interface, "network_interface")?;

        let mut crossbar = Vec::with_capacity(radix);
        for outputs in 1..=radix {
            let row = find_row(&router.crossbar, &[radix as f64, width, outputs as f64])
                .ok_or_else(|| {
                    missing(format!(
                        "crossbar radix {} item size {} outputs {}",
                        radix, config.evt_width, outputs
                    ))
                })?;
            crossbar.push((w2j(row[3]), row[4]));
        }

        Ok(PowerModel {
            buffer_s: w2j(buffer[2]),
            buffer_push_d: buffer[3],
            buffer_front_d: buffer[4],
            buffer_pop_d: buffer[5],
            arbitration_s,
            arbitration_d,
            tcam_s,
            tcam_d,
            sram_s,
            sram_d,
            crossbar_s: crossbar[0].0,
            crossbar_d: crossbar.iter().map(|&(_, d)| d).collect(),
            link_s: w2j(width * link[1]),
            link_d: width * link[2],
            ni_s,
            ni_d,
        })
    }
}

/// Per-operation energies (J) and per-cycle leakage energies (J) of one
/// router. The default model charges nothing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PowerModel {
    pub buffer_s: f64,
    pub buffer_push_d: f64,
    pub buffer_front_d: f64,
    pub buffer_pop_d: f64,
    pub arbitration_s: f64,
    pub arbitration_d: f64,
    pub tcam_s: f64,
    pub tcam_d: f64,
    pub sram_s: f64,
    pub sram_d: f64,
    /// leakage does not depend on the number of active outputs
    pub crossbar_s: f64,
    /// indexed by the number of active outputs minus one
    pub crossbar_d: Vec<f64>,
    /// link figures cover all bit lines
    pub link_s: f64,
    pub link_d: f64,
    pub ni_s: f64,
    pub ni_d: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DynamicEnergy {
    BufferPush,
    BufferPop,
    BufferFront,
    Arbitration,
    TcamLookUp,
    SramLookUp,
    Crossbar,
    LinkR2r,
    NetworkInterface,
}

impl DynamicEnergy {
    pub const ALL: [Self; 9] = [
        Self::BufferPush,
        Self::BufferPop,
        Self::BufferFront,
        Self::Arbitration,
        Self::TcamLookUp,
        Self::SramLookUp,
        Self::Crossbar,
        Self::LinkR2r,
        Self::NetworkInterface,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::BufferPush => "buffer_push_pwr_d",
            Self::BufferPop => "buffer_pop_pwr_d",
            Self::BufferFront => "buffer_front_pwr_d",
            Self::Arbitration => "arbitration_pwr_d",
            Self::TcamLookUp => "tcam_lookup_pwr_d",
            Self::SramLookUp => "sram_lookup_pwr_d",
            Self::Crossbar => "crossbar_pwr_d",
            Self::LinkR2r => "link_r2r_pwr_d",
            Self::NetworkInterface => "ni_pwr_d",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StaticEnergy {
    BufferRouter,
    Arbitration,
    Tcam,
    Sram,
    Crossbar,
    NetworkInterface,
}

impl StaticEnergy {
    pub const ALL: [Self; 6] = [
        Self::BufferRouter,
        Self::Arbitration,
        Self::Tcam,
        Self::Sram,
        Self::Crossbar,
        Self::NetworkInterface,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::BufferRouter => "buffer_router_pwr_s",
            Self::Arbitration => "arbitration_pwr_s",
            Self::Tcam => "tcam_pwr_s",
            Self::Sram => "sram_pwr_s",
            Self::Crossbar => "crossbar_pwr_s",
            Self::NetworkInterface => "ni_pwr_s",
        }
    }
}

/// Energy spent by one router so far, split by contributor.
#[derive(Clone, Debug, Default)]
pub struct Power {
    model: PowerModel,
    dynamic: [f64; 9],
    leakage: [f64; 6],
}

impl Power {
    pub fn new(model: PowerModel) -> Self {
        Self {
            model,
            ..Default::default()
        }
    }

    pub fn model(&self) -> &PowerModel {
        &self.model
    }

    fn charge(&mut self, what: DynamicEnergy, energy: f64) {
        self.dynamic[what as usize] += energy;
    }

    fn leak(&mut self, what: StaticEnergy, energy: f64) {
        self.leakage[what as usize] += energy;
    }

    pub fn buffer_push(&mut self) {
        self.charge(DynamicEnergy::BufferPush, self.model.buffer_push_d);
    }

    pub fn buffer_front(&mut self) {
        self.charge(DynamicEnergy::BufferFront, self.model.buffer_front_d);
    }

    pub fn buffer_pop(&mut self) {
        self.charge(DynamicEnergy::BufferPop, self.model.buffer_pop_d);
    }

    pub fn arbitration(&mut self) {
        self.charge(DynamicEnergy::Arbitration, self.model.arbitration_d);
    }

    pub fn tcam_look_up(&mut self) {
        self.charge(DynamicEnergy::TcamLookUp, self.model.tcam_d);
    }

    pub fn sram_look_up(&mut self) {
        self.charge(DynamicEnergy::SramLookUp, self.model.sram_d);
    }

    /// a crossbar pass with `outputs` active outputs.
    pub fn crossbar(&mut self, outputs: usize) {
        let energy = outputs
            .checked_sub(1)
            .and_then(|i| self.model.crossbar_d.get(i))
            .copied()
            .unwrap_or(0.0);
        self.charge(DynamicEnergy::Crossbar, energy);
    }

    /// one event over a link, to a neighbor or to a local PE.
    pub fn r2r_link(&mut self) {
        self.charge(DynamicEnergy::LinkR2r, self.model.link_d);
    }

    pub fn network_interface(&mut self) {
        self.charge(DynamicEnergy::NetworkInterface, self.model.ni_d);
    }

    /// one cycle of leakage of a router with `buffers` inputs and `pes`
    /// network interfaces.
    pub fn leakage(&mut self, buffers: usize, pes: usize) {
        let m = &self.model;
        let charges = [
            (StaticEnergy::Arbitration, m.arbitration_s),
            (StaticEnergy::Tcam, m.tcam_s),
            (StaticEnergy::Sram, m.sram_s),
            (StaticEnergy::Crossbar, m.crossbar_s),
            (StaticEnergy::BufferRouter, buffers as f64 * m.buffer_s),
            (StaticEnergy::NetworkInterface, pes as f64 * m.ni_s),
        ];
        for (what, energy) in charges.iter() {
            self.leak(*what, *energy);
        }
    }

    pub fn dynamic(&self, what: DynamicEnergy) -> f64 {
        self.dynamic[what as usize]
    }

    pub fn leakage_of(&self, what: StaticEnergy) -> f64 {
        self.leakage[what as usize]
    }

    pub fn dynamic_energy(&self) -> f64 {
        self.dynamic.iter().sum()
    }

    pub fn static_energy(&self) -> f64 {
        self.leakage.iter().sum()
    }

    pub fn total_energy(&self) -> f64 {
        self.dynamic_energy() + self.static_energy()
    }
}

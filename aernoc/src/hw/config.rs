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

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::hw::buffer::DEFAULT_DEADLOCK_THRESHOLD;
use crate::{Cycle, Error, DIRECTIONS};

/// A default buffer depth, applied to every router input.
pub const BUFFER_DEPTH: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum Topology {
    #[serde(alias = "TOPOLOGY_MESH", alias = "mesh")]
    Mesh,
    #[serde(alias = "TOPOLOGY_TORUS", alias = "torus")]
    Torus,
}

impl Default for Topology {
    fn default() -> Self {
        Self::Mesh
    }
}

impl std::str::FromStr for Topology {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mesh" | "topology_mesh" => Ok(Self::Mesh),
            "torus" | "topology_torus" => Ok(Self::Torus),
            _ => Err(Error::InvalidConfiguration(format!(
                "unknown topology {}",
                s
            ))),
        }
    }
}

/// provides the set of parameters of a network and its simulation
///
/// constructed programmatically or read from a config file. Keys missing from
/// the file take their default values.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct NocConfiguration {
    pub topology: Topology,
    pub mesh_dim_x: usize,
    pub mesh_dim_y: usize,
    /// the processing elements of a tile form a proc_arr_dim_x * proc_arr_dim_y array
    pub proc_arr_dim_x: usize,
    pub proc_arr_dim_y: usize,
    pub buffer_depth: usize,
    pub deadlock_threshold: usize,
    pub clock_period_ps: usize,
    pub reset_time: Cycle,
    pub stats_warm_up_time: Cycle,
    pub simulation_time: Cycle,
    pub routing_table_filename: Option<String>,
    pub gnat_filename: Option<String>,
    /// converts spike times into picoseconds
    pub nest_time_multiplier: f64,
    /// spike times before this offset belong to the pre-simulation
    pub nest_t_presim: f64,
    pub nest_spk_det_skip_lines: usize,
    pub show_buffer_stats: bool,
    pub detailed: bool,
    pub vcd_filename: Option<String>,
    /// energy tables; without them no energy is accounted
    pub power_config_filename: Option<String>,
    /// bits per event, on the links and in the buffers
    pub evt_width: usize,
    /// router to router link length in mm
    pub r2r_link_length: f64,
    /// write the delays and routed events as CSV into `output_dir`
    pub create_output_files: bool,
    pub output_dir: String,
    pub output_file_suffix: String,
}

impl Default for NocConfiguration {
    fn default() -> Self {
        Self {
            topology: Topology::Mesh,
            mesh_dim_x: 4,
            mesh_dim_y: 4,
            proc_arr_dim_x: 1,
            proc_arr_dim_y: 1,
            buffer_depth: BUFFER_DEPTH,
            deadlock_threshold: DEFAULT_DEADLOCK_THRESHOLD,
            clock_period_ps: 1000,
            reset_time: 1000,
            stats_warm_up_time: 0,
            simulation_time: 10000,
            routing_table_filename: None,
            gnat_filename: None,
            nest_time_multiplier: 1e9,
            nest_t_presim: 500.0,
            nest_spk_det_skip_lines: 3,
            show_buffer_stats: false,
            detailed: false,
            vcd_filename: None,
            power_config_filename: None,
            evt_width: 32,
            r2r_link_length: 0.5,
            create_output_files: false,
            output_dir: "data".to_string(),
            output_file_suffix: String::new(),
        }
    }
}

impl NocConfiguration {
    pub fn from_file(file_name: &str) -> anyhow::Result<Self> {
        let file = File::open(Path::new(file_name))
            .with_context(|| format!("configuration file {} not found", file_name))?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)
            .map_err(Error::from)
            .with_context(|| format!("failed loading configuration {}", file_name))?;
        Ok(config)
    }

    pub fn from_str(config: &str) -> Result<Self, Error> {
        Ok(serde_yaml::from_str(config)?)
    }

    pub fn pes_per_tile(&self) -> usize {
        self.proc_arr_dim_x * self.proc_arr_dim_y
    }

    /// number of router ports: the compass directions plus one per PE.
    pub fn radix(&self) -> usize {
        DIRECTIONS + self.pes_per_tile()
    }

    pub fn tile_count(&self) -> usize {
        self.mesh_dim_x * self.mesh_dim_y
    }

    pub fn dims(&self) -> [usize; 2] {
        [self.mesh_dim_x, self.mesh_dim_y]
    }

    /// cycle at which a spike at `time` (in spike source units) is due.
    pub fn release_cycle(&self, time: f64) -> Cycle {
        let cycles = time * self.nest_time_multiplier / self.clock_period_ps as f64;
        self.reset_time + cycles.max(0.0) as Cycle
    }

    pub fn validate(&self) -> Result<(), Error> {
        let check = |ok: bool, msg: &str| {
            if ok {
                Ok(())
            } else {
                Err(Error::InvalidConfiguration(msg.to_string()))
            }
        };
        check(self.mesh_dim_x > 1, "mesh_dim_x must be greater than 1")?;
        check(self.mesh_dim_y > 1, "mesh_dim_y must be greater than 1")?;
        check(self.proc_arr_dim_x >= 1, "proc_arr_dim_x must be at least 1")?;
        check(self.proc_arr_dim_y >= 1, "proc_arr_dim_y must be at least 1")?;
        check(self.buffer_depth >= 1, "buffer_depth must be at least 1")?;
        check(
            self.deadlock_threshold >= 1,
            "deadlock_threshold must be at least 1",
        )?;
        check(self.clock_period_ps >= 1, "clock_period_ps must be at least 1")?;
        check(
            self.simulation_time >= self.stats_warm_up_time,
            "simulation_time must not be shorter than stats_warm_up_time",
        )?;
        check(
            self.nest_time_multiplier >= 1.0,
            "nest_time_multiplier must be at least 1",
        )?;
        check(self.nest_t_presim >= 0.0, "nest_t_presim must not be negative")?;
        check(self.evt_width >= 1, "evt_width must be at least 1")?;
        check(
            self.r2r_link_length >= 0.0,
            "r2r_link_length must not be negative",
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_yaml_config() {
        let conf_str = "---
topology: TOPOLOGY_TORUS
mesh_dim_x: 3
mesh_dim_y: 2
proc_arr_dim_x: 2
proc_arr_dim_y: 2
buffer_depth: 4
reset_time: 10
simulation_time: 500
routing_table_filename: rt.yaml
";
        let config = NocConfiguration::from_str(conf_str).unwrap();
        assert_eq!(config.topology, Topology::Torus);
        assert_eq!(config.tile_count(), 6);
        assert_eq!(config.pes_per_tile(), 4);
        assert_eq!(config.radix(), 8);
        assert_eq!(config.buffer_depth, 4);
        assert_eq!(config.reset_time, 10);
        assert_eq!(config.routing_table_filename.as_deref(), Some("rt.yaml"));
        // defaults for everything else
        assert_eq!(config.deadlock_threshold, 50000);
        assert_eq!(config.clock_period_ps, 1000);
        assert_eq!(config.nest_spk_det_skip_lines, 3);
        assert!(config.gnat_filename.is_none());
        assert_eq!(config.evt_width, 32);
        assert_eq!(config.r2r_link_length, 0.5);
        assert_eq!(config.output_dir, "data");
        assert!(!config.create_output_files);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn write_yaml_config() {
        let config = NocConfiguration {
            topology: Topology::Torus,
            ..Default::default()
        };
        let text = serde_yaml::to_string(&config).unwrap();
        let back = NocConfiguration::from_str(&text).unwrap();
        assert_eq!(back.topology, Topology::Torus);
        assert_eq!(back.mesh_dim_x, config.mesh_dim_x);
    }

    #[test]
    fn validation() {
        let mut config = NocConfiguration::default();
        assert!(config.validate().is_ok());
        config.mesh_dim_y = 1;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfiguration(_))
        ));
        config.mesh_dim_y = 2;
        config.stats_warm_up_time = config.simulation_time + 1;
        assert!(config.validate().is_err());
        config.stats_warm_up_time = 0;
        config.r2r_link_length = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn release_cycles() {
        let config = NocConfiguration {
            reset_time: 100,
            clock_period_ps: 1000,
            nest_time_multiplier: 1e9,
            ..Default::default()
        };
        // 1 ms at 1 GHz
        assert_eq!(config.release_cycle(1.0), 100 + 1_000_000);
        assert_eq!(config.release_cycle(0.0), 100);
        assert_eq!(config.release_cycle(-5.0), 100);
    }

    #[test]
    fn topology_names() {
        assert_eq!("mesh".parse::<Topology>().unwrap(), Topology::Mesh);
        assert_eq!("TOPOLOGY_TORUS".parse::<Topology>().unwrap(), Topology::Torus);
        assert!("ring".parse::<Topology>().is_err());
    }
}

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
use env_logger::Target;
use std::io::{self, Write};
use structopt::StructOpt;

use aernoc::{
    GlobalRoutingTable, Network, NeuronAssignmentTable, NocConfiguration, PowerConfiguration,
    SystemSimulationCallbacks, Topology,
};

#[derive(StructOpt)]
#[structopt(
    name = "aersim",
    about = "Cycle accurate simulation of AER multicast traffic on a mesh or torus NoC"
)]
struct Arguments {
    /// YAML configuration; command line options override its values
    #[structopt(short, long)]
    config: Option<String>,
    /// supported topologies: mesh, torus
    #[structopt(long)]
    topology: Option<Topology>,
    #[structopt(long)]
    dimx: Option<usize>,
    #[structopt(long)]
    dimy: Option<usize>,
    /// depth of every router input buffer
    #[structopt(long)]
    buffer: Option<usize>,
    #[structopt(long)]
    deadlock_threshold: Option<usize>,
    /// cycles to simulate after reset
    #[structopt(long)]
    sim: Option<usize>,
    #[structopt(long)]
    reset: Option<usize>,
    /// cycles after reset excluded from the statistics
    #[structopt(long)]
    warmup: Option<usize>,
    /// global routing table (YAML)
    #[structopt(short, long)]
    routing: Option<String>,
    /// global neuron assignment table (YAML)
    #[structopt(short, long)]
    gnat: Option<String>,
    /// energy coefficients (YAML); without them no energy is accounted
    #[structopt(long)]
    power: Option<String>,
    /// write Delays<suffix>.csv and Evts_Routed<suffix>.csv to the output directory
    #[structopt(long)]
    output_suffix: Option<String>,
    /// trace the simulation into this VCD file
    #[structopt(long)]
    vcd: Option<String>,
    /// print delay and routing matrices
    #[structopt(short, long)]
    detailed: bool,
    /// print buffer occupancy statistics
    #[structopt(long)]
    show_buffer_stats: bool,
    /// -v info, -vv debug, -vvv trace
    #[structopt(short, long, parse(from_occurrences))]
    verbose: u8,
}

impl Arguments {
    fn apply(&self, config: &mut NocConfiguration) {
        if let Some(topology) = self.topology {
            config.topology = topology;
        }
        if let Some(x) = self.dimx {
            config.mesh_dim_x = x;
        }
        if let Some(y) = self.dimy {
            config.mesh_dim_y = y;
        }
        if let Some(depth) = self.buffer {
            config.buffer_depth = depth;
        }
        if let Some(threshold) = self.deadlock_threshold {
            config.deadlock_threshold = threshold;
        }
        if let Some(cycles) = self.sim {
            config.simulation_time = cycles;
        }
        if let Some(cycles) = self.reset {
            config.reset_time = cycles;
        }
        if let Some(cycles) = self.warmup {
            config.stats_warm_up_time = cycles;
        }
        if self.routing.is_some() {
            config.routing_table_filename = self.routing.clone();
        }
        if self.gnat.is_some() {
            config.gnat_filename = self.gnat.clone();
        }
        if self.power.is_some() {
            config.power_config_filename = self.power.clone();
        }
        if let Some(suffix) = &self.output_suffix {
            config.output_file_suffix = suffix.clone();
            config.create_output_files = true;
        }
        if self.vcd.is_some() {
            config.vcd_filename = self.vcd.clone();
        }
        config.detailed |= self.detailed;
        config.show_buffer_stats |= self.show_buffer_stats;
    }
}

fn main() -> anyhow::Result<()> {
    let args = Arguments::from_args();

    let level = match args.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let _logger = env_logger::builder()
        .filter(Some("aernoc"), level)
        .filter(Some("aersim"), level)
        .target(Target::Stderr)
        .init();

    let mut config = match &args.config {
        Some(file_name) => NocConfiguration::from_file(file_name)?,
        None => NocConfiguration::default(),
    };
    args.apply(&mut config);
    config.validate()?;
    log::info!("{:#?}", config);

    let routing_file = config
        .routing_table_filename
        .clone()
        .context("no routing table given, use --routing or routing_table_filename")?;
    let routing = GlobalRoutingTable::from_file(&routing_file)?;
    let mut network = Network::from_config(config.clone(), &routing)
        .with_context(|| format!("cannot build the network from {}", routing_file))?;
    match &config.gnat_filename {
        Some(gnat) => network.load_spikes(&NeuronAssignmentTable::from_file(gnat)?)?,
        None => log::warn!("no neuron assignment table given, the network stays idle"),
    }
    match &config.power_config_filename {
        Some(power) => network.configure_power(&PowerConfiguration::from_file(power)?)?,
        None => log::warn!("no power configuration given, energy is not accounted"),
    }

    let mut callbacks = match &config.vcd_filename {
        Some(path) => SystemSimulationCallbacks::create_vcd_callbacks(path)
            .with_context(|| format!("cannot create VCD file {}", path))?,
        None => SystemSimulationCallbacks::default(),
    };
    network.run(&mut callbacks)?;

    let stats = network.global_stats();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    stats.write_report(&mut out, config.detailed)?;
    if config.show_buffer_stats {
        stats.write_buffer_stats(&mut out)?;
    }
    if stats.deadlock_detected() {
        writeln!(out, "% Deadlock detected")?;
    }
    if config.create_output_files {
        stats
            .write_csv_files(&config.output_dir, &config.output_file_suffix)
            .with_context(|| format!("cannot write statistics to {}", config.output_dir))?;
    }
    Ok(())
}

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

//! Spike sources of the processing elements.
//!
//! A neuron assignment table maps every PE to a spike recorder file and the
//! range of neurons it simulates. The PE replays the spikes of those neurons
//! from the recorder file.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::Error;

/// One line of a spike recorder file.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpikeRecord {
    pub neuron_id: u32,
    /// spike time with the pre-simulation offset removed
    pub time: f64,
}

/// The spikes a PE still has to emit, in file order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LocalEventQueue {
    queue: VecDeque<SpikeRecord>,
}

impl LocalEventQueue {
    /// Parse a spike recorder.
    ///
    /// Lines starting with `%` are comments. The first `skip_lines` other
    /// lines are a header. An empty line ends the data. Only neurons in
    /// `[first, last]` are kept; `t_presim` is subtracted from their times.
    pub fn from_reader<R: BufRead>(
        reader: R,
        first: u32,
        last: u32,
        skip_lines: usize,
        t_presim: f64,
    ) -> Result<Self, Error> {
        let mut queue = VecDeque::new();
        let mut skipped = 0;
        for line in reader.lines() {
            let line = line.map_err(|e| Error::MalformedSpikeRecord(e.to_string()))?;
            if line.is_empty() {
                break;
            }
            if line.starts_with('%') {
                continue;
            }
            if skipped < skip_lines {
                skipped += 1;
                continue;
            }
            let mut fields = line.split_whitespace();
            let neuron_id = fields.next().and_then(|f| f.parse::<u32>().ok());
            let time = fields.next().and_then(|f| f.parse::<f64>().ok());
            match (neuron_id, time) {
                (Some(neuron_id), Some(time)) => {
                    if neuron_id >= first && neuron_id <= last {
                        queue.push_back(SpikeRecord {
                            neuron_id,
                            time: time - t_presim,
                        });
                    }
                }
                _ => return Err(Error::MalformedSpikeRecord(line)),
            }
        }
        Ok(Self { queue })
    }

    pub fn from_file(
        file_name: &str,
        first: u32,
        last: u32,
        skip_lines: usize,
        t_presim: f64,
    ) -> anyhow::Result<Self> {
        let file = File::open(Path::new(file_name))
            .with_context(|| format!("spike recorder {} not found", file_name))?;
        let queue = Self::from_reader(BufReader::new(file), first, last, skip_lines, t_presim)
            .with_context(|| format!("failed loading spike recorder {}", file_name))?;
        log::debug!(
            "{}: {} spikes of neurons {}..={}",
            file_name,
            queue.len(),
            first,
            last
        );
        Ok(queue)
    }

    pub fn front(&self) -> Option<&SpikeRecord> {
        self.queue.front()
    }

    pub fn pop(&mut self) -> Option<SpikeRecord> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpikeRecord> {
        self.queue.iter()
    }
}

/// The spike source of one PE.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PeAssignment {
    pub spike_recorder: String,
    pub first_neuron: u32,
    pub second_neuron: u32,
}

/// Maps absolute PE ids (`tile * pes_per_tile + local`) to their spike
/// sources.
///
/// <pre>
/// 0: { spike_recorder: spikes-0.dat, first_neuron: 1, second_neuron: 100 }
/// 1: { spike_recorder: spikes-0.dat, first_neuron: 101, second_neuron: 200 }
/// </pre>
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct NeuronAssignmentTable {
    pes: BTreeMap<usize, PeAssignment>,
}

impl NeuronAssignmentTable {
    pub fn from_file(file_name: &str) -> anyhow::Result<Self> {
        let file = File::open(Path::new(file_name))
            .with_context(|| format!("neuron assignment table {} not found", file_name))?;
        let table = serde_yaml::from_reader(BufReader::new(file))
            .map_err(Error::from)
            .with_context(|| format!("failed loading neuron assignment table {}", file_name))?;
        Ok(table)
    }

    pub fn from_str(table: &str) -> Result<Self, Error> {
        Ok(serde_yaml::from_str(table)?)
    }

    pub fn insert(&mut self, pe_abs_id: usize, assignment: PeAssignment) {
        self.pes.insert(pe_abs_id, assignment);
    }

    pub fn spike_params(&self, pe_abs_id: usize) -> Result<&PeAssignment, Error> {
        self.pes
            .get(&pe_abs_id)
            .ok_or(Error::MissingAssignment(pe_abs_id))
    }

    pub fn len(&self) -> usize {
        self.pes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORDER: &str = "\
% spike detector output
% neuron time
header one
header two
3 501.0
7 502.5
4 503.0
9 510.0

5 600.0
";

    #[test]
    fn parse_spike_recorder() {
        let queue = LocalEventQueue::from_reader(RECORDER.as_bytes(), 3, 7, 2, 500.0).unwrap();
        let spikes = queue.iter().copied().collect::<Vec<_>>();
        assert_eq!(
            spikes,
            vec![
                SpikeRecord {
                    neuron_id: 3,
                    time: 1.0
                },
                SpikeRecord {
                    neuron_id: 7,
                    time: 2.5
                },
                SpikeRecord {
                    neuron_id: 4,
                    time: 3.0
                },
            ]
        );
    }

    #[test]
    fn header_lines_may_hold_anything() {
        let queue = LocalEventQueue::from_reader(RECORDER.as_bytes(), 0, 100, 3, 0.0).unwrap();
        // "3 501.0" is taken as the third header line
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.front().map(|s| s.neuron_id), Some(7));
        let queue = LocalEventQueue::from_reader(RECORDER.as_bytes(), 0, 100, 1, 0.0);
        assert!(matches!(queue, Err(Error::MalformedSpikeRecord(_))));
    }

    #[test]
    fn pop_in_file_order() {
        let mut queue = LocalEventQueue::from_reader(RECORDER.as_bytes(), 0, 100, 2, 0.0).unwrap();
        assert_eq!(queue.front().map(|s| s.neuron_id), Some(3));
        assert_eq!(queue.pop().map(|s| s.neuron_id), Some(3));
        assert_eq!(queue.pop().map(|s| s.neuron_id), Some(7));
        assert_eq!(queue.len(), 2);
        queue.pop();
        queue.pop();
        assert!(queue.is_empty());
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn read_assignment_table() {
        let table = NeuronAssignmentTable::from_str(
            "
0: { spike_recorder: spikes.dat, first_neuron: 1, second_neuron: 10 }
3: { spike_recorder: other.dat, first_neuron: 11, second_neuron: 20 }
",
        )
        .unwrap();
        assert_eq!(table.len(), 2);
        let pe = table.spike_params(3).unwrap();
        assert_eq!(pe.spike_recorder, "other.dat");
        assert_eq!((pe.first_neuron, pe.second_neuron), (11, 20));
        assert_eq!(table.spike_params(1), Err(Error::MissingAssignment(1)));
    }

    #[test]
    fn malformed_assignment_table() {
        assert!(matches!(
            NeuronAssignmentTable::from_str("0: { spike_recorder: a.dat }"),
            Err(Error::Parse(_))
        ));
    }
}

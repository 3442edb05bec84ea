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

use std::fmt;

use crate::{Cycle, Port};

#[derive(Debug, Eq, PartialEq)]
pub enum Error {
    /// push into a buffer that is at capacity
    BufferOverflow(String),
    /// pop or front on an empty buffer
    BufferUnderflow(String),
    ArbiterReserved(usize),
    ArbiterNotReserved,
    /// a new request was observed on a port whose buffer is full
    AdmissionWhileFull { router: usize, port: Port },
    /// the front of a buffer moved after a deadlock was reported for it
    InconsistentDeadlock { buffer: String, cycle: Cycle },
    /// TCAM resolved an address that the SRAM does not hold
    SramMiss { router: usize, addr: usize },
    InvalidDirection { router: usize, key: u32, direction: usize },
    /// a routing entry without any output port
    EmptyFanOut { router: usize, key: u32 },
    UnconnectedPort { router: usize, port: Port },
    InvalidRouter(usize),
    MissingAssignment(usize),
    MalformedSpikeRecord(String),
    /// the power tables lack an entry the router configuration needs
    MissingPowerEntry(String),
    InvalidConfiguration(String),
    Parse(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::BufferOverflow(label) => write!(f, "ERROR: push into full buffer {}", label),
            Self::BufferUnderflow(label) => write!(f, "ERROR: read from empty buffer {}", label),
            Self::ArbiterReserved(port) => {
                write!(f, "ERROR: arbiter already reserved for input {}", port)
            }
            Self::AdmissionWhileFull { router, port } => write!(
                f,
                "ERROR: router {} received a request on port {} while its buffer is full",
                router, port
            ),
            Self::InconsistentDeadlock { buffer, cycle } => write!(
                f,
                "ERROR: wrong deadlock detection in {} at cycle {}, increase the deadlock threshold",
                buffer, cycle
            ),
            Self::SramMiss { router, addr } => write!(
                f,
                "ERROR: router {} SRAM has no entry for TCAM address {}",
                router, addr
            ),
            Self::InvalidDirection {
                router,
                key,
                direction,
            } => write!(
                f,
                "ERROR: routing table entry {} of router {} names invalid direction {}",
                key, router, direction
            ),
            Self::EmptyFanOut { router, key } => write!(
                f,
                "ERROR: routing table entry {} of router {} has no output port",
                key, router
            ),
            Self::UnconnectedPort { router, port } => write!(
                f,
                "ERROR: router {} routes to port {} which has no link",
                router, port
            ),
            Self::MissingAssignment(pe) => {
                write!(f, "ERROR: no neuron assignment for processing element {}", pe)
            }
            Self::MalformedSpikeRecord(line) => write!(f, "ERROR: malformed spike record '{}'", line),
            Self::MissingPowerEntry(entry) => {
                write!(f, "ERROR: power configuration has no entry for {}", entry)
            }
            Self::InvalidConfiguration(msg) => write!(f, "ERROR: invalid configuration: {}", msg),
            Self::Parse(msg) => write!(f, "ERROR: {}", msg),
            _ => write!(f, "{:?}", self),
        }
    }
}

// needed to allow `anyhow::Result` to accept our definition of errors, the
// file loaders and the command line front end rely on it.
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

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

use serde::{Deserialize, Serialize};
use std::convert::From;
use std::fmt;

/// Number of compass directions of a router. Local processing element slots
/// are numbered from here on.
pub const DIRECTIONS: usize = 4;

/// A router port.
///
/// The four compass ports come first, in the fixed order north, east, south,
/// west. `Local(k)` is the port of the k-th processing element of the tile and
/// has index `DIRECTIONS + k`. Tables on disk store ports by index.
#[derive(Ord, PartialOrd, Eq, PartialEq, Hash, Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(from = "usize", into = "usize")]
pub enum Port {
    North,
    East,
    South,
    West,
    Local(usize),
}

impl Port {
    pub fn index(self) -> usize {
        self.into()
    }

    pub fn is_local(self) -> bool {
        matches!(self, Self::Local(_))
    }

    /// the port a neighbor uses to talk back over the same link.
    pub fn opposite(self) -> Option<Port> {
        match self {
            Self::North => Some(Self::South),
            Self::East => Some(Self::West),
            Self::South => Some(Self::North),
            Self::West => Some(Self::East),
            Self::Local(_) => None,
        }
    }

    pub fn compass() -> [Port; DIRECTIONS] {
        [Self::North, Self::East, Self::South, Self::West]
    }
}

// enable conversion into usize, so that we can index with Ports.
impl From<Port> for usize {
    fn from(port: Port) -> usize {
        match port {
            Port::North => 0,
            Port::East => 1,
            Port::South => 2,
            Port::West => 3,
            Port::Local(k) => DIRECTIONS + k,
        }
    }
}

impl From<usize> for Port {
    fn from(index: usize) -> Self {
        match index {
            0 => Self::North,
            1 => Self::East,
            2 => Self::South,
            3 => Self::West,
            k => Self::Local(k - DIRECTIONS),
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match &self {
            Self::North => "north".fmt(f),
            Self::East => "east".fmt(f),
            Self::South => "south".fmt(f),
            Self::West => "west".fmt(f),
            Self::Local(k) => write!(f, "local[{}]", k),
        }
    }
}

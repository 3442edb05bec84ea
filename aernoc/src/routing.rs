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
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::{Error, Port};

/// Per-router map from a source neuron id to the set of output ports the
/// event is replicated to.
///
/// Keys are kept sorted: the TCAM hands out dense addresses in ascending key
/// order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct RoutingTable {
    entries: BTreeMap<u32, BTreeSet<Port>>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// add (or extend) the fan-out of `key`.
    pub fn insert<I: IntoIterator<Item = Port>>(&mut self, key: u32, ports: I) {
        self.entries.entry(key).or_default().extend(ports);
    }

    pub fn get(&self, key: u32) -> Option<&BTreeSet<Port>> {
        self.entries.get(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u32, &BTreeSet<Port>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The routing tables of every router in the network, indexed by router id.
///
/// On disk this is a YAML mapping `router_id -> { key -> [port, ...] }` where
/// ports are numbered north = 0, east = 1, south = 2, west = 3 and local
/// processing element `k` is `4 + k`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct GlobalRoutingTable {
    tables: BTreeMap<usize, RoutingTable>,
}

impl GlobalRoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(file_name: &str) -> anyhow::Result<Self> {
        let file = File::open(Path::new(file_name))
            .with_context(|| format!("routing table {} not found", file_name))?;
        let reader = BufReader::new(file);
        let table = serde_yaml::from_reader(reader)
            .map_err(Error::from)
            .with_context(|| format!("failed loading routing table {}", file_name))?;
        log::debug!("loaded global routing table from {}", file_name);
        Ok(table)
    }

    pub fn from_str(table: &str) -> Result<Self, Error> {
        Ok(serde_yaml::from_str(table)?)
    }

    pub fn insert<I: IntoIterator<Item = Port>>(&mut self, router_id: usize, key: u32, ports: I) {
        self.tables
            .entry(router_id)
            .or_default()
            .insert(key, ports);
    }

    /// the table of a single router; routers without entries get an empty
    /// table.
    pub fn local_table(&self, router_id: usize) -> RoutingTable {
        self.tables.get(&router_id).cloned().unwrap_or_default()
    }

    pub fn router_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.tables.keys().copied()
    }

    /// check the table against the shape of the network it will seed.
    pub fn validate(&self, router_count: usize, radix: usize) -> Result<(), Error> {
        for (&router, table) in self.tables.iter() {
            if router >= router_count {
                return Err(Error::InvalidRouter(router));
            }
            for (&key, ports) in table.iter() {
                if ports.is_empty() {
                    return Err(Error::EmptyFanOut { router, key });
                }
                if let Some(port) = ports.iter().find(|p| p.index() >= radix) {
                    return Err(Error::InvalidDirection {
                        router,
                        key,
                        direction: port.index(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "---
0:
  7: [1]
  9: [0, 2]
1:
  7: [4]
";

    #[test]
    fn read_yaml_table() {
        let grt = GlobalRoutingTable::from_str(TABLE).unwrap();
        assert_eq!(grt.router_ids().collect::<Vec<_>>(), vec![0, 1]);
        let rt0 = grt.local_table(0);
        assert_eq!(rt0.len(), 2);
        assert_eq!(
            rt0.get(9).unwrap().iter().copied().collect::<Vec<_>>(),
            vec![Port::North, Port::South]
        );
        let rt1 = grt.local_table(1);
        assert!(rt1.get(7).unwrap().contains(&Port::Local(0)));
        assert!(grt.local_table(3).is_empty());
        assert!(grt.validate(4, 5).is_ok());
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(matches!(
            GlobalRoutingTable::from_str("0: {7: [1"),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn validate_rejects_out_of_range_entries() {
        let grt = GlobalRoutingTable::from_str(TABLE).unwrap();
        assert_eq!(grt.validate(1, 5), Err(Error::InvalidRouter(1)));
        assert_eq!(
            grt.validate(4, 4),
            Err(Error::InvalidDirection {
                router: 1,
                key: 7,
                direction: 4
            })
        );
    }

    #[test]
    fn validate_rejects_empty_fan_out() {
        let grt = GlobalRoutingTable::from_str("0: {7: [1]}\n2: {7: [4], 8: []}").unwrap();
        assert_eq!(
            grt.validate(4, 5),
            Err(Error::EmptyFanOut { router: 2, key: 8 })
        );
    }

    #[test]
    fn write_yaml_table() {
        let mut grt = GlobalRoutingTable::new();
        grt.insert(0, 3, vec![Port::East, Port::Local(0)]);
        grt.insert(0, 3, vec![Port::North]);
        let text = serde_yaml::to_string(&grt).unwrap();
        assert_eq!(GlobalRoutingTable::from_str(&text).unwrap(), grt);
        assert_eq!(grt.local_table(0).get(3).unwrap().len(), 3);
    }
}

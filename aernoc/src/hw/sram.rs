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

use std::collections::BTreeSet;

use crate::{Port, RoutingTable};

/// Dense memory holding the fan-out set of every routing key, addressed by
/// the TCAM.
#[derive(Clone, Debug, Default)]
pub struct Sram {
    storage: Vec<BTreeSet<Port>>,
}

impl Sram {
    pub fn from_table(table: &RoutingTable) -> Self {
        Self {
            storage: table.iter().map(|(_, ports)| ports.clone()).collect(),
        }
    }

    /// `None` only for addresses past the compiled range.
    pub fn look_up(&self, addr: usize) -> Option<&BTreeSet<Port>> {
        self.storage.get(addr)
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GlobalRoutingTable, Tcam};

    #[test]
    fn tcam_and_sram_agree() {
        let grt = GlobalRoutingTable::from_str(
            "---
2:
  40: [0, 4]
  3: [1]
  17: [2, 3, 5]
",
        )
        .unwrap();
        let table = grt.local_table(2);
        let tcam = Tcam::from_table(&table);
        let sram = Sram::from_table(&table);
        assert_eq!(tcam.len(), 3);
        assert_eq!(sram.len(), 3);
        for (&key, ports) in table.iter() {
            let addr = tcam.look_up(key).unwrap();
            assert_eq!(sram.look_up(addr), Some(ports));
        }
        // addresses follow key order
        assert_eq!(tcam.look_up(3), Some(0));
        assert_eq!(tcam.look_up(17), Some(1));
        assert_eq!(tcam.look_up(40), Some(2));
    }

    #[test]
    fn misses() {
        let table = GlobalRoutingTable::new().local_table(0);
        let tcam = Tcam::from_table(&table);
        let sram = Sram::from_table(&table);
        assert!(tcam.is_empty() && sram.is_empty());
        assert_eq!(tcam.look_up(7), None);
        assert_eq!(sram.look_up(0), None);
    }
}

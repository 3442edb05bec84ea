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

use std::collections::HashMap;

use crate::RoutingTable;

/// Associative memory from a routing key to a dense SRAM address.
///
/// Addresses are handed out in ascending key order, the same order the SRAM
/// stores the fan-out sets in.
#[derive(Clone, Debug, Default)]
pub struct Tcam {
    storage: HashMap<u32, usize>,
}

impl Tcam {
    pub fn from_table(table: &RoutingTable) -> Self {
        Self {
            storage: table
                .iter()
                .enumerate()
                .map(|(addr, (&key, _))| (key, addr))
                .collect(),
        }
    }

    /// `None` when the key is unknown to this router.
    pub fn look_up(&self, key: u32) -> Option<usize> {
        self.storage.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

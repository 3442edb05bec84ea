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
use std::fmt;

/// An address event travelling through the network.
///
/// `neuron_id` is the routing key. Two events are equal when all four fields
/// are equal; the deadlock detector relies on this to tell a stuck buffer
/// head from a new one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Event {
    pub neuron_id: u32,
    /// global id of the processing element that produced the event
    pub src_id: u32,
    /// origin time, in the units of the spike source
    pub timestamp: f64,
    /// incremented once per link traversal, including the last hop into a PE
    pub hop_no: u32,
}

impl Event {
    pub fn new(neuron_id: u32, src_id: u32, timestamp: f64) -> Self {
        Self {
            neuron_id,
            src_id,
            timestamp,
            hop_no: 0,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[neuron {}, src {}, t {}, hops {}]",
            self.neuron_id, self.src_id, self.timestamp, self.hop_no
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_structural() {
        let a = Event::new(7, 0, 1.5);
        let mut b = a;
        assert_eq!(a, b);
        b.hop_no += 1;
        assert_ne!(a, b);
        assert_eq!(a, Event { hop_no: 0, ..b });
    }
}

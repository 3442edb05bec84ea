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

use crate::Event;

/// Index of a channel in the network's channel arena.
pub type ChannelId = usize;

/// Signals driven by the sending side of a channel.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Forward {
    pub evt: Event,
    /// alternating bit: toggled once per event put on `evt`
    pub req: bool,
}

/// Signals driven by the receiving side of a channel.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Backward {
    /// equals the last accepted `req`
    pub ack: bool,
    pub full: bool,
}

/// A register with a current and a next value.
///
/// Components read `cur` and write `next` during a cycle; the scheduler
/// commits all registers at the end of the cycle. An unwritten register keeps
/// its value.
#[derive(Clone, Debug, Default)]
pub struct Signal<T> {
    cur: T,
    next: T,
}

impl<T: Copy> Signal<T> {
    pub fn read(&self) -> T {
        self.cur
    }

    pub fn write(&mut self, value: T) {
        self.next = value;
    }

    pub fn commit(&mut self) {
        self.cur = self.next;
    }
}

/// A simplex point-to-point channel with its handshake.
///
/// The sender owns `fwd`, the receiver owns `bwd`, so every signal has a
/// single writer.
#[derive(Clone, Debug, Default)]
pub struct Channel {
    name: String,
    pub fwd: Signal<Forward>,
    pub bwd: Signal<Backward>,
}

impl Channel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn commit(&mut self) {
        self.fwd.commit();
        self.bwd.commit();
    }
}

/// Read the forward signals of an optional channel; unbound ports read idle.
pub(crate) fn read_fwd(channels: &[Channel], id: Option<ChannelId>) -> Forward {
    id.map(|id| channels[id].fwd.read()).unwrap_or_default()
}

pub(crate) fn read_bwd(channels: &[Channel], id: Option<ChannelId>) -> Backward {
    id.map(|id| channels[id].bwd.read()).unwrap_or_default()
}

/// Writes to unbound ports go nowhere.
pub(crate) fn write_fwd(channels: &mut [Channel], id: Option<ChannelId>, value: Forward) {
    if let Some(id) = id {
        channels[id].fwd.write(value);
    }
}

pub(crate) fn write_bwd(channels: &mut [Channel], id: Option<ChannelId>, value: Backward) {
    if let Some(id) = id {
        channels[id].bwd.write(value);
    }
}

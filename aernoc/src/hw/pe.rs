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

use std::collections::VecDeque;

use crate::hw::link::{read_bwd, read_fwd, write_bwd, write_fwd};
use crate::{
    Backward, Channel, ChannelId, Cycle, Event, Forward, LocalEventQueue, NocConfiguration,
};

/// A processing element attached to a local port of its tile's router.
///
/// The PE replays a queue of events, each due at a release cycle, into the
/// router, and sinks every event the router delivers to it. It is always
/// ready to receive.
#[derive(Clone, Debug)]
pub struct ProcessingElement {
    tile: usize,
    local: usize,
    id: usize,

    /// pending events, sorted by release cycle
    outbox: VecDeque<(Cycle, Event)>,
    /// delivered events, kept only when recording was asked for
    history: Option<Vec<Event>>,
    received_events: usize,
    sent_events: usize,

    level_rx: bool,
    level_tx: bool,

    rx: Option<ChannelId>,
    tx: Option<ChannelId>,
}

impl ProcessingElement {
    pub fn new(tile: usize, local: usize, pes_per_tile: usize) -> Self {
        Self {
            tile,
            local,
            id: tile * pes_per_tile + local,
            outbox: VecDeque::new(),
            history: None,
            received_events: 0,
            sent_events: 0,
            level_rx: false,
            level_tx: false,
            rx: None,
            tx: None,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn tile(&self) -> usize {
        self.tile
    }

    pub fn local(&self) -> usize {
        self.local
    }

    /// attach the channel the router delivers on.
    pub fn bind_rx(&mut self, channel: ChannelId) {
        self.rx = Some(channel);
    }

    /// attach the channel into the router's local input.
    pub fn bind_tx(&mut self, channel: ChannelId) {
        self.tx = Some(channel);
    }

    /// Queue `evt` for emission at or after cycle `release`.
    pub fn inject(&mut self, evt: Event, release: Cycle) {
        let at = self.outbox.partition_point(|(r, _)| *r <= release);
        self.outbox.insert(at, (release, evt));
    }

    /// Queue the spikes of `queue` as events originating at this PE.
    pub fn load_queue(&mut self, queue: &LocalEventQueue, config: &NocConfiguration) {
        for spike in queue.iter() {
            let evt = Event::new(spike.neuron_id, self.id as u32, spike.time);
            self.inject(evt, config.release_cycle(spike.time));
        }
        log::debug!("pe {}: {} events queued", self.id, self.outbox.len());
    }

    pub fn queued_events(&self) -> usize {
        self.outbox.len()
    }

    pub fn received_events(&self) -> usize {
        self.received_events
    }

    pub fn sent_events(&self) -> usize {
        self.sent_events
    }

    /// keep every delivered event from now on, see `received`.
    pub fn record_received(&mut self) {
        self.history.get_or_insert_with(Vec::new);
    }

    /// events received while recording, in arrival order.
    pub fn received(&self) -> &[Event] {
        self.history.as_deref().unwrap_or(&[])
    }

    pub fn step(&mut self, channels: &mut [Channel], now: Cycle, reset: bool) {
        if reset {
            self.level_rx = false;
            self.level_tx = false;
            write_bwd(channels, self.rx, Backward::default());
            let fwd = read_fwd(channels, self.tx);
            write_fwd(channels, self.tx, Forward { req: false, ..fwd });
            return;
        }

        let fwd = read_fwd(channels, self.rx);
        if fwd.req != self.level_rx {
            log::trace!("pe {}: received {}", self.id, fwd.evt);
            self.received_events += 1;
            if let Some(history) = self.history.as_mut() {
                history.push(fwd.evt);
            }
            self.level_rx = !self.level_rx;
        }
        write_bwd(
            channels,
            self.rx,
            Backward {
                ack: self.level_rx,
                full: false,
            },
        );

        let bwd = read_bwd(channels, self.tx);
        let due = matches!(self.outbox.front(), Some((release, _)) if *release <= now);
        if due && self.level_tx == bwd.ack && !bwd.full {
            if let Some((_, evt)) = self.outbox.pop_front() {
                self.level_tx = !self.level_tx;
                log::trace!("pe {}: sends {} at cycle {}", self.id, evt, now);
                write_fwd(
                    channels,
                    self.tx,
                    Forward {
                        evt,
                        req: self.level_tx,
                    },
                );
                self.sent_events += 1;
            }
        }
    }
}

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
use std::io;

use crate::{Cycle, Error, Event};

/// Default number of checks a buffer head may stay unchanged before a deadlock
/// is reported.
pub const DEFAULT_DEADLOCK_THRESHOLD: usize = 50000;

/// Bounded FIFO of events in front of one router input.
///
/// Besides the queue itself a buffer keeps a time weighted mean and the
/// maximum of its occupancy, and watches its head for head-of-line stalls.
///
/// Occupancy is only accounted once `reset_time + warm_up` cycles have passed,
/// so that start-up transients do not bias the averages.
#[derive(Clone, Debug)]
pub struct Buffer {
    label: String,
    capacity: usize,
    queue: VecDeque<Event>,
    /// false for boundary ports without a neighbor; excluded from reports.
    enabled: bool,

    // deadlock detection
    deadlock_threshold: usize,
    last_front: Option<Event>,
    stall_counter: usize,
    deadlock_detected: bool,

    // occupancy statistics
    stats_start: Cycle,
    last_change: Cycle,
    hold_time_sum: f64,
    mean_occupancy: f64,
    max_occupancy: usize,
}

impl Buffer {
    pub fn new(label: &str, capacity: usize) -> Self {
        assert!(capacity > 0, "buffer {} must hold at least one event", label);
        Self {
            label: label.to_string(),
            capacity,
            queue: VecDeque::with_capacity(capacity),
            enabled: true,
            deadlock_threshold: DEFAULT_DEADLOCK_THRESHOLD,
            last_front: None,
            stall_counter: 0,
            deadlock_detected: false,
            stats_start: 0,
            last_change: 0,
            hold_time_sum: 0.0,
            mean_occupancy: 0.0,
            max_occupancy: 0,
        }
    }

    pub fn with_deadlock_threshold(mut self, threshold: usize) -> Self {
        self.deadlock_threshold = threshold;
        self
    }

    /// occupancy is accounted from cycle `reset_time + warm_up` on.
    pub fn with_stats_window(mut self, reset_time: Cycle, warm_up: Cycle) -> Self {
        self.stats_start = reset_time + warm_up;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn push(&mut self, evt: Event, now: Cycle) -> Result<(), Error> {
        if self.is_full() {
            return Err(Error::BufferOverflow(self.label.clone()));
        }
        let previous = self.queue.len();
        self.queue.push_back(evt);
        self.account(previous, now);
        self.max_occupancy = self.max_occupancy.max(self.queue.len());
        Ok(())
    }

    pub fn pop(&mut self, now: Cycle) -> Result<Event, Error> {
        let previous = self.queue.len();
        let evt = self
            .queue
            .pop_front()
            .ok_or_else(|| Error::BufferUnderflow(self.label.clone()))?;
        self.account(previous, now);
        Ok(evt)
    }

    pub fn front(&self) -> Option<&Event> {
        self.queue.front()
    }

    pub fn is_full(&self) -> bool {
        self.queue.len() == self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn free_slots(&self) -> usize {
        self.capacity - self.queue.len()
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn mean_occupancy(&self) -> f64 {
        self.mean_occupancy
    }

    pub fn max_occupancy(&self) -> usize {
        self.max_occupancy
    }

    pub fn deadlock_detected(&self) -> bool {
        self.deadlock_detected
    }

    pub fn stall_counter(&self) -> usize {
        self.stall_counter
    }

    // fold the interval since the last change, during which the buffer held
    // `previous` events, into the running mean. Weighting the interval by the
    // size after the change instead would credit each push with the time
    // before it: a single event held from 0 to 10 would average 0, not 1.
    fn account(&mut self, previous: usize, now: Cycle) {
        let hold_time = now.saturating_sub(self.last_change) as f64;
        self.last_change = now;
        if now < self.stats_start {
            return;
        }
        let total = self.hold_time_sum + hold_time;
        if total > 0.0 {
            self.mean_occupancy = self.mean_occupancy * (self.hold_time_sum / total)
                + hold_time * previous as f64 / total;
            self.hold_time_sum = total;
        }
    }

    /// Compare the current head with the one seen at the previous check.
    ///
    /// An unchanged head increments the stall counter, a new head resets it.
    /// Once the counter exceeds the threshold a deadlock is reported, once.
    /// A head that moves after the report means the report was wrong; that
    /// is an error.
    pub fn deadlock_check(&mut self, now: Cycle) -> Result<(), Error> {
        let front = match self.queue.front() {
            Some(evt) => *evt,
            None => return Ok(()),
        };
        if self.last_front == Some(front) {
            self.stall_counter += 1;
        } else {
            if self.deadlock_detected {
                log::error!(
                    "head of {} moved at cycle {} after a deadlock was reported",
                    self.label,
                    now
                );
                return Err(Error::InconsistentDeadlock {
                    buffer: self.label.clone(),
                    cycle: now,
                });
            }
            self.last_front = Some(front);
            self.stall_counter = 0;
        }
        if self.stall_counter > self.deadlock_threshold && !self.deadlock_detected {
            log::warn!(
                "DEADLOCK DETECTED at cycle {} in buffer: {}",
                now,
                self.label
            );
            self.deadlock_detected = true;
        }
        Ok(())
    }

    /// mean and max occupancy in a 16 character column, blank if disabled.
    pub fn write_stats<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        if self.enabled {
            write!(
                out,
                "{:<8.4}{:<8}",
                self.mean_occupancy, self.max_occupancy
            )
        } else {
            write!(out, "{:16}", "")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evt(n: u32) -> Event {
        Event::new(n, 0, n as f64)
    }

    #[test]
    fn fifo_order() {
        let mut buffer = Buffer::new("b", 4);
        for n in 0..4 {
            buffer.push(evt(n), 0).unwrap();
        }
        assert!(buffer.is_full());
        assert_eq!(buffer.free_slots(), 0);
        for n in 0..4 {
            assert_eq!(buffer.front(), Some(&evt(n)));
            assert_eq!(buffer.pop(1).unwrap(), evt(n));
        }
        assert!(buffer.is_empty());
    }

    #[test]
    fn capacity_is_enforced() {
        let mut buffer = Buffer::new("r0->buffer[1]", 2);
        buffer.push(evt(1), 0).unwrap();
        buffer.push(evt(2), 0).unwrap();
        assert_eq!(
            buffer.push(evt(3), 0),
            Err(Error::BufferOverflow("r0->buffer[1]".to_string()))
        );
        assert_eq!(buffer.len(), 2);
        assert!(buffer.len() <= buffer.capacity());
    }

    #[test]
    fn pop_on_empty_fails() {
        let mut buffer = Buffer::new("b", 1);
        assert!(matches!(buffer.pop(0), Err(Error::BufferUnderflow(_))));
        assert_eq!(buffer.front(), None);
    }

    #[test]
    #[should_panic]
    fn zero_capacity() {
        let _ = Buffer::new("b", 0);
    }

    #[test]
    fn occupancy_is_time_weighted() {
        let mut buffer = Buffer::new("b", 4);
        buffer.push(evt(0), 0).unwrap();
        // one event held for 10 cycles, two events for 10 cycles
        buffer.push(evt(1), 10).unwrap();
        buffer.pop(20).unwrap();
        assert!((buffer.mean_occupancy() - 1.5).abs() < 1e-9);
        assert_eq!(buffer.max_occupancy(), 2);
    }

    #[test]
    fn occupancy_counts_what_was_held() {
        let mut buffer = Buffer::new("b", 4);
        buffer.push(evt(0), 0).unwrap();
        buffer.pop(10).unwrap();
        assert!((buffer.mean_occupancy() - 1.0).abs() < 1e-9);
        // idle from 10 to 20
        buffer.push(evt(1), 20).unwrap();
        assert!((buffer.mean_occupancy() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn occupancy_ignores_warm_up() {
        let mut buffer = Buffer::new("b", 4).with_stats_window(10, 10);
        buffer.push(evt(0), 0).unwrap();
        buffer.push(evt(1), 5).unwrap();
        buffer.pop(15).unwrap();
        assert_eq!(buffer.mean_occupancy(), 0.0);
        // first accounted interval: one event from 15 to 30
        buffer.pop(30).unwrap();
        assert!((buffer.mean_occupancy() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn deadlock_flag_rises_after_threshold() {
        let threshold = 5;
        let mut buffer = Buffer::new("b", 2).with_deadlock_threshold(threshold);
        buffer.push(evt(9), 0).unwrap();
        for tick in 0..=threshold {
            buffer.deadlock_check(tick).unwrap();
            assert!(!buffer.deadlock_detected(), "early flag at {}", tick);
        }
        buffer.deadlock_check(threshold + 1).unwrap();
        assert!(buffer.deadlock_detected());
        // stays raised, not reported twice
        buffer.deadlock_check(threshold + 2).unwrap();
        assert!(buffer.deadlock_detected());
    }

    #[test]
    fn new_head_resets_counter() {
        let mut buffer = Buffer::new("b", 2).with_deadlock_threshold(3);
        buffer.push(evt(1), 0).unwrap();
        buffer.push(evt(2), 0).unwrap();
        for tick in 0..3 {
            buffer.deadlock_check(tick).unwrap();
        }
        assert_eq!(buffer.stall_counter(), 2);
        buffer.pop(3).unwrap();
        buffer.deadlock_check(3).unwrap();
        assert_eq!(buffer.stall_counter(), 0);
        assert!(!buffer.deadlock_detected());
    }

    #[test]
    fn moving_head_after_report_is_fatal() {
        let mut buffer = Buffer::new("b", 2).with_deadlock_threshold(1);
        buffer.push(evt(1), 0).unwrap();
        buffer.push(evt(2), 0).unwrap();
        for tick in 0..3 {
            buffer.deadlock_check(tick).unwrap();
        }
        assert!(buffer.deadlock_detected());
        buffer.pop(3).unwrap();
        assert_eq!(
            buffer.deadlock_check(3),
            Err(Error::InconsistentDeadlock {
                buffer: "b".to_string(),
                cycle: 3
            })
        );
    }

    #[test]
    fn disabled_buffer_reports_blank() {
        let mut buffer = Buffer::new("b", 2);
        let mut out = Vec::new();
        buffer.write_stats(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "0.0000  0       ");
        buffer.disable();
        let mut out = Vec::new();
        buffer.write_stats(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), " ".repeat(16));
    }
}

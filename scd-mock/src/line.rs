/*******************************************************************************
*   (c) 2021 Zondax GmbH
*
*  Licensed under the Apache License, Version 2.0 (the "License");
*  you may not use this file except in compliance with the License.
*  You may obtain a copy of the License at
*
*      http://www.apache.org/licenses/LICENSE-2.0
*
*  Unless required by applicable law or agreed to in writing, software
*  distributed under the License is distributed on an "AS IS" BASIS,
*  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
*  See the License for the specific language governing permissions and
*  limitations under the License.
********************************************************************************/
//! Simulated half-duplex line with a virtual clock
//!
//! The peer is scripted: characters queued with [`SimChannel::queue_byte`] are
//! sent one after the other, each starting when the device polls the line for a
//! start bit. Characters driven by the device are recorded and can be decoded
//! afterwards with [`SimChannel::sent_bytes`].

use std::collections::VecDeque;
use std::vec::Vec;

use scd_common::{
    frame::{self, Convention, Level, FRAME_BITS, SAMPLED_BITS},
    hal::{Interface, Stalled},
};

type Frame = [Level; FRAME_BITS];

pub struct SimChannel {
    etu: u64,
    now: u64,
    epoch: u64,
    clock: bool,
    reset: bool,
    polling: bool,

    device: Level,
    transitions: Vec<(u64, Level)>,
    tx_starts: Vec<u64>,
    error_signals: usize,

    queued: VecDeque<Frame>,
    active: Option<(u64, Frame)>,
    last_rx_start: Option<u64>,
    nacks: usize,
    nack_windows: Vec<(u64, u64)>,
}

impl SimChannel {
    pub fn new(ticks_per_etu: u32) -> Self {
        Self {
            etu: ticks_per_etu as u64,
            now: 0,
            epoch: 0,
            clock: true,
            reset: false,
            polling: false,
            device: Level::High,
            transitions: Vec::new(),
            tx_starts: Vec::new(),
            error_signals: 0,
            queued: VecDeque::new(),
            active: None,
            last_rx_start: None,
            nacks: 0,
            nack_windows: Vec::new(),
        }
    }

    pub fn ticks_per_etu(&self) -> u32 {
        self.etu as u32
    }

    /// Virtual time, in ticks
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn set_clock(&mut self, running: bool) {
        self.clock = running;
    }

    pub fn set_reset(&mut self, asserted: bool) {
        self.reset = asserted;
    }

    /// Have the peer send `byte`
    pub fn queue_byte(&mut self, byte: u8, convention: Convention) {
        self.queued.push_back(frame::encode(byte, convention));
    }

    pub fn queue_bytes(&mut self, bytes: &[u8], convention: Convention) {
        for &byte in bytes {
            self.queue_byte(byte, convention);
        }
    }

    /// Have the peer send `byte` with the wrong parity bit
    pub fn queue_bad_parity(&mut self, byte: u8, convention: Convention) {
        let mut frame = frame::encode(byte, convention);
        frame[FRAME_BITS - 1] = !frame[FRAME_BITS - 1];
        self.queued.push_back(frame);
    }

    /// Characters queued but not started yet
    pub fn pending(&self) -> usize {
        self.queued.len()
    }

    /// Signal a parity error on the next `count` characters the device sends
    pub fn reject_next(&mut self, count: usize) {
        self.nacks += count;
    }

    /// Number of times the device signalled a parity error to the peer
    pub fn error_signals(&self) -> usize {
        self.error_signals
    }

    /// Virtual time at which each character sent by the device started
    pub fn tx_starts(&self) -> &[u64] {
        &self.tx_starts
    }

    /// Every character sent by the device, with its parity check
    pub fn sent_frames(&self, convention: Convention) -> Vec<(u8, bool)> {
        self.tx_starts
            .iter()
            .map(|&start| {
                let mut bits = [Level::High; SAMPLED_BITS];
                for (i, bit) in bits.iter_mut().enumerate() {
                    let middle = start + self.etu * (i as u64 + 1) + self.etu / 2;
                    *bit = self.device_level_at(middle);
                }
                frame::decode(&bits, convention)
            })
            .collect()
    }

    pub fn sent_bytes(&self, convention: Convention) -> Vec<u8> {
        self.sent_frames(convention)
            .into_iter()
            .map(|(byte, _)| byte)
            .collect()
    }

    /// Level driven by the device at time `t`
    fn device_level_at(&self, t: u64) -> Level {
        self.transitions
            .iter()
            .take_while(|(at, _)| *at <= t)
            .last()
            .map(|&(_, level)| level)
            .unwrap_or(Level::High)
    }

    /// Whether the device is inside a character sent by the peer, error signal included
    fn receiving(&self) -> bool {
        self.last_rx_start
            .map(|start| self.now >= start && self.now < start + self.etu * 116 / 10)
            .unwrap_or(false)
    }

    fn set_device(&mut self, level: Level) {
        if level.is_low() && self.device.is_high() {
            if self.receiving() {
                self.error_signals += 1;
            } else if self
                .tx_starts
                .last()
                .map(|&start| self.now >= start + self.etu * FRAME_BITS as u64)
                .unwrap_or(true)
            {
                self.tx_starts.push(self.now);

                if self.nacks > 0 {
                    self.nacks -= 1;
                    self.nack_windows
                        .push((self.now + self.etu * 21 / 2, self.now + self.etu * 12));
                }
            }
        }

        if level != self.device {
            self.transitions.push((self.now, level));
            self.device = level;
        }
    }

    fn line(&self) -> Level {
        let peer_low = self
            .active
            .map(|(start, frame)| {
                let index = ((self.now - start) / self.etu) as usize;
                index < FRAME_BITS && frame[index].is_low()
            })
            .unwrap_or(false);

        let nack_low = self
            .nack_windows
            .iter()
            .any(|&(from, to)| self.now >= from && self.now < to);

        if self.device.is_low() || peer_low || nack_low {
            Level::Low
        } else {
            Level::High
        }
    }
}

impl Interface for SimChannel {
    fn clock_present(&mut self) -> bool {
        self.clock
    }

    fn restart_timer(&mut self) {
        self.polling = false;
        self.epoch = self.now;
    }

    fn wait_until(&mut self, ticks: u32) -> Result<(), Stalled> {
        self.polling = false;
        if !self.clock {
            return Err(Stalled);
        }

        self.now = self.now.max(self.epoch + ticks as u64);
        Ok(())
    }

    fn drive(&mut self, level: Level) {
        self.polling = false;
        self.set_device(level);
    }

    fn release(&mut self) {
        self.polling = false;
        self.set_device(Level::High);
    }

    fn sample(&mut self) -> Level {
        let polling = self.polling;
        self.polling = true;
        self.now += 1;

        if let Some((start, _)) = self.active {
            if self.now >= start + self.etu * FRAME_BITS as u64 {
                self.active = None;
            }
        }

        //only a device waiting for a start bit gets the next character
        if polling && self.active.is_none() {
            if let Some(frame) = self.queued.pop_front() {
                self.active = Some((self.now, frame));
                self.last_rx_start = Some(self.now);
            }
        }

        self.line()
    }

    fn reset_asserted(&mut self) -> bool {
        self.reset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_character_starts_on_poll() {
        let mut line = SimChannel::new(372);
        line.queue_byte(0x00, Convention::Direct);

        assert_eq!(line.sample(), Level::High);
        assert_eq!(line.sample(), Level::Low);
        assert_eq!(line.pending(), 0);
    }

    #[test]
    fn records_device_characters() {
        let mut line = SimChannel::new(10);

        for byte in [0xA4u8, 0x61] {
            let frame = frame::encode(byte, Convention::Direct);
            line.restart_timer();
            line.drive(frame[0]);
            for (i, &level) in frame.iter().enumerate().skip(1) {
                line.wait_until(i as u32 * 10).unwrap();
                line.drive(level);
            }
            line.wait_until(100).unwrap();
            line.release();
            line.wait_until(120).unwrap();
        }

        assert_eq!(line.sent_bytes(Convention::Direct), [0xA4, 0x61]);
        assert_eq!(line.tx_starts(), &[0, 120][..]);
    }

    #[test]
    fn stopped_clock_stalls_waits() {
        let mut line = SimChannel::new(372);
        line.set_clock(false);

        assert_eq!(line.wait_until(10), Err(Stalled));
        assert!(!line.clock_present());
    }
}

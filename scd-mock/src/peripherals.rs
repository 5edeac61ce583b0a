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
use std::collections::VecDeque;
use std::string::{String, ToString};
use std::vec::Vec;

use scd_common::hal::{self, Buttons, Led, NotInserted, WatchdogTimeout};

#[derive(Debug, Default)]
pub struct Watchdog {
    armed: Option<WatchdogTimeout>,
    disables: usize,
    kicks: usize,
}

impl Watchdog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn armed(&self) -> Option<WatchdogTimeout> {
        self.armed
    }

    pub fn disables(&self) -> usize {
        self.disables
    }

    pub fn kicks(&self) -> usize {
        self.kicks
    }
}

impl hal::Watchdog for Watchdog {
    fn disable(&mut self) {
        self.armed = None;
        self.disables += 1;
    }

    fn arm(&mut self, timeout: WatchdogTimeout) {
        self.armed = Some(timeout);
    }

    fn kick(&mut self) {
        self.kicks += 1;
    }

    fn restart(&mut self) -> ! {
        self.armed = Some(WatchdogTimeout::Ms15);
        panic!("watchdog restart");
    }
}

/// Reset line and clock coming from the terminal
#[derive(Debug)]
pub struct ResetLine {
    clock: bool,
    interrupt: bool,
}

impl Default for ResetLine {
    fn default() -> Self {
        Self::new()
    }
}

impl ResetLine {
    pub fn new() -> Self {
        Self {
            clock: true,
            interrupt: false,
        }
    }

    pub fn set_clock(&mut self, running: bool) {
        self.clock = running;
    }

    pub fn interrupt_enabled(&self) -> bool {
        self.interrupt
    }
}

impl hal::TerminalReset for ResetLine {
    fn clock_present(&mut self) -> bool {
        self.clock
    }

    fn enable_interrupt(&mut self) {
        self.interrupt = true;
    }

    fn disable_interrupt(&mut self) {
        self.interrupt = false;
    }
}

#[derive(Debug, Default)]
pub struct CardSlot {
    inserted: bool,
    powered: bool,
    reset_high: bool,
    interrupt: bool,
    activations: Vec<bool>,
    deactivations: usize,
}

impl CardSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self) {
        self.inserted = true;
    }

    pub fn remove(&mut self) {
        self.inserted = false;
    }

    pub fn reset_high(&self) -> bool {
        self.reset_high
    }

    pub fn interrupt_enabled(&self) -> bool {
        self.interrupt
    }

    /// Every activation so far, `true` for warm ones
    pub fn activations(&self) -> &[bool] {
        &self.activations
    }

    pub fn deactivations(&self) -> usize {
        self.deactivations
    }
}

impl hal::CardSlot for CardSlot {
    fn inserted(&mut self) -> bool {
        self.inserted
    }

    fn powered(&mut self) -> bool {
        self.powered
    }

    fn activate(&mut self, warm: bool) -> Result<(), NotInserted> {
        if !self.inserted {
            return Err(NotInserted);
        }

        self.activations.push(warm);
        self.powered = true;
        self.reset_high = false;
        Ok(())
    }

    fn set_reset(&mut self, high: bool) {
        self.reset_high = high;
    }

    fn deactivate(&mut self) {
        self.deactivations += 1;
        self.powered = false;
        self.reset_high = false;
    }

    fn enable_presence_interrupt(&mut self) {
        self.interrupt = true;
    }

    fn disable_presence_interrupt(&mut self) {
        self.interrupt = false;
    }
}

/// Display, buttons and LEDs
///
/// Button reads are scripted and a read past the end of the script panics,
/// so a test never hangs in a loop waiting for a key.
#[derive(Debug, Default)]
pub struct Panel {
    connected: bool,
    powered: bool,
    lines: Vec<String>,
    script: VecDeque<Buttons>,
    leds: [bool; 4],
    waited_ms: u32,
}

impl Panel {
    pub fn new() -> Self {
        Self {
            connected: true,
            ..Default::default()
        }
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    pub fn powered(&self) -> bool {
        self.powered
    }

    /// Queue button reads
    pub fn press(&mut self, reads: &[Buttons]) {
        self.script.extend(reads.iter().copied());
    }

    /// Button reads not consumed yet
    pub fn remaining_presses(&self) -> usize {
        self.script.len()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn led(&self, led: Led) -> bool {
        self.leds[led as usize]
    }

    /// Total time spent in delays
    pub fn waited_ms(&self) -> u32 {
        self.waited_ms
    }
}

impl hal::Display for Panel {
    fn available(&mut self) -> bool {
        self.connected
    }

    fn power(&mut self, on: bool) {
        self.powered = on;
    }

    fn write_line(&mut self, text: &str) {
        assert!(self.powered, "display written while off: {}", text);
        self.lines.push(text.to_string());
    }
}

impl hal::Keypad for Panel {
    fn buttons(&mut self) -> Buttons {
        match self.script.pop_front() {
            Some(buttons) => buttons,
            None => panic!("button script exhausted"),
        }
    }
}

impl hal::Leds for Panel {
    fn set_led(&mut self, led: Led, on: bool) {
        self.leds[led as usize] = on;
    }
}

impl hal::Delay for Panel {
    fn delay_ms(&mut self, ms: u16) {
        self.waited_ms += ms as u32;
    }
}

/// Global interrupt flag and port setup
#[derive(Debug, Default)]
pub struct System {
    initialised: bool,
    interrupts: bool,
}

impl System {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure ports and timers, interrupts end up masked
    pub fn init(&mut self) {
        self.initialised = true;
        self.interrupts = false;
    }

    pub fn enable_interrupts(&mut self) {
        self.interrupts = true;
    }

    pub fn initialised(&self) -> bool {
        self.initialised
    }

    pub fn interrupts_enabled(&self) -> bool {
        self.interrupts
    }
}

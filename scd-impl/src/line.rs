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
//! The two I/O lines, each timed by a free running 16 bit timer
//!
//! Timer3 counts rising edges of the terminal clock, Timer1 counts the core
//! clock used to generate the card clock. Waits longer than the 16 bit range
//! are handled by counting wraps in software.

use scd_common::{
    frame::Level,
    hal::{Interface, Stalled},
};

use crate::regs::{
    self, DDRB, DDRC, ICC_IO, PINB, PINC, PIND, PORTB, PORTC, TCCR0B, TCCR1B, TCCR3B, TCNT1L,
    TCNT3L, TERMINAL_IO, TERMINAL_RST,
};

/// Polls without the counter moving before the clock is considered gone
const STALL_POLLS: u16 = 2048;

/// Software extension of a 16 bit counter
struct Ticks {
    high: u16,
    last: u16,
}

impl Ticks {
    const fn new() -> Self {
        Self { high: 0, last: 0 }
    }

    fn restart(&mut self, counter: usize) {
        regs::write16(counter, 0);
        *self = Self::new();
    }

    fn wait_until(&mut self, counter: usize, target: u32) -> Result<(), Stalled> {
        let mut idle = 0;

        loop {
            let raw = regs::read16(counter);
            if raw == self.last {
                idle += 1;
                if idle > STALL_POLLS {
                    return Err(Stalled);
                }
            } else {
                idle = 0;
                if raw < self.last {
                    self.high = self.high.wrapping_add(1);
                }
                self.last = raw;
            }

            let elapsed = (self.high as u32) << 16 | self.last as u32;
            if elapsed >= target {
                return Ok(());
            }
        }
    }
}

fn drive(ddr: usize, port: usize, pin: u8, level: Level) {
    match level {
        Level::Low => {
            regs::clear(port, pin);
            regs::set(ddr, pin);
        }
        Level::High => {
            regs::set(port, pin);
            regs::set(ddr, pin);
        }
    }
}

/// Input with pull-up
fn release(ddr: usize, port: usize, pin: u8) {
    regs::clear(ddr, pin);
    regs::set(port, pin);
}

fn sample(pins: usize, pin: u8) -> Level {
    if regs::is_set(pins, pin) {
        Level::High
    } else {
        Level::Low
    }
}

/// I/O contact of the terminal, PC4
pub struct TerminalPort {
    ticks: Ticks,
}

impl TerminalPort {
    pub const fn new() -> Self {
        Self {
            ticks: Ticks::new(),
        }
    }
}

/// Whether Timer3 moves, that is the terminal is giving a clock
pub(crate) fn terminal_clock_present() -> bool {
    if !regs::is_set(TCCR3B, 0x07) {
        return false;
    }

    let before = critical_section::with(|_| {
        regs::write16(TCNT3L, 1);
        regs::delay_us(1);
        regs::read16(TCNT3L)
    });

    before != 1
}

impl Interface for TerminalPort {
    fn clock_present(&mut self) -> bool {
        terminal_clock_present()
    }

    fn restart_timer(&mut self) {
        self.ticks.restart(TCNT3L);
    }

    fn wait_until(&mut self, ticks: u32) -> Result<(), Stalled> {
        self.ticks.wait_until(TCNT3L, ticks)
    }

    fn drive(&mut self, level: Level) {
        drive(DDRC, PORTC, TERMINAL_IO, level)
    }

    fn release(&mut self) {
        release(DDRC, PORTC, TERMINAL_IO)
    }

    fn sample(&mut self) -> Level {
        sample(PINC, TERMINAL_IO)
    }

    fn reset_asserted(&mut self) -> bool {
        !regs::is_set(PIND, TERMINAL_RST)
    }
}

/// I/O contact of the card, PB6
pub struct IccPort {
    ticks: Ticks,
}

impl IccPort {
    pub const fn new() -> Self {
        Self {
            ticks: Ticks::new(),
        }
    }
}

impl Interface for IccPort {
    fn clock_present(&mut self) -> bool {
        regs::read(TCCR0B) != 0 && regs::read(TCCR1B) != 0
    }

    fn restart_timer(&mut self) {
        self.ticks.restart(TCNT1L);
    }

    fn wait_until(&mut self, ticks: u32) -> Result<(), Stalled> {
        if !self.clock_present() {
            return Err(Stalled);
        }
        self.ticks.wait_until(TCNT1L, ticks)
    }

    fn drive(&mut self, level: Level) {
        drive(DDRB, PORTB, ICC_IO, level)
    }

    fn release(&mut self) {
        release(DDRB, PORTB, ICC_IO)
    }

    fn sample(&mut self) -> Level {
        sample(PINB, ICC_IO)
    }
}

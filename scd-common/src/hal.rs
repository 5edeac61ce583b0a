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
//! Traits implemented by each board crate
//!
//! The protocol code is written against these only, so the same logic runs
//! on the device and against the host simulation.

use crate::frame::Level;

/// The clock driving a timed wait stopped advancing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stalled;

/// One side of the half-duplex I/O line, timed by a free running timer
///
/// Time is counted in timer ticks from the last call to [`Interface::restart_timer`].
/// [`Interface::wait_until`] is the only busy-wait primitive.
pub trait Interface {
    /// Whether the clock timing this line is running
    fn clock_present(&mut self) -> bool;

    /// Start counting ticks from zero
    fn restart_timer(&mut self);

    /// Busy-wait until `ticks` ticks have elapsed since the last restart
    fn wait_until(&mut self, ticks: u32) -> Result<(), Stalled>;

    /// Drive the line to `level`
    fn drive(&mut self, level: Level);

    /// Stop driving, the pull-up brings the line back high
    fn release(&mut self);

    /// Read the current level of the line
    fn sample(&mut self) -> Level;

    /// Whether the peer holds its reset signal asserted
    fn reset_asserted(&mut self) -> bool {
        false
    }
}

impl<I: Interface + ?Sized> Interface for &mut I {
    fn clock_present(&mut self) -> bool {
        (**self).clock_present()
    }

    fn restart_timer(&mut self) {
        (**self).restart_timer()
    }

    fn wait_until(&mut self, ticks: u32) -> Result<(), Stalled> {
        (**self).wait_until(ticks)
    }

    fn drive(&mut self, level: Level) {
        (**self).drive(level)
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn sample(&mut self) -> Level {
        (**self).sample()
    }

    fn reset_asserted(&mut self) -> bool {
        (**self).reset_asserted()
    }
}

/// Byte addressable non-volatile store
pub trait Eeprom {
    const SIZE: u16;

    fn read(&self, addr: u16) -> u8;

    /// Start writing one byte, the caller must have checked [`Eeprom::busy`]
    fn start_write(&mut self, addr: u16, value: u8);

    /// Whether a write is still in progress
    fn busy(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogTimeout {
    Ms15,
    Ms30,
    Ms60,
    Ms120,
    Ms250,
    Ms500,
    S1,
    S2,
    S4,
    S8,
}

impl WatchdogTimeout {
    /// Smallest timeout not shorter than `ms`
    pub const fn at_least(ms: u16) -> Self {
        match ms {
            0..=15 => Self::Ms15,
            16..=30 => Self::Ms30,
            31..=60 => Self::Ms60,
            61..=120 => Self::Ms120,
            121..=250 => Self::Ms250,
            251..=500 => Self::Ms500,
            501..=1000 => Self::S1,
            1001..=2000 => Self::S2,
            2001..=4000 => Self::S4,
            _ => Self::S8,
        }
    }

    /// Prescaler selection, in the order of the hardware encoding
    pub const fn prescaler(self) -> u8 {
        self as u8
    }
}

pub trait Watchdog {
    fn disable(&mut self);

    fn arm(&mut self, timeout: WatchdogTimeout);

    fn kick(&mut self);

    /// Arm the shortest timeout and wait for it to fire
    fn restart(&mut self) -> !;
}

/// Reset signal coming from the terminal
pub trait TerminalReset {
    /// Whether the terminal is still clocking the device
    fn clock_present(&mut self) -> bool;

    /// Interrupt on the falling edge of the reset line
    fn enable_interrupt(&mut self);

    fn disable_interrupt(&mut self);
}

/// The card was not in the slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotInserted;

/// Electrical contacts of the card slot
pub trait CardSlot {
    /// State of the card detect switch
    fn inserted(&mut self) -> bool;

    fn powered(&mut self) -> bool;

    /// Power the card with RST low and I/O in reception
    ///
    /// A warm activation only pulls RST low again on an already powered card
    fn activate(&mut self, warm: bool) -> Result<(), NotInserted>;

    fn set_reset(&mut self, high: bool);

    /// Pull every contact low and cut power
    fn deactivate(&mut self);

    /// Interrupt on both edges of the card detect switch
    fn enable_presence_interrupt(&mut self);

    fn disable_presence_interrupt(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Led {
    L1,
    L2,
    L3,
    L4,
}

/// Set of buttons held down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Buttons(pub u8);

impl Buttons {
    pub const NONE: Self = Self(0);
    pub const A: Self = Self(0x01);
    pub const B: Self = Self(0x02);
    pub const C: Self = Self(0x04);
    pub const D: Self = Self(0x08);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }
}

impl std::ops::BitOr for Buttons {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Two line character display
pub trait Display {
    /// Whether a display is connected and answering
    fn available(&mut self) -> bool;

    fn power(&mut self, on: bool);

    fn write_line(&mut self, text: &str);
}

pub trait Keypad {
    fn buttons(&mut self) -> Buttons;
}

pub trait Leds {
    fn set_led(&mut self, led: Led, on: bool);
}

pub trait Delay {
    fn delay_ms(&mut self, ms: u16);
}

/// Everything the user interacts with
pub trait Panel: Display + Keypad + Leds + Delay {}

impl<T: Display + Keypad + Leds + Delay> Panel for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watchdog_rounds_up() {
        assert_eq!(WatchdogTimeout::at_least(0), WatchdogTimeout::Ms15);
        assert_eq!(WatchdogTimeout::at_least(25), WatchdogTimeout::Ms30);
        assert_eq!(WatchdogTimeout::at_least(100), WatchdogTimeout::Ms120);
        assert_eq!(WatchdogTimeout::at_least(1000), WatchdogTimeout::S1);
        assert_eq!(WatchdogTimeout::at_least(u16::MAX), WatchdogTimeout::S8);

        assert_eq!(WatchdogTimeout::Ms15.prescaler(), 0);
        assert_eq!(WatchdogTimeout::S8.prescaler(), 9);
    }

    #[test]
    fn buttons() {
        let held = Buttons::B | Buttons::C;

        assert!(held.contains(Buttons::B));
        assert!(held.contains(Buttons::C));
        assert!(!held.contains(Buttons::D));
        assert!(!held.contains(Buttons::NONE));
        assert!(!Buttons::NONE.contains(Buttons::A));
    }
}

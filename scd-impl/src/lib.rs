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
//! This crate provides the AT90USB1287 implementation of the SCD board traits

#![no_std]
#![no_builtins]
#![cfg_attr(target_arch = "avr", feature(asm_experimental_arch))]

#[macro_use]
extern crate cfg_if;

extern crate no_std_compat as std;

cfg_if! {
    if #[cfg(target_arch = "avr")] {
//----------------------------

use scd_common::etu::IccClock;

/// Clock given to the card
pub const ICC_CLOCK: IccClock = IccClock::Mhz4;

mod regs;

mod critical;

pub mod debug;
pub use debug::debug_write;

mod eeprom;
pub use eeprom::Eeprom;

mod watchdog;
pub use watchdog::Watchdog;

mod line;
pub use line::{IccPort, TerminalPort};

mod peripherals;
pub use peripherals::{CardSlot, Panel, ResetLine, System};

/// Restart the whole device
pub fn restart() -> ! {
    use scd_common::hal::Watchdog as _;

    Watchdog::new().restart()
}
//------------------------
    }
}

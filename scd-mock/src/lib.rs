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
#![no_std]
#![no_builtins]

//! Host simulation of the SCD board, used whenever the core is not built for the device

extern crate std;

pub mod debug;
pub use debug::debug_write;

pub mod eeprom;
pub use eeprom::Eeprom;

pub mod line;
pub use line::SimChannel;

/// Line to the terminal, timed by the terminal clock
pub type TerminalPort = SimChannel;

/// Line to the card, timed by the core clock
pub type IccPort = SimChannel;

pub mod peripherals;
pub use peripherals::{CardSlot, Panel, ResetLine, System, Watchdog};

/// Restart the whole device
pub fn restart() -> ! {
    panic!("device restart");
}

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
//! Every peripheral of the SCD, owned in one place

use crate::{
    etu::{EtuTiming, IccClock, CPU_HZ},
    platform, Nvm,
};

pub type Eeprom = platform::Eeprom;
pub type Watchdog = platform::Watchdog;
pub type ResetLine = platform::ResetLine;
pub type TerminalPort = platform::TerminalPort;
pub type IccPort = platform::IccPort;
pub type CardSlot = platform::CardSlot;
pub type Panel = platform::Panel;
pub type System = platform::System;

/// Send a log line to the debug output of the board
pub fn debug_write(s: &str) {
    platform::debug_write(s)
}

/// Clock given to the card
#[cfg(target_arch = "avr")]
pub fn icc_clock() -> IccClock {
    platform::ICC_CLOCK
}

/// Clock given to the card
#[cfg(not(target_arch = "avr"))]
pub fn icc_clock() -> IccClock {
    IccClock::default()
}

pub struct Board {
    pub system: System,
    pub nvm: Nvm<Eeprom>,
    pub watchdog: Watchdog,
    pub terminal_reset: ResetLine,
    pub terminal: TerminalPort,
    pub icc: IccPort,
    pub card: CardSlot,
    pub panel: Panel,
}

impl Board {
    /// ETU of the terminal line, in terminal clock ticks
    pub const TERMINAL_ETU: EtuTiming = EtuTiming::TERMINAL;

    /// ETU of the card line, in ticks of the card timer
    pub fn icc_etu() -> EtuTiming {
        icc_clock().etu(CPU_HZ)
    }

    pub fn new() -> Self {
        #[cfg(target_arch = "avr")]
        let (terminal, icc) = (TerminalPort::new(), IccPort::new());

        #[cfg(not(target_arch = "avr"))]
        let (terminal, icc) = (
            TerminalPort::new(Self::TERMINAL_ETU.ticks()),
            IccPort::new(Self::icc_etu().ticks()),
        );

        Self {
            system: System::new(),
            nvm: Nvm::new(Eeprom::new()),
            watchdog: Watchdog::new(),
            terminal_reset: ResetLine::new(),
            terminal,
            icc,
            card: CardSlot::new(),
            panel: Panel::new(),
        }
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

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
use scd_common::hal;

use crate::regs::{self, EEARH, EEARL, EECR, EEDR, EEMPE, EEPE, EERE};

/// The internal 4 KiB EEPROM
pub struct Eeprom;

impl Eeprom {
    pub const fn new() -> Self {
        Self
    }

    fn select(addr: u16) {
        let [lo, hi] = addr.to_le_bytes();
        regs::write(EEARH, hi);
        regs::write(EEARL, lo);
    }
}

impl hal::Eeprom for Eeprom {
    const SIZE: u16 = 4096;

    fn read(&self, addr: u16) -> u8 {
        critical_section::with(|_| {
            Self::select(addr);
            regs::set(EECR, EERE);
            regs::read(EEDR)
        })
    }

    fn start_write(&mut self, addr: u16, value: u8) {
        //EEPE has to follow EEMPE within 4 cycles
        critical_section::with(|_| {
            Self::select(addr);
            regs::write(EEDR, value);
            regs::write(EECR, EEMPE);
            regs::write(EECR, EEMPE | EEPE);
        })
    }

    fn busy(&self) -> bool {
        regs::is_set(EECR, EEPE)
    }
}

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
use core::cell::Cell;
use std::vec::Vec;

use scd_common::hal;

/// Number of busy polls a simulated write lasts
const WRITE_POLLS: u8 = 3;

/// Simulated EEPROM, starting erased
///
/// Starting a write or reading while another write is in progress panics,
/// like the single writer rule would be broken on the device.
pub struct Eeprom {
    data: Vec<u8>,
    busy: Cell<u8>,
    writes: usize,
    budget: Option<usize>,
}

impl Default for Eeprom {
    fn default() -> Self {
        Self::new()
    }
}

impl Eeprom {
    pub fn new() -> Self {
        Self {
            data: std::vec![0xFF; <Self as hal::Eeprom>::SIZE as usize],
            busy: Cell::new(0),
            writes: 0,
            budget: None,
        }
    }

    /// Raw view of the whole store
    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    /// Raw access to the whole store, bypassing write timing
    pub fn contents_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Number of writes started so far, lost ones included
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Lose power after `writes` more writes: later ones never reach the cells
    pub fn cut_power_after(&mut self, writes: usize) {
        self.budget = Some(writes);
    }

    pub fn restore_power(&mut self) {
        self.budget = None;
    }
}

impl hal::Eeprom for Eeprom {
    const SIZE: u16 = 4096;

    fn read(&self, addr: u16) -> u8 {
        assert_eq!(self.busy.get(), 0, "EEPROM read while a write is in progress");
        self.data[addr as usize]
    }

    fn start_write(&mut self, addr: u16, value: u8) {
        assert_eq!(self.busy.get(), 0, "EEPROM write started while busy");
        self.writes += 1;
        self.busy.set(WRITE_POLLS);

        match &mut self.budget {
            Some(0) => {}
            Some(left) => {
                *left -= 1;
                self.data[addr as usize] = value;
            }
            None => self.data[addr as usize] = value,
        }
    }

    fn busy(&self) -> bool {
        let left = self.busy.get();
        if left == 0 {
            return false;
        }

        self.busy.set(left - 1);
        true
    }
}

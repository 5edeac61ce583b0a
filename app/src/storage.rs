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
use scd::{hal::Eeprom, Nvm, NvmError};

use crate::constants::{
    CURSOR_UNSET, EEPROM_APPLICATION, EEPROM_COUNTER, EEPROM_TLOG_DATA, EEPROM_TLOG_POINTER_HI,
    EEPROM_TLOG_POINTER_LO, EEPROM_WARM_RESET,
};

const ERASE_CHUNK: usize = 32;

/// Typed access to the persisted bytes
///
/// Writes only touch the bytes that change.
pub struct Storage<'a, E> {
    nvm: &'a mut Nvm<E>,
}

impl<'a, E: Eeprom> Storage<'a, E> {
    pub fn new(nvm: &'a mut Nvm<E>) -> Self {
        Self { nvm }
    }

    pub fn selected_application(&self) -> Result<u8, NvmError> {
        self.nvm.read_byte(EEPROM_APPLICATION)
    }

    pub fn set_selected_application(&mut self, id: u8) -> Result<(), NvmError> {
        self.nvm.update(EEPROM_APPLICATION, &[id]).map(|_| ())
    }

    pub fn counter(&self) -> Result<u8, NvmError> {
        self.nvm.read_byte(EEPROM_COUNTER)
    }

    pub fn set_counter(&mut self, value: u8) -> Result<(), NvmError> {
        self.nvm.update(EEPROM_COUNTER, &[value]).map(|_| ())
    }

    pub fn warm_marker(&self) -> Result<u8, NvmError> {
        self.nvm.read_byte(EEPROM_WARM_RESET)
    }

    pub fn set_warm_marker(&mut self, value: u8) -> Result<(), NvmError> {
        self.nvm.update(EEPROM_WARM_RESET, &[value]).map(|_| ())
    }

    /// Raw cursor, possibly [`CURSOR_UNSET`]
    pub fn log_cursor(&self) -> Result<u16, NvmError> {
        let hi = self.nvm.read_byte(EEPROM_TLOG_POINTER_HI)?;
        let lo = self.nvm.read_byte(EEPROM_TLOG_POINTER_LO)?;

        Ok(u16::from_be_bytes([hi, lo]))
    }

    pub fn set_log_cursor(&mut self, cursor: u16) -> Result<(), NvmError> {
        let [hi, lo] = cursor.to_be_bytes();
        self.nvm.update(EEPROM_TLOG_POINTER_HI, &[hi])?;
        self.nvm.update(EEPROM_TLOG_POINTER_LO, &[lo])?;

        Ok(())
    }

    /// Erase the whole store and write back the default values
    pub fn reset_defaults(&mut self) -> Result<(), NvmError> {
        let blank = [0xFF; ERASE_CHUNK];
        let size = self.nvm.size();

        for from in (0..size).step_by(ERASE_CHUNK) {
            let len = ERASE_CHUNK.min(size - from);
            self.nvm.update(from as u16, &blank[..len])?;
        }

        self.set_warm_marker(0)?;
        self.set_selected_application(0)?;
        self.set_counter(0)?;
        self.set_log_cursor(EEPROM_TLOG_DATA)?;
        self.sync();

        log::info!("persisted state reset");
        Ok(())
    }

    /// Wait for the last write to land
    pub fn sync(&self) {
        self.nvm.sync()
    }
}

/// Whether `cursor` has never been written
pub const fn cursor_is_unset(cursor: u16) -> bool {
    cursor == CURSOR_UNSET
}

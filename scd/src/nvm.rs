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
use crate::hal::Eeprom;

/// Bounds-checked byte access to the non-volatile store
///
/// Every access first waits for the write in progress, if any, so only one
/// write is ever in flight no matter who started it.
///
/// # Example
/// ```
/// # use scd::{board, Nvm};
/// let mut nvm = Nvm::new(board::Eeprom::new());
///
/// nvm.write(0x80, &[0xAA; 5]).unwrap();
/// nvm.sync();
/// assert_eq!(nvm.read_byte(0x84), Ok(0xAA));
/// ```
pub struct Nvm<E> {
    eeprom: E,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NvmError {
    Overflow { max: usize, got: usize },
}

impl<E: Eeprom> Nvm<E> {
    pub const fn new(eeprom: E) -> Self {
        Self { eeprom }
    }

    pub const fn size(&self) -> usize {
        E::SIZE as usize
    }

    fn check(&self, from: u16, len: usize) -> Result<(), NvmError> {
        //if the access wouldn't fit
        // then return error
        let end = from as usize + len;
        if end > self.size() {
            return Err(NvmError::Overflow {
                max: self.size(),
                got: end,
            });
        }

        Ok(())
    }

    /// Wait for the write in progress to complete
    pub fn sync(&self) {
        while self.eeprom.busy() {}
    }

    pub fn read_byte(&self, addr: u16) -> Result<u8, NvmError> {
        self.check(addr, 1)?;
        self.sync();

        Ok(self.eeprom.read(addr))
    }

    pub fn read(&self, from: u16, out: &mut [u8]) -> Result<(), NvmError> {
        self.check(from, out.len())?;
        self.sync();

        for (addr, byte) in (from..).zip(out.iter_mut()) {
            *byte = self.eeprom.read(addr);
        }

        Ok(())
    }

    pub fn write_byte(&mut self, addr: u16, value: u8) -> Result<(), NvmError> {
        self.write(addr, &[value])
    }

    pub fn write(&mut self, from: u16, slice: &[u8]) -> Result<(), NvmError> {
        self.check(from, slice.len())?;

        for (addr, &byte) in (from..).zip(slice) {
            self.sync();
            self.eeprom.start_write(addr, byte);
        }

        Ok(())
    }

    /// Like [`Self::write`] but skip the bytes already holding the right value
    ///
    /// Returns the number of bytes actually written
    pub fn update(&mut self, from: u16, slice: &[u8]) -> Result<usize, NvmError> {
        self.check(from, slice.len())?;

        let mut written = 0;
        for (addr, &byte) in (from..).zip(slice) {
            self.sync();
            if self.eeprom.read(addr) != byte {
                self.eeprom.start_write(addr, byte);
                written += 1;
            }
        }

        Ok(written)
    }

    pub fn eeprom(&self) -> &E {
        &self.eeprom
    }

    pub fn eeprom_mut(&mut self) -> &mut E {
        &mut self.eeprom
    }
}

#[cfg(test)]
mod tests {
    use super::{Nvm, NvmError};
    use crate::board::Eeprom;

    #[test]
    fn write_and_read_back() {
        let mut nvm = Nvm::new(Eeprom::new());

        nvm.write(0x48, &[0x01, 0x23]).unwrap();

        let mut out = [0; 3];
        nvm.read(0x48, &mut out).unwrap();
        assert_eq!(out, [0x01, 0x23, 0xFF]);
        assert_eq!(nvm.read_byte(0x49), Ok(0x23));
    }

    #[test]
    fn out_of_bounds() {
        let mut nvm = Nvm::new(Eeprom::new());

        assert_eq!(nvm.size(), 4096);
        assert_eq!(
            nvm.write(4095, &[0, 0]),
            Err(NvmError::Overflow {
                max: 4096,
                got: 4097
            })
        );
        assert!(nvm.read_byte(4096).is_err());
        assert!(nvm.write_byte(4095, 0).is_ok());
    }

    #[test]
    fn update_skips_equal_bytes() {
        let mut nvm = Nvm::new(Eeprom::new());

        nvm.write(0, &[1, 2, 3]).unwrap();
        let before = nvm.eeprom().writes();

        assert_eq!(nvm.update(0, &[1, 9, 3, 0xFF]), Ok(1));
        assert_eq!(nvm.eeprom().writes(), before + 1);
        assert_eq!(nvm.read_byte(1), Ok(9));
    }
}

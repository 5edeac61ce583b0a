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
use scd_common::hal::{self, WatchdogTimeout};

use crate::regs::{self, MCUSR, WDCE, WDE, WDRF, WDTCSR};

pub struct Watchdog;

impl Watchdog {
    pub const fn new() -> Self {
        Self
    }

    /// WDP3 lives apart from WDP2..0 in WDTCSR
    const fn prescaler_bits(timeout: WatchdogTimeout) -> u8 {
        let p = timeout.prescaler();
        ((p & 0x08) << 2) | (p & 0x07)
    }
}

impl hal::Watchdog for Watchdog {
    fn disable(&mut self) {
        critical_section::with(|_| {
            regs::wdr();
            regs::clear(MCUSR, WDRF);
            //timed sequence: 4 cycles to clear after enabling changes
            regs::set(WDTCSR, WDCE | WDE);
            regs::write(WDTCSR, 0);
        })
    }

    fn arm(&mut self, timeout: WatchdogTimeout) {
        let bits = Self::prescaler_bits(timeout);
        critical_section::with(|_| {
            regs::wdr();
            regs::write(WDTCSR, WDCE | WDE);
            regs::write(WDTCSR, WDE | bits);
        })
    }

    fn kick(&mut self) {
        regs::wdr();
    }

    fn restart(&mut self) -> ! {
        self.arm(WatchdogTimeout::Ms15);
        loop {
            core::hint::spin_loop();
        }
    }
}

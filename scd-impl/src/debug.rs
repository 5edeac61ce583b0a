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
//! Debug output on USART1, only with the `trace` feature

#[cfg(feature = "trace")]
use crate::regs::{self, TXEN1, UBRR1H, UBRR1L, UCSR1A, UCSR1B, UCSR1C, UDR1, UDRE1};

/// 38400 baud from 16 MHz
#[cfg(feature = "trace")]
const UBRR: u16 = 25;

#[cfg(feature = "trace")]
fn init() {
    if regs::is_set(UCSR1B, TXEN1) {
        return;
    }

    let [lo, hi] = UBRR.to_le_bytes();
    regs::write(UBRR1H, hi);
    regs::write(UBRR1L, lo);
    regs::write(UCSR1C, 0x06); // 8N1
    regs::write(UCSR1B, TXEN1);
}

pub fn debug_write(_s: &str) {
    #[cfg(feature = "trace")]
    {
        init();
        for &b in _s.as_bytes() {
            while !regs::is_set(UCSR1A, UDRE1) {}
            regs::write(UDR1, b);
        }
    }
}

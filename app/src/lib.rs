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
//! Firmware core of the Smart Card Detective
//!
//! Sits between a terminal and a smart card: speaks ISO 7816-3 on both
//! lines, boots the selected application and saves the exchanges it saw
//! when the terminal resets.

#![no_std]
#![no_builtins]
#![macro_use]

extern crate no_std_compat as std;

cfg_if::cfg_if! {
    if #[cfg(all(target_arch = "avr", not(test)))] {
        use core::panic::PanicInfo;

        #[panic_handler]
        fn panic(_info: &PanicInfo) -> ! {
            scd::restart()
        }
    }
}

#[macro_use]
mod utils;

pub mod constants;

pub mod transaction;
pub mod state;
pub mod storage;

pub mod log_reader;
pub mod log_writer;

pub mod atr;
pub mod link;

pub mod diagnostics;
pub mod presence;

pub mod boot;
pub mod dispatcher;

#[cfg(target_arch = "avr")]
mod entry;

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

//! This crate provides the SCD board for the current target, as well as wrappers and utilities
//!
//! On the device the board is implemented by `scd-impl`, everywhere else by the
//! `scd-mock` simulation.

#[macro_use]
extern crate cfg_if;

extern crate no_std_compat as std;

pub use scd_common::{etu, frame, hal};

cfg_if! {
    if #[cfg(target_arch = "avr")] {
        pub(crate) use scd_impl as platform;
    } else {
        pub(crate) use scd_mock as platform;

        /// Host side helpers to drive the simulated board
        pub use scd_mock as sim;
    }
}

pub mod board;
pub use board::Board;

mod nvm;
pub use nvm::{Nvm, NvmError};

mod logger;
pub use logger::ScdLog;

/// Restart the whole device under watchdog supervision
pub fn restart() -> ! {
    platform::restart()
}

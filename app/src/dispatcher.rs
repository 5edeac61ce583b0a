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

use core::convert::TryFrom;

use cfg_if::cfg_if;
use scd::Board;

/// Applications the device can boot into
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppId {
    VirtualSerial = 0x01,
    ForwardAndLog = 0x02,
    FilterAmount = 0x03,
    Terminal = 0x04,
    /// Not an application: erases the persisted state from the menu
    EraseEeprom = 0x05,
    #[cfg(feature = "dev")]
    TestTerminal = 0x10,
    #[cfg(feature = "dev")]
    TestIcc = 0x11,
}

impl AppId {
    /// Run when nothing valid was persisted
    pub const DEFAULT: Self = Self::VirtualSerial;

    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Menu entry, 2 lines of 8 characters
    pub const fn name(self) -> &'static str {
        match self {
            Self::VirtualSerial => "Virtual Serial",
            Self::ForwardAndLog => "Forward and Log",
            Self::FilterAmount => "Filter  amount",
            Self::Terminal => "Terminal",
            Self::EraseEeprom => "Erase   EEPROM",
            #[cfg(feature = "dev")]
            Self::TestTerminal => "Test    terminal",
            #[cfg(feature = "dev")]
            Self::TestIcc => "Test    ICC",
        }
    }

    /// Application to dispatch for a persisted id, if it names one
    pub fn from_persisted(id: u8) -> Option<Self> {
        Self::try_from(id).ok().filter(|app| *app != Self::EraseEeprom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownApp(pub u8);

impl TryFrom<u8> for AppId {
    type Error = UnknownApp;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        match id {
            0x01 => Ok(Self::VirtualSerial),
            0x02 => Ok(Self::ForwardAndLog),
            0x03 => Ok(Self::FilterAmount),
            0x04 => Ok(Self::Terminal),
            0x05 => Ok(Self::EraseEeprom),
            #[cfg(feature = "dev")]
            0x10 => Ok(Self::TestTerminal),
            #[cfg(feature = "dev")]
            0x11 => Ok(Self::TestIcc),
            _ => Err(UnknownApp(id)),
        }
    }
}

cfg_if! {
    if #[cfg(feature = "dev")] {
        /// Menu entries, in order
        pub const MENU: &[AppId] = &[
            AppId::VirtualSerial,
            AppId::ForwardAndLog,
            AppId::FilterAmount,
            AppId::Terminal,
            AppId::EraseEeprom,
            AppId::TestTerminal,
            AppId::TestIcc,
        ];
    } else {
        /// Menu entries, in order
        pub const MENU: &[AppId] = &[
            AppId::VirtualSerial,
            AppId::ForwardAndLog,
            AppId::FilterAmount,
            AppId::Terminal,
            AppId::EraseEeprom,
        ];
    }
}

/// Entry points of the applications built around the core
///
/// They are expected to run until the device restarts.
pub trait Applications {
    fn virtual_serial(&mut self, board: &mut Board);

    fn forward_and_log(&mut self, board: &mut Board);

    fn filter_amount(&mut self, board: &mut Board);

    fn terminal(&mut self, board: &mut Board);
}

/// Run `app`, returning only if it does
pub fn dispatch<A: Applications>(apps: &mut A, board: &mut Board, app: AppId) {
    log::info!("running {}", app.name());

    match app {
        AppId::VirtualSerial => apps.virtual_serial(board),
        AppId::ForwardAndLog => apps.forward_and_log(board),
        AppId::FilterAmount => apps.filter_amount(board),
        AppId::Terminal => apps.terminal(board),
        AppId::EraseEeprom => dispatch(apps, board, AppId::DEFAULT),
        #[cfg(feature = "dev")]
        AppId::TestTerminal => {
            if let Err(e) = crate::diagnostics::answer_terminal(board) {
                log::warn!("status {:#04x}", e.code());
            }
        }
        #[cfg(feature = "dev")]
        AppId::TestIcc => {
            if let Err(e) = crate::diagnostics::probe_card(board) {
                log::warn!("status {:#04x}", e.code());
            }
        }
    }
}

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
//! Persisted layout, log framing and fixed capacities
use scd::hal::{Led, WatchdogTimeout};

/// Warm-reset marker, [`WARM_RESET_VALUE`] after a deliberate restart
pub const EEPROM_WARM_RESET: u16 = 0x00;
/// Selected application
pub const EEPROM_APPLICATION: u16 = 0x32;
/// Completed sessions
pub const EEPROM_COUNTER: u16 = 0x40;
pub const EEPROM_TLOG_POINTER_HI: u16 = 0x48;
pub const EEPROM_TLOG_POINTER_LO: u16 = 0x49;
/// First byte of the log region
pub const EEPROM_TLOG_DATA: u16 = 0x80;
/// Last usable address of the log region
pub const EEPROM_MAX_ADDRESS: u16 = 0xFE0;

/// Value of the log cursor slots before the first flush
pub const CURSOR_UNSET: u16 = 0xFFFF;

pub const WARM_RESET_VALUE: u8 = 0xAA;

pub const MARKER_LEN: usize = 5;
pub const APP_MARKER: [u8; MARKER_LEN] = [0xDD; MARKER_LEN];
pub const CMD_MARKER: [u8; MARKER_LEN] = [0xCC; MARKER_LEN];
pub const RSP_MARKER: [u8; MARKER_LEN] = [0xAA; MARKER_LEN];
pub const END_MARKER: [u8; MARKER_LEN] = [0xBB; MARKER_LEN];

/// Cursor alignment after a flush
pub const LOG_PAGE: u16 = 8;

/// Command/response pairs held until the next flush
pub const MAX_EXCHANGES: usize = 8;

pub const COMMAND_HEADER_LEN: usize = 5;
pub const COMMAND_DATA_MAX: usize = 64;
pub const RESPONSE_DATA_MAX: usize = 192;

/// Longest serialized command or response
pub const STREAM_MAX: usize = 2 + RESPONSE_DATA_MAX;

/// Polls of the terminal line before a character is given up on
pub const MAX_WAIT_TERMINAL: u32 = 16_000_000;
/// Polls of the card line before a character is given up on
pub const MAX_WAIT_ICC: u32 = 1_000_000;
/// Polls for the first ATR character after RST goes high
pub const ICC_RST_WAIT: u32 = 50_000;

/// Timeout used for every deliberate restart
pub const RESTART_TIMEOUT: WatchdogTimeout = WatchdogTimeout::Ms15;

pub const PRESENCE_LED: Led = Led::L3;
pub const POWER_LED: Led = Led::L4;

pub const MENU_DELAY_MS: u16 = 500;
pub const FALLBACK_BLINK_MS: u16 = 500;

pub const STR_SCROLL: &str = "BC to   scroll";
pub const STR_SELECT: &str = "BD to   select";
pub const STR_AVAILABLE: &str = "Avail.  apps:";
pub const STR_ATR_SENT: &str = "ATR Sent";
pub const STR_ERROR: &str = "Error   Ocurred";
pub const STR_DATA_SENT: &str = "Data    Sent";

/// Status codes reported to the C side and in the log
pub const STATUS_SUCCESS: u8 = 0x00;
pub const STATUS_ERROR: u8 = 0x01;
pub const STATUS_ICC_ACTIVATE: u8 = 0x10;
pub const STATUS_ICC_RESPONSE: u8 = 0x11;
pub const STATUS_ATR_TS: u8 = 0x12;
pub const STATUS_ATR_T0: u8 = 0x13;
pub const STATUS_ATR_TB1: u8 = 0x14;
pub const STATUS_ATR_TD1: u8 = 0x15;
pub const STATUS_ATR_TA2: u8 = 0x16;
pub const STATUS_ATR_TB2: u8 = 0x17;
pub const STATUS_ATR_TC2: u8 = 0x18;
pub const STATUS_ATR_TA3: u8 = 0x19;
// shares its value with STATUS_ICC_ACTIVATE, readers of old logs expect it
pub const STATUS_ATR_TB3: u8 = 0x10;
pub const STATUS_ATR_TC3: u8 = 0x1A;
pub const STATUS_ATR_CHECKSUM: u8 = 0x1B;
pub const STATUS_ICC_TIMEOUT: u8 = 0x1D;
pub const STATUS_TERMINAL_RESET_LOW: u8 = 0x20;
pub const STATUS_TERMINAL_NO_CLOCK: u8 = 0x24;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_fits_the_store() {
        assert!(EEPROM_TLOG_POINTER_LO < EEPROM_TLOG_DATA);
        assert!((EEPROM_MAX_ADDRESS as usize) < 4096);
        assert_eq!(EEPROM_TLOG_DATA % LOG_PAGE, 0);
        assert!(STREAM_MAX >= COMMAND_HEADER_LEN + COMMAND_DATA_MAX);
    }

    #[test]
    fn markers_are_distinct() {
        let markers = [APP_MARKER, CMD_MARKER, RSP_MARKER, END_MARKER];
        for (i, a) in markers.iter().enumerate() {
            for b in &markers[i + 1..] {
                assert_ne!(a[0], b[0]);
            }
        }
    }
}

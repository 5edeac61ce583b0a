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
//! Symbols exported to the vector table and to the applications

use scd::{
    board::{CardSlot, Eeprom, Panel, ResetLine, Watchdog},
    hal::TerminalReset,
    Board, Nvm, ScdLog,
};

use crate::{
    boot,
    dispatcher::Applications,
    log_writer, presence, state,
    transaction::{CommandApdu, Crp, ResponseApdu},
};

extern "C" {
    fn scd_virtual_serial();
    fn scd_forward_and_log();
    fn scd_filter_amount();
    fn scd_terminal();
}

/// Applications linked in from outside the core
struct Linked;

impl Applications for Linked {
    fn virtual_serial(&mut self, _: &mut Board) {
        unsafe { scd_virtual_serial() }
    }

    fn forward_and_log(&mut self, _: &mut Board) {
        unsafe { scd_forward_and_log() }
    }

    fn filter_amount(&mut self, _: &mut Board) {
        unsafe { scd_filter_amount() }
    }

    fn terminal(&mut self, _: &mut Board) {
        unsafe { scd_terminal() }
    }
}

#[no_mangle]
pub extern "C" fn scd_main() -> ! {
    cfg_if::cfg_if! {
        if #[cfg(feature = "trace")] {
            let level = log::Level::Trace;
        } else {
            let level = log::Level::Info;
        }
    }
    //only fails if a logger is already set, records still go somewhere
    if ScdLog::install(level).is_err() {
        scd::board::debug_write("logger already installed\n");
    }

    let mut board = Board::new();
    boot::run(&mut board, &mut Linked)
}

/// Falling edge on the terminal reset line
#[no_mangle]
pub extern "C" fn scd_isr_terminal_reset() {
    let mut nvm = Nvm::new(Eeprom::new());
    log_writer::on_terminal_reset(&mut nvm, &mut Watchdog::new(), &mut ResetLine::new());
}

/// Either edge on the card detect switch
#[no_mangle]
pub extern "C" fn scd_isr_card_presence() {
    presence::on_presence_edge(&mut CardSlot::new(), &mut Panel::new());
}

/// Save the log on the next terminal reset
#[no_mangle]
pub extern "C" fn scd_arm_log_flush() {
    ResetLine::new().enable_interrupt();
}

/// Buffer one exchange for the next flush
///
/// Returns false if the exchange was malformed or the buffer is full
///
/// # Safety
///
/// `command` and `response` must be valid for reads of `command_len` and
/// `response_len` bytes respectively
#[no_mangle]
pub unsafe extern "C" fn scd_append_transaction(
    command: *const u8,
    command_len: u16,
    response: *const u8,
    response_len: u16,
) -> bool {
    if command.is_null() || response.is_null() {
        return false;
    }

    let command = std::slice::from_raw_parts(command, command_len as usize);
    let response = std::slice::from_raw_parts(response, response_len as usize);

    match (
        CommandApdu::from_bytes(command),
        ResponseApdu::from_bytes(response),
    ) {
        (Ok(command), Ok(response)) => state::append_transaction(Crp::new(command, response)),
        _ => false,
    }
}

#[no_mangle]
pub extern "C" fn scd_selected_application() -> u8 {
    state::selected_application()
}

/// Count one more transaction, returns the new count
#[no_mangle]
pub extern "C" fn scd_increment_counter() -> u8 {
    state::increment_transaction_counter()
}

#[no_mangle]
pub extern "C" fn scd_warm_reset() -> bool {
    state::warm_marker() == crate::constants::WARM_RESET_VALUE
}

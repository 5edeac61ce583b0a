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
//! Fixed exchanges checking the link engine against a real terminal or card
//!
//! Acting as a card, we answer a SELECT of the payment system directory and
//! the GET RESPONSE that follows. Acting as a terminal, we reset a card and
//! send it the same two commands. Any byte other than the expected one ends
//! the sequence.
//!
//! Each exchange is recorded as soon as it completes, so a sequence that
//! fails halfway still leaves the exchanges before the failure in the
//! transaction buffer.
use arrayvec::ArrayVec;
use scd::{
    frame::Convention,
    hal::{CardSlot, Display, Interface},
    Board,
};

use crate::{
    atr::{self, ResetError, DEFAULT_TC1},
    constants::*,
    link::{LinkError, Port},
    state,
    transaction::{ApduError, CommandApdu, Crp, ResponseApdu},
};

/// SELECT by name, 14 bytes of data
pub const SELECT_PSE: [u8; COMMAND_HEADER_LEN] = [0x00, 0xA4, 0x04, 0x00, 0x0E];
pub const PSE_NAME: &[u8; 14] = b"1PAY.SYS.DDF01";
pub const GET_RESPONSE: [u8; 4] = [0x00, 0xC0, 0x00, 0x00];

/// Data we answer the GET RESPONSE with
pub const CANNED_DATA: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];
pub const SW_SUCCESS: [u8; 2] = [0x90, 0x00];
/// Procedure bytes announcing the response to the SELECT
pub const SW_RESPONSE_AVAILABLE: u8 = 0x61;

/// Times a character is sent or read again after a parity error
const ATTEMPTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticError {
    Link(LinkError),
    Unexpected { expected: u8, got: u8 },
    /// A character kept arriving with a parity error
    Parity,
    Reset(ResetError),
}

impl DiagnosticError {
    pub fn code(&self) -> u8 {
        match self {
            Self::Link(LinkError::NoClock) => STATUS_TERMINAL_NO_CLOCK,
            Self::Link(LinkError::ResetAsserted) => STATUS_TERMINAL_RESET_LOW,
            Self::Link(LinkError::Timeout) => STATUS_ICC_TIMEOUT,
            Self::Link(_) | Self::Unexpected { .. } | Self::Parity => STATUS_ERROR,
            Self::Reset(e) => e.code(),
        }
    }
}

impl From<LinkError> for DiagnosticError {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

impl From<ResetError> for DiagnosticError {
    fn from(e: ResetError) -> Self {
        Self::Reset(e)
    }
}

fn show<D: Display>(display: &mut D, text: &str) {
    if display.available() {
        display.power(true);
        display.write_line(text);
    }
}

fn receive<I: Interface>(
    port: &mut Port<I>,
    convention: Convention,
    max_wait: u32,
) -> Result<u8, DiagnosticError> {
    for _ in 0..ATTEMPTS {
        let received = port.get_byte(convention, max_wait)?;
        if received.parity_ok {
            return Ok(received.byte);
        }
    }

    Err(DiagnosticError::Parity)
}

fn receive_into<I: Interface>(
    port: &mut Port<I>,
    convention: Convention,
    max_wait: u32,
    out: &mut [u8],
) -> Result<(), DiagnosticError> {
    for byte in out.iter_mut() {
        *byte = receive(port, convention, max_wait)?;
    }

    Ok(())
}

fn expect<I: Interface>(
    port: &mut Port<I>,
    convention: Convention,
    max_wait: u32,
    expected: u8,
) -> Result<(), DiagnosticError> {
    match receive(port, convention, max_wait)? {
        got if got == expected => Ok(()),
        got => Err(DiagnosticError::Unexpected { expected, got }),
    }
}

fn send<I: Interface>(
    port: &mut Port<I>,
    convention: Convention,
    byte: u8,
) -> Result<(), DiagnosticError> {
    for _ in 0..ATTEMPTS {
        match port.send_byte(byte, convention) {
            Err(LinkError::ParityRejected) => continue,
            other => return other.map_err(Into::into),
        }
    }

    Err(LinkError::ParityRejected.into())
}

/// Send `bytes` with `gap` ETUs between characters
fn send_all<I: Interface>(
    port: &mut Port<I>,
    convention: Convention,
    bytes: &[u8],
    gap: u32,
) -> Result<(), DiagnosticError> {
    for (i, &byte) in bytes.iter().enumerate() {
        if i != 0 {
            port.wait(gap)?;
        }
        send(port, convention, byte)?;
    }

    Ok(())
}

fn record(command: &[u8], response: Result<ResponseApdu, ApduError>) {
    match (CommandApdu::from_bytes(command), response) {
        (Ok(command), Ok(response)) => {
            state::append_transaction(Crp::new(command, response));
        }
        (Err(e), _) | (_, Err(e)) => log::warn!("exchange not recorded: {:?}", e),
    }
}

fn select_command() -> ArrayVec<u8, { COMMAND_HEADER_LEN + 14 }> {
    let mut command = ArrayVec::new();
    command.extend(SELECT_PSE.iter().chain(PSE_NAME.iter()).copied());
    command
}

/// Answer a terminal as a card would
pub fn answer_terminal(board: &mut Board) -> Result<(), DiagnosticError> {
    let result = answer_terminal_steps(board);
    if let Err(e) = result {
        log::warn!("terminal sequence failed: {:?}", e);
        show(&mut board.panel, STR_ERROR);
    }

    result
}

fn answer_terminal_steps(board: &mut Board) -> Result<(), DiagnosticError> {
    let conv = Convention::Direct;
    let mut port = Port::new(&mut board.terminal, Board::TERMINAL_ETU);

    if !(0..MAX_WAIT_TERMINAL).any(|_| port.clock_present()) {
        return Err(LinkError::NoClock.into());
    }
    if !(0..MAX_WAIT_TERMINAL).any(|_| !port.interface().reset_asserted()) {
        return Err(LinkError::ResetAsserted.into());
    }

    port.wait(10)?;
    atr::send_atr(&mut port, DEFAULT_TC1)?;
    show(&mut board.panel, STR_ATR_SENT);

    let mut select = [0; COMMAND_HEADER_LEN + 14];
    receive_into(&mut port, conv, MAX_WAIT_TERMINAL, &mut select[..COMMAND_HEADER_LEN])?;
    if select[1] != SELECT_PSE[1] {
        return Err(DiagnosticError::Unexpected {
            expected: SELECT_PSE[1],
            got: select[1],
        });
    }

    port.wait(20)?;
    send(&mut port, conv, SELECT_PSE[1])?;

    receive_into(&mut port, conv, MAX_WAIT_TERMINAL, &mut select[COMMAND_HEADER_LEN..])?;
    let name = &select[COMMAND_HEADER_LEN..];
    show(
        &mut board.panel,
        core::str::from_utf8(name).unwrap_or(STR_ERROR),
    );
    if let Some((&got, &expected)) = name.iter().zip(PSE_NAME).find(|(a, b)| a != b) {
        return Err(DiagnosticError::Unexpected { expected, got });
    }

    let available = CANNED_DATA.len() as u8;
    port.wait(2)?;
    send_all(&mut port, conv, &[SW_RESPONSE_AVAILABLE, available], 2)?;
    record(&select, ResponseApdu::new(&[], SW_RESPONSE_AVAILABLE, available));

    let mut get_response = [0; COMMAND_HEADER_LEN];
    receive_into(&mut port, conv, MAX_WAIT_TERMINAL, &mut get_response)?;
    if get_response[1] != GET_RESPONSE[1] {
        return Err(DiagnosticError::Unexpected {
            expected: GET_RESPONSE[1],
            got: get_response[1],
        });
    }

    port.wait(20)?;
    let mut answer = ArrayVec::<u8, 7>::new();
    answer.push(GET_RESPONSE[1]);
    answer.extend(CANNED_DATA.iter().chain(SW_SUCCESS.iter()).copied());
    send_all(&mut port, conv, &answer, 2)?;
    record(
        &get_response,
        ResponseApdu::new(&CANNED_DATA, SW_SUCCESS[0], SW_SUCCESS[1]),
    );

    show(&mut board.panel, STR_DATA_SENT);
    Ok(())
}

/// Reset the card in the slot and select its payment system directory
pub fn probe_card(board: &mut Board) -> Result<(), DiagnosticError> {
    let result = probe_card_steps(board);
    if let Err(e) = result {
        log::warn!("card sequence failed: {:?}", e);
        show(&mut board.panel, STR_ERROR);
    }

    board.card.deactivate();
    result
}

fn probe_card_steps(board: &mut Board) -> Result<(), DiagnosticError> {
    let mut port = Port::new(&mut board.icc, Board::icc_etu());

    let atr = atr::reset_card(&mut board.card, &mut port)?;
    let conv = atr.convention();
    log::debug!("card answered, T={} TC1={:#04x}", atr.protocol(), atr.tc1());

    let select = select_command();
    port.wait(5)?;
    send_all(&mut port, conv, &select[..COMMAND_HEADER_LEN], 2)?;

    port.wait(1)?;
    expect(&mut port, conv, MAX_WAIT_ICC, SELECT_PSE[1])?;

    port.wait(5)?;
    send_all(&mut port, conv, &select[COMMAND_HEADER_LEN..], 2)?;

    port.wait(1)?;
    expect(&mut port, conv, MAX_WAIT_ICC, SW_RESPONSE_AVAILABLE)?;
    port.wait(1)?;
    let available = receive(&mut port, conv, MAX_WAIT_ICC)?;
    record(&select, ResponseApdu::new(&[], SW_RESPONSE_AVAILABLE, available));

    if available as usize > RESPONSE_DATA_MAX {
        return Err(DiagnosticError::Unexpected {
            expected: RESPONSE_DATA_MAX as u8,
            got: available,
        });
    }

    let mut get_response = [0; COMMAND_HEADER_LEN];
    get_response[..4].copy_from_slice(&GET_RESPONSE);
    get_response[4] = available;

    port.wait(5)?;
    send_all(&mut port, conv, &get_response, 2)?;

    port.wait(1)?;
    expect(&mut port, conv, MAX_WAIT_ICC, GET_RESPONSE[1])?;

    let mut data = [0; RESPONSE_DATA_MAX];
    let data = &mut data[..available as usize];
    receive_into(&mut port, conv, MAX_WAIT_ICC, data)?;

    let mut status = [0; 2];
    receive_into(&mut port, conv, MAX_WAIT_ICC, &mut status)?;
    record(&get_response, ResponseApdu::new(data, status[0], status[1]));

    log::info!("card answered {:02x}{:02x}", status[0], status[1]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        atr::AtrError,
        constants::{STATUS_ATR_TB3, STATUS_ICC_ACTIVATE},
    };
    use serial_test::serial;
    use std::vec::Vec;

    fn terminal_script(board: &mut Board, ins: u8) {
        let conv = Convention::Direct;
        board.terminal.queue_bytes(&[0x00, ins, 0x04, 0x00, 0x0E], conv);
        board.terminal.queue_bytes(PSE_NAME, conv);
        board.terminal.queue_bytes(&[0x00, 0xC0, 0x00, 0x00, 0x04], conv);
    }

    fn card_script(board: &mut Board) {
        let conv = Convention::Direct;
        board.card.insert();
        board.icc.queue_bytes(&[0x3B, 0x60, 0x00, 0x00], conv);
        board.icc.queue_bytes(&[0xA4, 0x61, 0x04, 0xC0], conv);
        board.icc.queue_bytes(&[0xDE, 0xAD, 0xBE, 0xEF, 0x90, 0x00], conv);
    }

    #[test]
    #[serial(state)]
    fn answers_a_terminal() {
        state::discard_transactions();
        let mut board = Board::new();
        terminal_script(&mut board, 0xA4);

        answer_terminal(&mut board).unwrap();

        assert_eq!(
            hex::encode(board.terminal.sent_bytes(Convention::Direct)),
            "3b60000fa46104c0deadbeef9000"
        );
        assert_eq!(
            board.panel.lines(),
            [STR_ATR_SENT, "1PAY.SYS.DDF01", STR_DATA_SENT]
        );
        assert_eq!(board.terminal.pending(), 0);

        let recorded: Vec<(u8, u8)> = state::with_transactions(|buffer| {
            buffer
                .iter()
                .map(|crp| (crp.command().ins(), crp.response().sw1()))
                .collect()
        });
        assert_eq!(recorded, [(0xA4, 0x61), (0xC0, 0x90)]);
        state::discard_transactions();
    }

    #[test]
    #[serial(state)]
    fn wrong_instruction_aborts() {
        state::discard_transactions();
        let mut board = Board::new();
        terminal_script(&mut board, 0xB2);

        assert_eq!(
            answer_terminal(&mut board),
            Err(DiagnosticError::Unexpected {
                expected: 0xA4,
                got: 0xB2
            })
        );
        assert_eq!(board.panel.lines().last().map(|l| l.as_str()), Some(STR_ERROR));
        assert_eq!(state::transaction_count(), 0);
    }

    #[test]
    #[serial(state)]
    fn terminal_parity_error_is_read_again() {
        state::discard_transactions();
        let mut board = Board::new();
        let conv = Convention::Direct;
        board.terminal.queue_bad_parity(0x00, conv);
        terminal_script(&mut board, 0xA4);

        answer_terminal(&mut board).unwrap();
        assert_eq!(board.terminal.error_signals(), 1);
        state::discard_transactions();
    }

    #[test]
    #[serial(state)]
    fn probes_a_card() {
        state::discard_transactions();
        let mut board = Board::new();
        card_script(&mut board);

        probe_card(&mut board).unwrap();

        let mut expected = hex::decode("00a404000e").unwrap();
        expected.extend_from_slice(PSE_NAME);
        expected.extend_from_slice(&[0x00, 0xC0, 0x00, 0x00, 0x04]);
        assert_eq!(board.icc.sent_bytes(Convention::Direct), expected);

        assert_eq!(board.card.activations(), &[false][..]);
        assert_eq!(board.card.deactivations(), 1);

        let data = state::with_transactions(|buffer| {
            buffer.iter().last().map(|crp| crp.response().data().to_vec())
        });
        assert_eq!(data, Some(CANNED_DATA.to_vec()));
        state::discard_transactions();
    }

    #[test]
    #[serial(state)]
    fn no_card() {
        let mut board = Board::new();

        assert_eq!(
            probe_card(&mut board),
            Err(DiagnosticError::Reset(ResetError::Activation))
        );
        assert_eq!(board.panel.lines(), [STR_ERROR]);

        board.panel = scd::board::Panel::new();
        assert_status!(probe_card(&mut board), STATUS_ICC_ACTIVATE);
    }

    #[test]
    #[serial(state)]
    fn unexpected_procedure_byte_from_card() {
        state::discard_transactions();
        let mut board = Board::new();
        board.card.insert();
        board
            .icc
            .queue_bytes(&[0x3B, 0x60, 0x00, 0x00, 0x6A, 0x82], Convention::Direct);

        assert_eq!(
            probe_card(&mut board),
            Err(DiagnosticError::Unexpected {
                expected: 0xA4,
                got: 0x6A
            })
        );
        assert_eq!(state::transaction_count(), 0);
    }

    #[test]
    #[serial(state)]
    fn completed_exchanges_stay_recorded_after_a_failure() {
        state::discard_transactions();
        let mut board = Board::new();
        board.card.insert();
        board.icc.queue_bytes(
            &[0x3B, 0x60, 0x00, 0x00, 0xA4, 0x61, 0x04, 0x6D],
            Convention::Direct,
        );

        assert_eq!(
            probe_card(&mut board),
            Err(DiagnosticError::Unexpected {
                expected: 0xC0,
                got: 0x6D
            })
        );

        let recorded: Vec<(u8, u8, u8)> = state::with_transactions(|buffer| {
            buffer
                .iter()
                .map(|crp| (crp.command().ins(), crp.response().sw1(), crp.response().sw2()))
                .collect()
        });
        assert_eq!(recorded, [(0xA4, 0x61, 0x04)]);
        state::discard_transactions();
    }

    #[test]
    fn status_codes() {
        assert_eq!(DiagnosticError::Link(LinkError::NoClock).code(), 0x24);
        assert_eq!(
            DiagnosticError::Reset(ResetError::Atr(AtrError::Tb3)).code(),
            STATUS_ATR_TB3
        );
        assert_eq!(
            DiagnosticError::Reset(ResetError::Activation).code(),
            STATUS_ICC_ACTIVATE
        );
        assert_eq!(DiagnosticError::Parity.code(), STATUS_ERROR);
    }
}

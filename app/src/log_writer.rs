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
//! Flush of the captured exchanges to the log region
//!
//! Runs from the terminal reset interrupt. The cursor is persisted last, so
//! losing power anywhere in between leaves the previous log valid.
use scd::{
    hal::{Eeprom, TerminalReset, Watchdog},
    Nvm, NvmError,
};
use zeroize::Zeroize;

use crate::{
    constants::{
        APP_MARKER, CMD_MARKER, CURSOR_UNSET, EEPROM_MAX_ADDRESS, EEPROM_TLOG_DATA, END_MARKER,
        LOG_PAGE, MARKER_LEN, RESTART_TIMEOUT, RSP_MARKER, WARM_RESET_VALUE,
    },
    state,
    storage::Storage,
    transaction::{Serialize, Stream, TransactionBuffer},
};

const MARKER: u16 = MARKER_LEN as u16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushReport {
    /// Where this flush started writing
    pub start: u16,
    /// Persisted cursor after the flush
    pub cursor: u16,
    /// Exchanges written out
    pub written: usize,
    /// Commands or responses that could not be serialized
    pub skipped: usize,
    /// Exchanges dropped because the log region is full
    pub dropped: usize,
}

impl FlushReport {
    pub fn truncated(&self) -> bool {
        self.dropped > 0
    }
}

/// Start of the next flush for a persisted cursor
pub const fn effective_cursor(persisted: u16) -> u16 {
    if persisted == CURSOR_UNSET || persisted < EEPROM_TLOG_DATA {
        EEPROM_TLOG_DATA
    } else {
        persisted
    }
}

/// Round down to the page and move to the next one, never past the region
pub const fn align_cursor(cursor: u16) -> u16 {
    let next = (cursor & !(LOG_PAGE - 1)) + LOG_PAGE;
    if next > EEPROM_MAX_ADDRESS {
        EEPROM_MAX_ADDRESS
    } else {
        next
    }
}

/// Warm-reset marker to persist after a terminal reset
///
/// A live reset, with the terminal clock still running, toggles the marker; a
/// real power loss clears it.
pub const fn next_warm_marker(current: u8, clock_present: bool) -> u8 {
    if clock_present && current != WARM_RESET_VALUE {
        WARM_RESET_VALUE
    } else {
        0
    }
}

struct Writer<'a, E> {
    nvm: &'a mut Nvm<E>,
    cursor: u16,
}

impl<E: Eeprom> Writer<'_, E> {
    /// Whether `len` bytes plus the end marker still fit
    fn room_for(&self, len: usize) -> bool {
        self.cursor as usize + len + MARKER_LEN <= EEPROM_MAX_ADDRESS as usize
    }

    fn put(&mut self, bytes: &[u8]) -> Result<(), NvmError> {
        self.nvm.write(self.cursor, bytes)?;
        self.cursor += bytes.len() as u16;
        Ok(())
    }

    fn put_record(&mut self, marker: &[u8], stream: &mut Option<Stream>) -> Result<(), NvmError> {
        if let Some(stream) = stream {
            self.put(marker)?;
            self.put(stream)?;
            stream.as_mut_slice().zeroize();
        }

        Ok(())
    }
}

fn record_len(stream: &Option<Stream>) -> usize {
    stream.as_ref().map(|s| MARKER_LEN + s.len()).unwrap_or(0)
}

/// Write every buffered exchange as one session of `app`, emptying the buffer
///
/// Exchanges that no longer fit are dropped whole; the end marker always fits
/// as long as the cursor is inside the region.
pub fn flush<E, C, R>(
    nvm: &mut Nvm<E>,
    buffer: &mut TransactionBuffer<C, R>,
    app: u8,
) -> Result<FlushReport, NvmError>
where
    E: Eeprom,
    C: Serialize + Zeroize,
    R: Serialize + Zeroize,
{
    let persisted = Storage::new(nvm).log_cursor()?;
    let start = effective_cursor(persisted);

    let mut report = FlushReport {
        start,
        cursor: persisted,
        ..Default::default()
    };

    let mut writer = Writer { nvm, cursor: start };

    if !buffer.is_empty() && writer.room_for(MARKER_LEN + 1) {
        writer.put(&APP_MARKER)?;
        writer.put(&[app])?;

        let mut full = false;
        for crp in buffer.drain() {
            if full {
                report.dropped += 1;
                continue;
            }

            let mut command = crp.command().serialize();
            let mut response = crp.response().serialize();
            report.skipped += command.is_none() as usize + response.is_none() as usize;

            if !writer.room_for(record_len(&command) + record_len(&response)) {
                log::warn!("log region full at {:#06x}", writer.cursor);
                full = true;
                report.dropped += 1;
                continue;
            }

            writer.put_record(&CMD_MARKER, &mut command)?;
            writer.put_record(&RSP_MARKER, &mut response)?;
            report.written += 1;
        }
    } else {
        report.dropped = buffer.len();
        buffer.clear();
    }

    if writer.room_for(0) {
        writer.put(&END_MARKER)?;

        let cursor = align_cursor(writer.cursor);
        Storage::new(writer.nvm).set_log_cursor(cursor)?;
        report.cursor = cursor;
    }

    log::debug!(
        "flushed {} exchanges, cursor {:#06x} -> {:#06x}",
        report.written,
        report.start,
        report.cursor
    );
    Ok(report)
}

/// Everything done on a falling edge of the terminal reset line
///
/// Saves the counter and the buffered exchanges, updates the warm-reset
/// marker, then leaves the watchdog armed so the device restarts shortly.
/// Errors have nowhere to go, each one is logged and the next step still runs.
pub fn on_terminal_reset<E, W, T>(
    nvm: &mut Nvm<E>,
    watchdog: &mut W,
    reset: &mut T,
) -> Option<FlushReport>
where
    E: Eeprom,
    W: Watchdog,
    T: TerminalReset,
{
    watchdog.disable();

    if let Err(e) = Storage::new(nvm).set_counter(state::transaction_counter()) {
        log::trace!("counter not saved: {:?}", e);
    }

    let app = state::selected_application();
    let report = match state::with_transactions(|buffer| flush(nvm, buffer, app)) {
        Ok(report) => Some(report),
        Err(e) => {
            log::trace!("flush aborted: {:?}", e);
            state::discard_transactions();
            None
        }
    };

    let clock = reset.clock_present();
    let mut storage = Storage::new(nvm);
    let warm = storage
        .warm_marker()
        .map(|current| next_warm_marker(current, clock))
        .and_then(|next| storage.set_warm_marker(next));
    if let Err(e) = warm {
        log::trace!("warm marker not saved: {:?}", e);
    }

    reset.disable_interrupt();

    storage.sync();
    watchdog.arm(RESTART_TIMEOUT);

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{CommandApdu, Crp, ResponseApdu};
    use scd::board;

    struct Opaque(u8);

    impl Serialize for Opaque {
        fn serialize(&self) -> Option<Stream> {
            None
        }
    }

    impl Zeroize for Opaque {
        fn zeroize(&mut self) {
            self.0.zeroize()
        }
    }

    fn exchange(cmd: &str, rsp: &str) -> Crp {
        Crp::new(
            CommandApdu::from_bytes(&hex::decode(cmd).unwrap()).unwrap(),
            ResponseApdu::from_bytes(&hex::decode(rsp).unwrap()).unwrap(),
        )
    }

    fn region(nvm: &Nvm<board::Eeprom>, from: u16, to: u16) -> std::vec::Vec<u8> {
        nvm.eeprom().contents()[from as usize..to as usize].to_vec()
    }

    #[test]
    fn cursor_helpers() {
        assert_eq!(effective_cursor(CURSOR_UNSET), EEPROM_TLOG_DATA);
        assert_eq!(effective_cursor(0x10), EEPROM_TLOG_DATA);
        assert_eq!(effective_cursor(0x0100), 0x0100);

        assert_eq!(align_cursor(0x0080), 0x0088);
        assert_eq!(align_cursor(0x0085), 0x0088);
        assert_eq!(align_cursor(0x00FF), 0x0100);
        assert_eq!(align_cursor(EEPROM_MAX_ADDRESS), EEPROM_MAX_ADDRESS);
    }

    #[test]
    fn warm_marker_transitions() {
        assert_eq!(next_warm_marker(0, true), WARM_RESET_VALUE);
        assert_eq!(next_warm_marker(WARM_RESET_VALUE, true), 0);
        assert_eq!(next_warm_marker(0x42, true), WARM_RESET_VALUE);
        assert_eq!(next_warm_marker(WARM_RESET_VALUE, false), 0);
        assert_eq!(next_warm_marker(0, false), 0);
    }

    #[test]
    fn empty_buffer_writes_end_marker_only() {
        let mut nvm = Nvm::new(board::Eeprom::new());
        let mut buffer = TransactionBuffer::<CommandApdu, ResponseApdu>::new();

        let report = flush(&mut nvm, &mut buffer, 1).unwrap();

        assert_eq!(report.start, EEPROM_TLOG_DATA);
        assert_eq!(report.cursor, 0x0088);
        assert_eq!(region(&nvm, 0x80, 0x86), [0xBB, 0xBB, 0xBB, 0xBB, 0xBB, 0xFF]);
        assert_eq!(Storage::new(&mut nvm).log_cursor(), Ok(0x0088));
    }

    #[test]
    fn two_exchanges_from_unset_cursor() {
        let mut nvm = Nvm::new(board::Eeprom::new());
        let mut buffer = TransactionBuffer::new();
        buffer.append(exchange("00a4040002aabb", "6104")).unwrap();
        buffer.append(exchange("00c0000004", "deadbeef9000")).unwrap();

        let report = flush(&mut nvm, &mut buffer, 2).unwrap();
        assert_eq!(report.written, 2);
        assert!(buffer.is_empty());

        let expected = hex::decode(concat!(
            "dddddddddd02",
            "cccccccccc00a4040002aabb",
            "aaaaaaaaaa6104",
            "cccccccccc00c0000004",
            "aaaaaaaaaa9000deadbeef",
            "bbbbbbbbbb"
        ))
        .unwrap();
        let end = 0x80 + expected.len() as u16;
        assert_eq!(region(&nvm, 0x80, end), expected);
        assert_eq!(report.cursor, align_cursor(end));
        assert_eq!(report.cursor % 8, 0);
    }

    #[test]
    fn unserializable_records_are_skipped() {
        let mut nvm = Nvm::new(board::Eeprom::new());
        let mut buffer = TransactionBuffer::<Opaque, ResponseApdu>::new();
        buffer
            .append(Crp::new(Opaque(1), ResponseApdu::new(&[], 0x6A, 0x82).unwrap()))
            .unwrap();

        let report = flush(&mut nvm, &mut buffer, 4).unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(
            crate::utils::dump(&nvm, 0x80, 18),
            "dddddddddd04aaaaaaaaaa6a82bbbbbbbbbb"
        );
    }

    #[test]
    fn full_region_stops_before_the_limit() {
        let mut nvm = Nvm::new(board::Eeprom::new());
        Storage::new(&mut nvm).set_log_cursor(0x0FC0).unwrap();

        let mut buffer = TransactionBuffer::new();
        for _ in 0..3 {
            buffer.append(exchange("00b2010c00", "9000")).unwrap();
        }

        let report = flush(&mut nvm, &mut buffer, 1).unwrap();

        // header 6, each exchange 10 + 7, end 5: room for one exchange
        assert_eq!(report.written, 1);
        assert_eq!(report.dropped, 2);
        assert!(report.truncated());
        assert_eq!(region(&nvm, 0x0FC0 + 23, 0x0FC0 + 28), [0xBB; 5]);
        assert!(nvm.eeprom().contents()[0x0FC0 + 28..=EEPROM_MAX_ADDRESS as usize]
            .iter()
            .all(|&b| b == 0xFF));
        assert_eq!(report.cursor, EEPROM_MAX_ADDRESS);
    }

    #[test]
    fn cursor_past_the_region_writes_nothing() {
        let mut nvm = Nvm::new(board::Eeprom::new());
        Storage::new(&mut nvm).set_log_cursor(EEPROM_MAX_ADDRESS).unwrap();
        let before = nvm.eeprom().writes();

        let mut buffer = TransactionBuffer::new();
        buffer.append(exchange("00b2010c00", "9000")).unwrap();

        let report = flush(&mut nvm, &mut buffer, 1).unwrap();
        assert_eq!(report.dropped, 1);
        assert_eq!(report.cursor, EEPROM_MAX_ADDRESS);
        assert_eq!(nvm.eeprom().writes(), before);
        assert!(buffer.is_empty());
    }

    #[test]
    fn power_loss_keeps_the_previous_cursor() {
        let mut nvm = Nvm::new(board::Eeprom::new());
        let mut buffer = TransactionBuffer::new();
        buffer.append(exchange("00a4040000", "9000")).unwrap();
        let first = flush(&mut nvm, &mut buffer, 1).unwrap();

        buffer.append(exchange("00b2010c00", "6a83")).unwrap();
        nvm.eeprom_mut().cut_power_after(4);
        flush(&mut nvm, &mut buffer, 1).unwrap();
        nvm.eeprom_mut().restore_power();

        assert_eq!(Storage::new(&mut nvm).log_cursor(), Ok(first.cursor));
        assert_eq!(region(&nvm, 0x80, 0x86), [0xDD, 0xDD, 0xDD, 0xDD, 0xDD, 0x01]);
    }
}

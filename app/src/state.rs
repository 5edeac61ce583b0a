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
//! Process-wide state shared between the main flow and the interrupt handlers
//!
//! Every access goes through a critical section, so the log flush never sees
//! a half-made update.
use core::cell::{Cell, RefCell};

use critical_section::Mutex;

use crate::transaction::{Crp, TransactionBuffer};

static TRANSACTIONS: Mutex<RefCell<TransactionBuffer>> =
    Mutex::new(RefCell::new(TransactionBuffer::new()));

static SELECTED: Mutex<Cell<u8>> = Mutex::new(Cell::new(0));
static COUNTER: Mutex<Cell<u8>> = Mutex::new(Cell::new(0));
static WARM: Mutex<Cell<u8>> = Mutex::new(Cell::new(0));

/// Queue an exchange for the next flush
///
/// Returns `false` and drops the exchange if the buffer is full
pub fn append_transaction(crp: Crp) -> bool {
    let stored = critical_section::with(|cs| TRANSACTIONS.borrow_ref_mut(cs).append(crp).is_ok());
    if !stored {
        log::trace!("transaction buffer full, exchange dropped");
    }

    stored
}

pub fn transaction_count() -> usize {
    critical_section::with(|cs| TRANSACTIONS.borrow_ref(cs).len())
}

/// Run `f` on the buffer with interrupts masked
pub fn with_transactions<T>(f: impl FnOnce(&mut TransactionBuffer) -> T) -> T {
    critical_section::with(|cs| f(&mut TRANSACTIONS.borrow_ref_mut(cs)))
}

pub fn discard_transactions() {
    with_transactions(|buffer| buffer.clear())
}

pub fn selected_application() -> u8 {
    critical_section::with(|cs| SELECTED.borrow(cs).get())
}

pub fn set_selected_application(id: u8) {
    critical_section::with(|cs| SELECTED.borrow(cs).set(id))
}

pub fn transaction_counter() -> u8 {
    critical_section::with(|cs| COUNTER.borrow(cs).get())
}

pub fn set_transaction_counter(value: u8) {
    critical_section::with(|cs| COUNTER.borrow(cs).set(value))
}

/// Count one more completed session, returns the new count
pub fn increment_transaction_counter() -> u8 {
    critical_section::with(|cs| {
        let counter = COUNTER.borrow(cs);
        let value = counter.get().wrapping_add(1);
        counter.set(value);
        value
    })
}

/// Warm-reset marker as read at boot
pub fn warm_marker() -> u8 {
    critical_section::with(|cs| WARM.borrow(cs).get())
}

pub fn set_warm_marker(value: u8) {
    critical_section::with(|cs| WARM.borrow(cs).set(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_EXCHANGES;
    use crate::transaction::{CommandApdu, ResponseApdu};
    use serial_test::serial;

    fn crp(ins: u8) -> Crp {
        Crp::new(
            CommandApdu::new([0x80, ins, 0, 0, 0], &[]).unwrap(),
            ResponseApdu::new(&[], 0x90, 0x00).unwrap(),
        )
    }

    #[test]
    #[serial(state)]
    fn full_buffer_drops_appends() {
        discard_transactions();

        for ins in 0..MAX_EXCHANGES as u8 {
            assert!(append_transaction(crp(ins)));
        }
        assert!(!append_transaction(crp(0xFF)));
        assert_eq!(transaction_count(), MAX_EXCHANGES);

        let last = with_transactions(|buffer| buffer.iter().last().map(|e| e.command().ins()));
        assert_eq!(last, Some(MAX_EXCHANGES as u8 - 1));

        discard_transactions();
        assert_eq!(transaction_count(), 0);
    }

    #[test]
    #[serial(state)]
    fn counter_wraps() {
        set_transaction_counter(0xFE);
        assert_eq!(increment_transaction_counter(), 0xFF);
        assert_eq!(increment_transaction_counter(), 0x00);
        assert_eq!(transaction_counter(), 0);
    }

    #[test]
    #[serial(state)]
    fn selection_is_shared() {
        set_selected_application(3);
        assert_eq!(selected_application(), 3);
        set_selected_application(0);
    }
}

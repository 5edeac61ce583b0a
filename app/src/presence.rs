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
//! Card presence supervision, driven by the card detect interrupt
use core::cell::Cell;

use critical_section::Mutex;
use scd::hal::{CardSlot, Leds};

use crate::constants::PRESENCE_LED;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Absent,
    Present,
}

static PRESENCE: Mutex<Cell<Presence>> = Mutex::new(Cell::new(Presence::Absent));

pub fn presence() -> Presence {
    critical_section::with(|cs| PRESENCE.borrow(cs).get())
}

/// React to an edge of the card detect switch
///
/// The switch level is read rather than trusting the edge, so a bounce
/// ends in the right state. A removed card is deactivated right away.
pub fn on_presence_edge<S: CardSlot, L: Leds>(slot: &mut S, leds: &mut L) -> Presence {
    let now = if slot.inserted() {
        leds.set_led(PRESENCE_LED, true);
        Presence::Present
    } else {
        leds.set_led(PRESENCE_LED, false);
        slot.deactivate();
        Presence::Absent
    };

    critical_section::with(|cs| PRESENCE.borrow(cs).replace(now));
    log::trace!("card {:?}", now);

    now
}

/// Sync the indicator with the switch and start watching it
pub fn start<S: CardSlot, L: Leds>(slot: &mut S, leds: &mut L) -> Presence {
    let now = on_presence_edge(slot, leds);
    slot.enable_presence_interrupt();
    now
}

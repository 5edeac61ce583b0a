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
//! Answer to reset: sending ours to a terminal, reading and checking a card's
use arrayvec::ArrayVec;
use scd::{
    frame::Convention,
    hal::{CardSlot, Interface},
};

use crate::{
    constants::*,
    link::{LinkError, Port},
};

/// Interface byte groups kept, TA1 to TD4
pub const GROUPS: usize = 4;

const TA: usize = 0;
const TB: usize = 1;
const TC: usize = 2;
const TD: usize = 3;

/// Extra guard time announced in the ATR we send
pub const DEFAULT_TC1: u8 = 0x0F;

/// TA3 assumed when the card does not send it
pub const DEFAULT_TA3: u8 = 0x20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtrError {
    Link(LinkError),
    Ts(u8),
    /// TB1 not announced
    T0,
    Tb1,
    Td1,
    Ta2,
    Tb2,
    Tc2,
    Ta3,
    Tb3,
    Tc3,
    Checksum,
}

impl AtrError {
    pub fn code(&self) -> u8 {
        match self {
            Self::Link(_) => STATUS_ICC_RESPONSE,
            Self::Ts(_) => STATUS_ATR_TS,
            Self::T0 => STATUS_ATR_T0,
            Self::Tb1 => STATUS_ATR_TB1,
            Self::Td1 => STATUS_ATR_TD1,
            Self::Ta2 => STATUS_ATR_TA2,
            Self::Tb2 => STATUS_ATR_TB2,
            Self::Tc2 => STATUS_ATR_TC2,
            Self::Ta3 => STATUS_ATR_TA3,
            Self::Tb3 => STATUS_ATR_TB3,
            Self::Tc3 => STATUS_ATR_TC3,
            Self::Checksum => STATUS_ATR_CHECKSUM,
        }
    }
}

impl From<LinkError> for AtrError {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetError {
    /// The card could not be powered
    Activation,
    /// No TS after RST went high
    NoAnswer,
    Atr(AtrError),
}

impl ResetError {
    pub fn code(&self) -> u8 {
        match self {
            Self::Activation => STATUS_ICC_ACTIVATE,
            Self::NoAnswer => STATUS_ICC_RESPONSE,
            Self::Atr(e) => e.code(),
        }
    }
}

impl From<AtrError> for ResetError {
    fn from(e: AtrError) -> Self {
        Self::Atr(e)
    }
}

/// A parsed answer to reset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atr {
    convention: Convention,
    t0: u8,
    interface: [Option<u8>; 4 * GROUPS],
    historical: ArrayVec<u8, 15>,
    tck: Option<u8>,
}

impl Atr {
    pub fn convention(&self) -> Convention {
        self.convention
    }

    pub fn t0(&self) -> u8 {
        self.t0
    }

    fn byte(&self, group: usize, kind: usize) -> Option<u8> {
        group
            .checked_sub(1)
            .and_then(|g| self.interface.get(g * 4 + kind))
            .copied()
            .flatten()
    }

    pub fn ta(&self, i: usize) -> Option<u8> {
        self.byte(i, TA)
    }

    pub fn tb(&self, i: usize) -> Option<u8> {
        self.byte(i, TB)
    }

    pub fn tc(&self, i: usize) -> Option<u8> {
        self.byte(i, TC)
    }

    pub fn td(&self, i: usize) -> Option<u8> {
        self.byte(i, TD)
    }

    /// Protocol announced by TD1, T=0 without it
    pub fn protocol(&self) -> u8 {
        self.td(1).map(|td| td & 0x0F).unwrap_or(0)
    }

    /// Extra guard time, 0 when absent
    pub fn tc1(&self) -> u8 {
        self.tc(1).unwrap_or(0)
    }

    /// Information field size for T=1
    pub fn ta3(&self) -> u8 {
        self.ta(3).unwrap_or(DEFAULT_TA3)
    }

    /// Waiting times for T=1
    pub fn tb3(&self) -> Option<u8> {
        self.tb(3)
    }

    pub fn historical(&self) -> &[u8] {
        &self.historical
    }

    pub fn tck(&self) -> Option<u8> {
        self.tck
    }
}

/// Reads the characters after TS, keeping the XOR of everything read
struct Reader<F> {
    next: F,
    convention: Convention,
    check: u8,
}

impl<F: FnMut(Convention) -> Result<u8, LinkError>> Reader<F> {
    fn byte(&mut self) -> Result<u8, LinkError> {
        let byte = (self.next)(self.convention)?;
        self.check ^= byte;
        Ok(byte)
    }
}

/// Restrictions on the interface bytes, as EMV puts them
fn check_interface(group: usize, kind: usize, value: u8, protocol: u8) -> Result<(), AtrError> {
    match (group, kind) {
        (0, TB) if value != 0 => Err(AtrError::Tb1),
        (0, TD) if value & 0x0F > 1 => Err(AtrError::Td1),
        (1, TA) => Err(AtrError::Ta2),
        (1, TB) => Err(AtrError::Tb2),
        (1, TC) if value != 0x0A => Err(AtrError::Tc2),
        (2, TA) if value < 0x0F || value == 0xFF => Err(AtrError::Ta3),
        (2, TB) if value & 0x0F > 5 || value >> 4 > 4 => Err(AtrError::Tb3),
        (2, TC) if protocol == 0 || value != 0 => Err(AtrError::Tc3),
        _ => Ok(()),
    }
}

/// Read and check the rest of an ATR whose TS, sampled in direct
/// convention, is `ts`
///
/// `next` reads one more character in the given convention.
pub fn read_atr<F>(ts: u8, next: F) -> Result<Atr, AtrError>
where
    F: FnMut(Convention) -> Result<u8, LinkError>,
{
    let convention = Convention::from_ts(ts).ok_or(AtrError::Ts(ts))?;
    let mut reader = Reader {
        next,
        convention,
        check: 0,
    };

    let t0 = reader.byte()?;
    if t0 & 0x20 == 0 {
        return Err(AtrError::T0);
    }

    let mut atr = Atr {
        convention,
        t0,
        interface: [None; 4 * GROUPS],
        historical: ArrayVec::new(),
        tck: None,
    };

    let mut protocol = 0;
    let mut needs_tck = false;
    let mut present = t0 >> 4;
    for group in 0..GROUPS {
        for kind in TA..=TD {
            if present & (1 << kind) == 0 {
                continue;
            }

            let value = reader.byte()?;
            check_interface(group, kind, value, protocol)?;
            atr.interface[group * 4 + kind] = Some(value);
        }

        match atr.interface[group * 4 + TD] {
            Some(td) => {
                if group == 0 {
                    protocol = td & 0x0F;
                }
                needs_tck |= td & 0x0F != 0;
                present = td >> 4;
            }
            None => break,
        }

        if group == 1 && protocol == 1 && present & (1 << TB) == 0 {
            return Err(AtrError::Tb3);
        }
    }

    for _ in 0..t0 & 0x0F {
        let byte = reader.byte()?;
        atr.historical.push(byte);
    }

    if needs_tck {
        atr.tck = Some(reader.byte()?);
        if reader.check != 0 {
            return Err(AtrError::Checksum);
        }
    }

    Ok(atr)
}

/// Send the T=0 answer to reset `3B 60 00 TC1` to the terminal
pub fn send_atr<I: Interface>(port: &mut Port<I>, tc1: u8) -> Result<(), LinkError> {
    let convention = Convention::Direct;

    port.send_byte_unchecked(convention.ts(), convention)?;
    port.wait(250)?;
    for &byte in &[0x60, 0x00, tc1] {
        port.send_byte_unchecked(byte, convention)?;
        port.wait(2)?;
    }

    Ok(())
}

fn reset_once<S, I>(slot: &mut S, port: &mut Port<I>, warm: bool) -> Result<Atr, ResetError>
where
    S: CardSlot,
    I: Interface,
{
    slot.activate(warm).map_err(|_| ResetError::Activation)?;
    port.wait(112).map_err(|_| ResetError::Activation)?;
    slot.set_reset(true);

    let ts = port
        .get_byte_quiet(Convention::Direct, ICC_RST_WAIT)
        .map_err(|_| ResetError::NoAnswer)?
        .byte;

    let atr = read_atr(ts, |convention| {
        port.get_byte_quiet(convention, MAX_WAIT_ICC).map(|r| r.byte)
    })?;

    Ok(atr)
}

/// Power the card and read its answer to reset
///
/// A failed cold reset is retried once as a warm reset; if that fails too the
/// card is deactivated.
pub fn reset_card<S, I>(slot: &mut S, port: &mut Port<I>) -> Result<Atr, ResetError>
where
    S: CardSlot,
    I: Interface,
{
    let result = match reset_once(slot, port, false) {
        Err(ResetError::Activation) => Err(ResetError::Activation),
        Err(e) => {
            log::debug!("cold reset failed: {:?}", e);
            reset_once(slot, port, true)
        }
        ok => ok,
    };

    if result.is_err() {
        slot.deactivate();
    }

    result
}

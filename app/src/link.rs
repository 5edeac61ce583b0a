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
//! Character level exchange on a half-duplex smart card line
//!
//! Every bit boundary is counted from the timer restarted at the start bit,
//! so the accuracy only depends on the ETU and on the polling granularity.
use scd::{
    etu::EtuTiming,
    frame::{self, Convention, Level, SAMPLED_BITS},
    hal::{Interface, Stalled},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// The clock timing the line is not running
    NoClock,
    /// No start bit within the allotted polls
    Timeout,
    /// The terminal asserted its reset while we waited
    ResetAsserted,
    /// The line went back high before the middle of the start bit
    FalseStart,
    /// The receiver signalled a parity error
    ParityRejected,
}

impl From<Stalled> for LinkError {
    fn from(_: Stalled) -> Self {
        Self::NoClock
    }
}

/// A received character and the result of its parity check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Received {
    pub byte: u8,
    pub parity_ok: bool,
}

/// One end of a line, bound to its ETU
pub struct Port<I> {
    iface: I,
    etu: EtuTiming,
}

impl<I: Interface> Port<I> {
    pub fn new(iface: I, etu: EtuTiming) -> Self {
        Self { iface, etu }
    }

    pub fn etu(&self) -> EtuTiming {
        self.etu
    }

    pub fn interface(&mut self) -> &mut I {
        &mut self.iface
    }

    pub fn clock_present(&mut self) -> bool {
        self.iface.clock_present()
    }

    fn at(&mut self, etus: u32, extra: u32) -> Result<(), LinkError> {
        self.iface
            .wait_until(self.etu.etus(etus) + extra)
            .map_err(Into::into)
    }

    /// Drive the 10 bits of `byte` and release the line
    fn frame_out(&mut self, byte: u8, convention: Convention) -> Result<(), LinkError> {
        if !self.iface.clock_present() {
            return Err(LinkError::NoClock);
        }

        let bits = frame::encode(byte, convention);
        self.iface.restart_timer();
        for (i, &level) in bits.iter().enumerate() {
            self.at(i as u32, 0)?;
            self.iface.drive(level);
        }

        self.at(bits.len() as u32, 0)?;
        self.iface.release();
        Ok(())
    }

    /// Send one character and check the receiver's error signal
    ///
    /// Returns after the 2 ETU guard time, or after the error signal on a
    /// rejection. Resending is up to the caller.
    pub fn send_byte(&mut self, byte: u8, convention: Convention) -> Result<(), LinkError> {
        self.frame_out(byte, convention)?;

        self.at(11, 0)?;
        if self.iface.sample().is_low() {
            self.at(13, 0)?;
            log::trace!("{:#04x} rejected", byte);
            return Err(LinkError::ParityRejected);
        }

        self.at(12, 0)
    }

    /// Send one character without looking for an error signal
    pub fn send_byte_unchecked(&mut self, byte: u8, convention: Convention) -> Result<(), LinkError> {
        self.frame_out(byte, convention)?;
        self.at(12, 0)
    }

    /// Poll for a start bit, forever when `max_wait` is 0
    fn await_start(&mut self, max_wait: u32) -> Result<(), LinkError> {
        let mut polls = 0u32;
        loop {
            if !self.iface.clock_present() {
                return Err(LinkError::NoClock);
            }
            if self.iface.reset_asserted() {
                return Err(LinkError::ResetAsserted);
            }
            if self.iface.sample().is_low() {
                return Ok(());
            }

            polls = polls.wrapping_add(1);
            if max_wait != 0 && polls >= max_wait {
                return Err(LinkError::Timeout);
            }
        }
    }

    fn receive(
        &mut self,
        convention: Convention,
        max_wait: u32,
        signal: bool,
    ) -> Result<Received, LinkError> {
        self.await_start(max_wait)?;
        self.iface.restart_timer();

        let half = self.etu.half();
        self.at(0, half)?;
        if self.iface.sample().is_high() {
            return Err(LinkError::FalseStart);
        }

        let mut bits = [Level::High; SAMPLED_BITS];
        for (i, bit) in bits.iter_mut().enumerate() {
            self.at(i as u32 + 1, half)?;
            *bit = self.iface.sample();
        }

        let (byte, parity_ok) = frame::decode(&bits, convention);
        if !parity_ok && signal {
            let from = self.etu.less_than_half();
            self.at(10, from)?;
            self.iface.drive(Level::Low);
            self.at(10, from + self.etu.extended())?;
            self.iface.release();
            log::trace!("parity error on {:#04x}, signalled", byte);
        }

        self.at(10, 0)?;
        Ok(Received { byte, parity_ok })
    }

    /// Receive one character, signalling a parity error to the sender
    pub fn get_byte(&mut self, convention: Convention, max_wait: u32) -> Result<Received, LinkError> {
        self.receive(convention, max_wait, true)
    }

    /// Receive one character without ever driving the line
    pub fn get_byte_quiet(
        &mut self,
        convention: Convention,
        max_wait: u32,
    ) -> Result<Received, LinkError> {
        self.receive(convention, max_wait, false)
    }

    /// Busy-wait `n` ETUs
    pub fn wait(&mut self, n: u32) -> Result<(), LinkError> {
        self.iface.restart_timer();
        self.at(n, 0)
    }
}

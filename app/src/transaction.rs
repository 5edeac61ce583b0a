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
//! Captured exchanges waiting to be written to the log
use arrayvec::{ArrayVec, CapacityError};
use zeroize::Zeroize;

use crate::constants::{
    COMMAND_DATA_MAX, COMMAND_HEADER_LEN, MAX_EXCHANGES, RESPONSE_DATA_MAX, STREAM_MAX,
};

/// Serialized form of a command or a response, as written to the log
pub type Stream = ArrayVec<u8, STREAM_MAX>;

/// Byte encoding of a captured message
///
/// `None` means the message can't be encoded, the log writer skips it.
pub trait Serialize {
    fn serialize(&self) -> Option<Stream>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApduError {
    TooLong { max: usize, got: usize },
    TooShort { min: usize, got: usize },
}

fn bounded<const N: usize>(data: &[u8]) -> Result<ArrayVec<u8, N>, ApduError> {
    let mut out = ArrayVec::new();
    out.try_extend_from_slice(data)
        .map_err(|_| ApduError::TooLong {
            max: N,
            got: data.len(),
        })?;

    Ok(out)
}

/// Command sent by the terminal: CLA INS P1 P2 P3 and the optional data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandApdu {
    header: [u8; COMMAND_HEADER_LEN],
    data: ArrayVec<u8, COMMAND_DATA_MAX>,
}

impl CommandApdu {
    pub fn new(header: [u8; COMMAND_HEADER_LEN], data: &[u8]) -> Result<Self, ApduError> {
        Ok(Self {
            header,
            data: bounded(data)?,
        })
    }

    /// Parse the header followed by the data
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ApduError> {
        if bytes.len() < COMMAND_HEADER_LEN {
            return Err(ApduError::TooShort {
                min: COMMAND_HEADER_LEN,
                got: bytes.len(),
            });
        }

        let (header, data) = bytes.split_at(COMMAND_HEADER_LEN);
        let mut array = [0; COMMAND_HEADER_LEN];
        array.copy_from_slice(header);

        Self::new(array, data)
    }

    pub fn header(&self) -> &[u8; COMMAND_HEADER_LEN] {
        &self.header
    }

    pub fn ins(&self) -> u8 {
        self.header[1]
    }

    /// Length byte of the header
    pub fn p3(&self) -> u8 {
        self.header[4]
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Serialize for CommandApdu {
    fn serialize(&self) -> Option<Stream> {
        let mut stream = Stream::new();
        stream.try_extend_from_slice(&self.header).ok()?;
        stream.try_extend_from_slice(&self.data).ok()?;

        Some(stream)
    }
}

impl Zeroize for CommandApdu {
    fn zeroize(&mut self) {
        self.header.zeroize();
        self.data.as_mut_slice().zeroize();
        self.data.clear();
    }
}

/// Response of the card: the data and the two status bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseApdu {
    status: [u8; 2],
    data: ArrayVec<u8, RESPONSE_DATA_MAX>,
}

impl ResponseApdu {
    pub fn new(data: &[u8], sw1: u8, sw2: u8) -> Result<Self, ApduError> {
        Ok(Self {
            status: [sw1, sw2],
            data: bounded(data)?,
        })
    }

    /// Parse the data followed by SW1 SW2, as sent on the line
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ApduError> {
        match bytes {
            [data @ .., sw1, sw2] => Self::new(data, *sw1, *sw2),
            _ => Err(ApduError::TooShort {
                min: 2,
                got: bytes.len(),
            }),
        }
    }

    pub fn sw1(&self) -> u8 {
        self.status[0]
    }

    pub fn sw2(&self) -> u8 {
        self.status[1]
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Serialize for ResponseApdu {
    fn serialize(&self) -> Option<Stream> {
        let mut stream = Stream::new();
        stream.try_extend_from_slice(&self.status).ok()?;
        stream.try_extend_from_slice(&self.data).ok()?;

        Some(stream)
    }
}

impl Zeroize for ResponseApdu {
    fn zeroize(&mut self) {
        self.status.zeroize();
        self.data.as_mut_slice().zeroize();
        self.data.clear();
    }
}

/// One captured exchange, wiped when dropped
#[derive(Debug)]
pub struct Crp<C: Zeroize = CommandApdu, R: Zeroize = ResponseApdu> {
    command: C,
    response: R,
}

impl<C: Zeroize, R: Zeroize> Crp<C, R> {
    pub fn new(command: C, response: R) -> Self {
        Self { command, response }
    }

    pub fn command(&self) -> &C {
        &self.command
    }

    pub fn response(&self) -> &R {
        &self.response
    }
}

impl<C: Zeroize, R: Zeroize> Drop for Crp<C, R> {
    fn drop(&mut self) {
        self.command.zeroize();
        self.response.zeroize();
    }
}

/// Exchanges captured since the last flush, in order
pub struct TransactionBuffer<C: Zeroize = CommandApdu, R: Zeroize = ResponseApdu> {
    entries: ArrayVec<Crp<C, R>, MAX_EXCHANGES>,
}

impl<C: Zeroize, R: Zeroize> TransactionBuffer<C, R> {
    pub const CAPACITY: usize = MAX_EXCHANGES;

    pub const fn new() -> Self {
        Self {
            entries: ArrayVec::new_const(),
        }
    }

    /// Add an exchange at the end, giving it back if the buffer is full
    pub fn append(&mut self, crp: Crp<C, R>) -> Result<(), CapacityError<Crp<C, R>>> {
        self.entries.try_push(crp)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Crp<C, R>> {
        self.entries.iter()
    }

    /// Hand every exchange over, oldest first
    pub fn drain(&mut self) -> arrayvec::Drain<'_, Crp<C, R>, MAX_EXCHANGES> {
        self.entries.drain(..)
    }

    pub fn clear(&mut self) {
        self.entries.clear()
    }
}

impl<C: Zeroize, R: Zeroize> Default for TransactionBuffer<C, R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crp(ins: u8) -> Crp {
        Crp::new(
            CommandApdu::new([0x00, ins, 0x00, 0x00, 0x00], &[]).unwrap(),
            ResponseApdu::new(&[ins], 0x90, 0x00).unwrap(),
        )
    }

    #[test]
    fn append_keeps_order_up_to_capacity() {
        let mut buffer = TransactionBuffer::<CommandApdu, ResponseApdu>::new();

        for ins in 0..MAX_EXCHANGES as u8 {
            buffer.append(crp(ins)).unwrap();
        }
        assert!(buffer.is_full());

        let rejected = buffer.append(crp(0xFF)).unwrap_err().element();
        assert_eq!(rejected.command().ins(), 0xFF);

        let order: std::vec::Vec<u8> = buffer.iter().map(|e| e.command().ins()).collect();
        assert_eq!(order, (0..MAX_EXCHANGES as u8).collect::<std::vec::Vec<_>>());
    }

    #[test]
    fn drain_empties_the_buffer() {
        let mut buffer = TransactionBuffer::<CommandApdu, ResponseApdu>::new();
        buffer.append(crp(0xA4)).unwrap();
        buffer.append(crp(0xC0)).unwrap();

        let drained: std::vec::Vec<u8> = buffer.drain().map(|e| e.response().data()[0]).collect();
        assert_eq!(drained, [0xA4, 0xC0]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn serialization() {
        let cmd = CommandApdu::from_bytes(&hex::decode("00a404000e315041592e5359532e4444463031").unwrap())
            .unwrap();
        assert_eq!(cmd.p3(), 0x0E);
        assert_eq!(cmd.data(), b"1PAY.SYS.DDF01");
        assert_eq!(
            hex::encode(cmd.serialize().unwrap()),
            "00a404000e315041592e5359532e4444463031"
        );

        let rsp = ResponseApdu::from_bytes(&[0xDE, 0xAD, 0x90, 0x00]).unwrap();
        assert_eq!((rsp.sw1(), rsp.sw2()), (0x90, 0x00));
        assert_eq!(rsp.serialize().unwrap().as_slice(), &[0x90, 0x00, 0xDE, 0xAD]);
    }

    #[test]
    fn oversized_data_is_refused() {
        assert_eq!(
            CommandApdu::new([0; 5], &[0; COMMAND_DATA_MAX + 1]),
            Err(ApduError::TooLong {
                max: COMMAND_DATA_MAX,
                got: COMMAND_DATA_MAX + 1
            })
        );
        assert_eq!(
            ResponseApdu::from_bytes(&[0x90]),
            Err(ApduError::TooShort { min: 2, got: 1 })
        );
    }

    #[test]
    fn zeroize_wipes_messages() {
        let mut cmd = CommandApdu::new([0x00, 0x20, 0x00, 0x80, 0x08], &[0x24; 8]).unwrap();
        cmd.zeroize();
        assert_eq!(cmd.header(), &[0; 5]);
        assert!(cmd.data().is_empty());
    }
}

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
//! Decoding of a raw dump of the log region
//!
//! Records carry no length, a body runs up to the next marker. The reader
//! resynchronizes on markers, so a session cut short by a power loss only
//! loses its own tail.
use arrayvec::ArrayVec;
use core::iter::Peekable;
use nom::{
    branch::alt, bytes::complete::tag, combinator::value, number::complete::be_u8, IResult,
};

use crate::constants::{
    APP_MARKER, CMD_MARKER, END_MARKER, MARKER_LEN, MAX_EXCHANGES, RSP_MARKER,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    App,
    Cmd,
    Rsp,
    End,
}

fn marker(input: &[u8]) -> IResult<&[u8], Marker> {
    alt((
        value(Marker::App, tag(&APP_MARKER[..])),
        value(Marker::Cmd, tag(&CMD_MARKER[..])),
        value(Marker::Rsp, tag(&RSP_MARKER[..])),
        value(Marker::End, tag(&END_MARKER[..])),
    ))(input)
}

/// Offset of the first marker accepted by `want`
fn find(input: &[u8], want: impl Fn(Marker) -> bool) -> Option<usize> {
    (0..input.len()).find(|&i| matches!(marker(&input[i..]), Ok((_, m)) if want(m)))
}

/// Offset of the marker ending a body
///
/// Body bytes equal to the marker value run into it, the marker is the
/// last `MARKER_LEN` bytes of the run.
fn body_end(input: &[u8]) -> Option<usize> {
    let at = find(input, |_| true)?;
    let run = input[at..].iter().take_while(|&&b| b == input[at]).count();

    Some(at + run - MARKER_LEN)
}

/// Split a record body from what follows it
fn body(input: &[u8]) -> (&[u8], &[u8]) {
    match body_end(input) {
        Some(at) => (&input[at..], &input[..at]),
        None => {
            //last record of the dump, drop the erased tail
            let end = input.iter().rposition(|&b| b != 0xFF).map_or(0, |i| i + 1);
            (&input[input.len()..], &input[..end])
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record<'a> {
    Application(u8),
    Command(&'a [u8]),
    Response(&'a [u8]),
    End,
}

/// Every record of a dump, in order
///
/// # Example
/// ```
/// # use scdlib::log_reader::{Record, Records};
/// let dump = [0xDD, 0xDD, 0xDD, 0xDD, 0xDD, 0x01, 0xBB, 0xBB, 0xBB, 0xBB, 0xBB, 0xFF];
/// let mut records = Records::new(&dump);
///
/// assert_eq!(records.next(), Some(Record::Application(1)));
/// assert_eq!(records.next(), Some(Record::End));
/// assert_eq!(records.next(), None);
/// ```
pub struct Records<'a> {
    input: &'a [u8],
    in_session: bool,
}

impl<'a> Records<'a> {
    pub fn new(dump: &'a [u8]) -> Self {
        Self {
            input: dump,
            in_session: false,
        }
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Record<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        //outside a session only an application marker means anything
        let skip = if self.in_session {
            find(self.input, |_| true)?
        } else {
            find(self.input, |m| m == Marker::App)?
        };
        self.input = &self.input[skip..];

        let (rest, kind) = marker(self.input).ok()?;
        match kind {
            Marker::App => {
                let (rest, app) = be_u8::<_, ()>(rest).ok()?;
                self.input = rest;
                self.in_session = true;
                Some(Record::Application(app))
            }
            Marker::End => {
                self.input = rest;
                self.in_session = false;
                Some(Record::End)
            }
            Marker::Cmd => {
                let (rest, body) = body(rest);
                self.input = rest;
                Some(Record::Command(body))
            }
            Marker::Rsp => {
                let (rest, body) = body(rest);
                self.input = rest;
                Some(Record::Response(body))
            }
        }
    }
}

/// One command/response pair, either half may be missing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Exchange<'a> {
    pub command: Option<&'a [u8]>,
    pub response: Option<&'a [u8]>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session<'a> {
    pub app: u8,
    pub exchanges: ArrayVec<Exchange<'a>, MAX_EXCHANGES>,
    /// Whether the end marker was found
    pub complete: bool,
}

impl<'a> Session<'a> {
    fn push(&mut self, exchange: Exchange<'a>) {
        //a session never holds more, anything beyond is garbage
        let _ = self.exchanges.try_push(exchange);
    }

    fn add_command(&mut self, command: &'a [u8]) {
        self.push(Exchange {
            command: Some(command),
            response: None,
        })
    }

    fn add_response(&mut self, response: &'a [u8]) {
        match self.exchanges.last_mut() {
            Some(last) if last.response.is_none() => last.response = Some(response),
            _ => self.push(Exchange {
                command: None,
                response: Some(response),
            }),
        }
    }
}

/// Sessions of a dump, grouped from [`Records`]
pub struct Sessions<'a> {
    records: Peekable<Records<'a>>,
}

impl<'a> Iterator for Sessions<'a> {
    type Item = Session<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let app = loop {
            match self.records.next()? {
                Record::Application(app) => break app,
                _ => continue,
            }
        };

        let mut session = Session {
            app,
            exchanges: ArrayVec::new(),
            complete: false,
        };

        while let Some(&record) = self.records.peek() {
            match record {
                Record::Application(_) => break,
                Record::Command(cmd) => session.add_command(cmd),
                Record::Response(rsp) => session.add_response(rsp),
                Record::End => session.complete = true,
            }
            self.records.next();

            if session.complete {
                break;
            }
        }

        Some(session)
    }
}

pub fn sessions(dump: &[u8]) -> Sessions<'_> {
    Sessions {
        records: Records::new(dump).peekable(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    fn dump(s: &str) -> Vec<u8> {
        hex::decode(s).unwrap()
    }

    #[test]
    fn reads_a_session() {
        let data = dump(concat!(
            "dddddddddd02",
            "cccccccccc00a4040002aabb",
            "aaaaaaaaaa6104",
            "bbbbbbbbbb",
            "ffffff"
        ));

        let records: Vec<_> = Records::new(&data).collect();
        assert_eq!(
            records,
            [
                Record::Application(2),
                Record::Command(&[0x00, 0xA4, 0x04, 0x00, 0x02, 0xAA, 0xBB]),
                Record::Response(&[0x61, 0x04]),
                Record::End,
            ]
        );
    }

    #[test]
    fn skips_noise_between_sessions() {
        let data = dump(concat!(
            "0102ffff",
            "dddddddddd01bbbbbbbbbb",
            "ffffffff4242",
            "dddddddddd03cccccccccc00c0000004bbbbbbbbbb"
        ));

        let all: Vec<_> = sessions(&data).collect();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].app, 1);
        assert!(all[0].exchanges.is_empty());
        assert_eq!(all[1].app, 3);
        assert_eq!(all[1].exchanges[0].command, Some(&[0x00, 0xC0, 0x00, 0x00, 0x04][..]));
        assert_eq!(all[1].exchanges[0].response, None);
    }

    #[test]
    fn unterminated_session() {
        let data = dump("dddddddddd05cccccccccc80ca9f17ffffffff");

        let all: Vec<_> = sessions(&data).collect();
        assert_eq!(all.len(), 1);
        assert!(!all[0].complete);
        assert_eq!(all[0].exchanges[0].command, Some(&[0x80, 0xCA, 0x9F, 0x17][..]));
    }

    #[test]
    fn response_without_command() {
        let data = dump("dddddddddd01aaaaaaaaaa9000aaaaaaaaaa6a82bbbbbbbbbb");

        let session = sessions(&data).next().unwrap();
        assert!(session.complete);
        assert_eq!(session.exchanges.len(), 2);
        assert_eq!(session.exchanges[1].command, None);
        assert_eq!(session.exchanges[1].response, Some(&[0x6A, 0x82][..]));
    }

    #[test]
    fn body_may_end_like_the_next_marker() {
        let data = dump(concat!(
            "dddddddddd01",
            "cccccccccc0020008002aaaa",
            "aaaaaaaaaa9000cccc",
            "cccccccccc00c0000002",
            "aaaaaaaaaa9000bbbb",
            "bbbbbbbbbbffff"
        ));

        let records: Vec<_> = Records::new(&data).collect();
        assert_eq!(
            records,
            [
                Record::Application(1),
                Record::Command(&[0x00, 0x20, 0x00, 0x80, 0x02, 0xAA, 0xAA]),
                Record::Response(&[0x90, 0x00, 0xCC, 0xCC]),
                Record::Command(&[0x00, 0xC0, 0x00, 0x00, 0x02]),
                Record::Response(&[0x90, 0x00, 0xBB, 0xBB]),
                Record::End,
            ]
        );
    }

    #[test]
    fn blank_dump() {
        assert_eq!(Records::new(&[0xFF; 64]).next(), None);
        assert_eq!(sessions(&[]).count(), 0);
    }
}

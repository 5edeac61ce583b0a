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
#![allow(unused_imports, dead_code)]

pub use scdlib::{
    boot::{self, BootOutcome, RestartReason},
    constants::*,
    dispatcher::{dispatch, AppId, Applications},
    log_reader, log_writer, state,
    transaction::{CommandApdu, Crp, ResponseApdu},
};

pub use scd::{
    hal::{Buttons, WatchdogTimeout},
    Board,
};

pub const SCROLL: Buttons = Buttons::C;
pub const SELECT: Buttons = Buttons::D;

pub fn exchange(command: &str, response: &str) -> Crp {
    Crp::new(
        CommandApdu::from_bytes(&hex::decode(command).expect("invalid command hex")).unwrap(),
        ResponseApdu::from_bytes(&hex::decode(response).expect("invalid response hex")).unwrap(),
    )
}

/// Button reads picking the entry at `index` of the menu, boot key included
pub fn menu_choice(index: usize) -> Vec<Buttons> {
    let mut reads = vec![boot::BOOT_KEY, SCROLL, SCROLL, SCROLL];
    reads.extend(std::iter::repeat(SCROLL).take(index));
    reads.push(SELECT);
    reads
}

/// Power cycle: same store, every other peripheral fresh
pub fn power_cycle(board: Board) -> Board {
    let mut next = Board::new();
    next.nvm = board.nvm;
    next
}

/// Remembers which entry points ran
#[derive(Default)]
pub struct Recorder(pub Vec<AppId>);

impl Applications for Recorder {
    fn virtual_serial(&mut self, _: &mut Board) {
        self.0.push(AppId::VirtualSerial);
    }

    fn forward_and_log(&mut self, _: &mut Board) {
        self.0.push(AppId::ForwardAndLog);
    }

    fn filter_amount(&mut self, _: &mut Board) {
        self.0.push(AppId::FilterAmount);
    }

    fn terminal(&mut self, _: &mut Board) {
        self.0.push(AppId::Terminal);
    }
}

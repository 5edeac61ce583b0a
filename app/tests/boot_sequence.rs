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
mod prelude;
use prelude::*;

use serial_test::serial;

#[test]
#[serial(state)]
fn selection_survives_the_restart() {
    let mut board = Board::new();
    board.panel.press(&menu_choice(2));

    assert_eq!(
        boot::boot(&mut board),
        Ok(BootOutcome::Restart(RestartReason::Selected(
            AppId::FilterAmount
        )))
    );

    let mut board = power_cycle(board);
    board.panel.press(&[Buttons::NONE]);

    let app = match boot::boot(&mut board) {
        Ok(BootOutcome::Dispatch(app)) => app,
        other => panic!("unexpected boot outcome {:?}", other),
    };

    let mut apps = Recorder::default();
    dispatch(&mut apps, &mut board, app);
    assert_eq!(apps.0, [AppId::FilterAmount]);
    assert_eq!(state::selected_application(), AppId::FilterAmount.id());
}

#[test]
#[serial(state)]
fn erase_brings_back_the_default() {
    let mut board = Board::new();
    board.panel.press(&menu_choice(0));
    boot::boot(&mut board).unwrap();

    let mut board = power_cycle(board);
    board.panel.press(&menu_choice(4));
    assert_eq!(
        boot::boot(&mut board),
        Ok(BootOutcome::Restart(RestartReason::Erased))
    );
    assert_eq!(board.nvm.read_byte(EEPROM_TLOG_POINTER_LO), Ok(0x80));

    let mut board = power_cycle(board);
    board.panel.press(&[Buttons::NONE]);
    assert_eq!(
        boot::boot(&mut board),
        Ok(BootOutcome::Dispatch(AppId::DEFAULT))
    );
    assert_eq!(
        board.nvm.read_byte(EEPROM_APPLICATION),
        Ok(AppId::DEFAULT.id())
    );
}

#[test]
#[serial(state)]
fn unset_selection_falls_back_once() {
    let mut board = Board::new();
    board.nvm.write(EEPROM_APPLICATION, &[0]).unwrap();
    board.panel.press(&[Buttons::NONE]);

    let before = board.nvm.eeprom().writes();
    assert_eq!(
        boot::boot(&mut board),
        Ok(BootOutcome::Dispatch(AppId::DEFAULT))
    );
    assert_eq!(board.nvm.eeprom().writes(), before + 1);
    assert_eq!(
        board.nvm.read_byte(EEPROM_APPLICATION),
        Ok(AppId::DEFAULT.id())
    );

    let mut board = power_cycle(board);
    board.panel.press(&[Buttons::NONE]);

    let before = board.nvm.eeprom().writes();
    assert_eq!(
        boot::boot(&mut board),
        Ok(BootOutcome::Dispatch(AppId::DEFAULT))
    );
    assert_eq!(board.nvm.eeprom().writes(), before);
}

#[test]
#[serial(state)]
fn card_inserted_at_power_up_lights_the_led() {
    let mut board = Board::new();
    board.card.insert();
    board.panel.press(&[Buttons::NONE]);

    boot::boot(&mut board).unwrap();

    assert!(board.panel.led(PRESENCE_LED));
    assert!(board.panel.led(POWER_LED));
    assert!(board.card.interrupt_enabled());
}

#[test]
#[should_panic(expected = "watchdog restart")]
fn restart_goes_through_the_watchdog() {
    let mut board = Board::new();
    boot::restart(&mut board);
}

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
//! Power-up sequence and application selection
//!
//! The device boots through [`BootState`] until it either knows which
//! application to run or has to restart to apply a new selection.

use scd::{
    hal::{Buttons, Display, Keypad, Led, Leds, Panel, Watchdog},
    Board, NvmError,
};

use crate::{
    constants::{MENU_DELAY_MS, POWER_LED, RESTART_TIMEOUT, STR_AVAILABLE, STR_SCROLL, STR_SELECT},
    dispatcher::{dispatch, AppId, Applications, MENU},
    state,
    storage::Storage,
};

/// Held at power-up to enter the menu
pub const BOOT_KEY: Buttons = Buttons::B;
const SCROLL_KEY: Buttons = Buttons::C;
const SELECT_KEY: Buttons = Buttons::D;

const FALLBACK_LEDS: (Led, Led) = (Led::L1, Led::L2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    /// The persisted state was reset from the menu
    Erased,
    /// A new application was persisted
    Selected(AppId),
    /// The menu could not be shown, nothing was chosen
    NoSelection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOutcome {
    Restart(RestartReason),
    Dispatch(AppId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootState {
    ColdStart,
    InteractiveSelect { display: bool },
    PersistedSelect,
    Restarting(RestartReason),
    Dispatched(AppId),
}

impl BootState {
    pub fn outcome(self) -> Option<BootOutcome> {
        match self {
            Self::Restarting(reason) => Some(BootOutcome::Restart(reason)),
            Self::Dispatched(app) => Some(BootOutcome::Dispatch(app)),
            _ => None,
        }
    }

    /// Advance by one state, final states stay where they are
    pub fn step(self, board: &mut Board) -> Result<Self, NvmError> {
        let next = match self {
            Self::ColdStart => {
                let display = init(board)?;

                if board.panel.buttons().contains(BOOT_KEY) {
                    Self::InteractiveSelect { display }
                } else {
                    Self::PersistedSelect
                }
            }
            Self::InteractiveSelect { display } => {
                match select_application(&mut board.panel, display) {
                    Some(AppId::EraseEeprom) => {
                        board.panel.set_led(Led::L2, true);
                        Storage::new(&mut board.nvm).reset_defaults()?;
                        board.panel.set_led(Led::L2, false);
                        state::set_selected_application(0);

                        Self::Restarting(RestartReason::Erased)
                    }
                    Some(app) => {
                        persist_selection(board, app.id())?;
                        Self::Restarting(RestartReason::Selected(app))
                    }
                    None => {
                        persist_selection(board, 0)?;
                        Self::Restarting(RestartReason::NoSelection)
                    }
                }
            }
            Self::PersistedSelect => {
                let id = critical_section::with(|_| {
                    Storage::new(&mut board.nvm).selected_application()
                })?;

                let app = match AppId::from_persisted(id) {
                    Some(app) => app,
                    None => {
                        log::warn!("no application for id {:#04x}", id);
                        persist_selection(board, AppId::DEFAULT.id())?;
                        AppId::DEFAULT
                    }
                };
                state::set_selected_application(app.id());

                Self::Dispatched(app)
            }
            done => done,
        };

        log::debug!("{:?} -> {:?}", self, next);
        Ok(next)
    }
}

fn persist_selection(board: &mut Board, id: u8) -> Result<(), NvmError> {
    critical_section::with(|_| {
        let mut storage = Storage::new(&mut board.nvm);
        storage.set_selected_application(id)?;
        storage.sync();
        Ok::<_, NvmError>(())
    })?;

    state::set_selected_application(id);
    Ok(())
}

/// Bring the board up and load the persisted state
///
/// Returns whether a display is connected
pub fn init(board: &mut Board) -> Result<bool, NvmError> {
    board.system.init();
    board.watchdog.disable();
    board.panel.set_led(POWER_LED, true);

    {
        let storage = Storage::new(&mut board.nvm);
        state::set_warm_marker(storage.warm_marker()?);
        state::set_transaction_counter(storage.counter()?);
        state::set_selected_application(storage.selected_application()?);
    }

    let display = board.panel.available();
    if display {
        board.panel.power(false);
    }

    board.system.enable_interrupts();

    #[cfg(feature = "presence-interrupt")]
    crate::presence::start(&mut board.card, &mut board.panel);

    Ok(display)
}

fn wait_for<K: Keypad>(keypad: &mut K, key: Buttons) {
    while !keypad.buttons().contains(key) {}
}

/// Walk the user through the menu
///
/// Returns `None` without a display, otherwise loops over the prompts and
/// the entries until one is selected.
pub fn select_application<P: Panel>(panel: &mut P, display: bool) -> Option<AppId> {
    if !display {
        return None;
    }

    panel.power(true);
    loop {
        for prompt in [STR_SCROLL, STR_SELECT, STR_AVAILABLE] {
            panel.write_line(prompt);
            wait_for(panel, SCROLL_KEY);
            panel.delay_ms(MENU_DELAY_MS);
        }

        for &app in MENU {
            panel.write_line(app.name());

            loop {
                let held = panel.buttons();
                if held.contains(SELECT_KEY) {
                    return Some(app);
                }
                if held.contains(SCROLL_KEY) {
                    break;
                }
            }
            panel.delay_ms(MENU_DELAY_MS);
        }
    }
}

/// Run the boot states from a cold start
pub fn boot(board: &mut Board) -> Result<BootOutcome, NvmError> {
    let mut state = BootState::ColdStart;

    loop {
        state = state.step(board)?;
        if let Some(outcome) = state.outcome() {
            return Ok(outcome);
        }
    }
}

/// Let pending writes land and restart under the watchdog
pub fn restart(board: &mut Board) -> ! {
    board.nvm.sync();
    board.watchdog.arm(RESTART_TIMEOUT);
    board.watchdog.restart()
}

/// Blink forever, for when an application returned
pub fn fallback_loop<L: Leds + scd::hal::Delay>(leds: &mut L) -> ! {
    let (a, b) = FALLBACK_LEDS;
    let mut on = false;

    loop {
        on = !on;
        leds.set_led(a, on);
        leds.set_led(b, !on);
        leds.delay_ms(crate::constants::FALLBACK_BLINK_MS);
    }
}

/// Boot and hand the board to the selected application
pub fn run<A: Applications>(board: &mut Board, apps: &mut A) -> ! {
    match boot(board) {
        Ok(BootOutcome::Dispatch(app)) => {
            dispatch(apps, board, app);
            fallback_loop(&mut board.panel)
        }
        Ok(BootOutcome::Restart(reason)) => {
            log::info!("restarting: {:?}", reason);
            restart(board)
        }
        Err(e) => {
            log::error!("boot failed: {:?}", e);
            restart(board)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{EEPROM_APPLICATION, EEPROM_COUNTER, EEPROM_WARM_RESET};
    use scd::hal::WatchdogTimeout;
    use serial_test::serial;

    const C: Buttons = Buttons::C;
    const D: Buttons = Buttons::D;

    fn persisted(board: &Board) -> u8 {
        board.nvm.read_byte(EEPROM_APPLICATION).unwrap()
    }

    #[test]
    #[serial(state)]
    fn init_loads_the_persisted_state() {
        let mut board = Board::new();
        board.nvm.write(EEPROM_WARM_RESET, &[0xAA]).unwrap();
        board.nvm.write(EEPROM_COUNTER, &[7]).unwrap();

        assert_eq!(init(&mut board), Ok(true));
        assert_eq!(state::warm_marker(), 0xAA);
        assert_eq!(state::transaction_counter(), 7);
        assert!(board.system.interrupts_enabled());
        assert!(board.panel.led(POWER_LED));
        assert!(!board.panel.powered());
        assert_eq!(board.watchdog.armed(), None);
    }

    #[test]
    fn menu_scrolls_then_selects() {
        let mut board = Board::new();
        board.panel.press(&[C, C, C, Buttons::NONE, C, C, C, D]);

        assert_eq!(
            select_application(&mut board.panel, true),
            Some(AppId::Terminal)
        );
        assert_eq!(board.panel.remaining_presses(), 0);
        assert_eq!(
            board.panel.lines(),
            [
                STR_SCROLL,
                STR_SELECT,
                STR_AVAILABLE,
                "Virtual Serial",
                "Forward and Log",
                "Filter  amount",
                "Terminal"
            ]
        );
        assert_eq!(board.panel.waited_ms(), 6 * MENU_DELAY_MS as u32);
    }

    #[test]
    fn menu_wraps_around_through_the_prompts() {
        let mut board = Board::new();
        board.panel.press(&[C, C, C]);
        board.panel.press(&[C; MENU.len()]);
        board.panel.press(&[C, C, C, D]);

        assert_eq!(
            select_application(&mut board.panel, true),
            Some(AppId::VirtualSerial)
        );

        let lines = board.panel.lines();
        assert_eq!(lines.len(), 3 + MENU.len() + 3 + 1);
        assert_eq!(
            lines[3 + MENU.len()..],
            [STR_SCROLL, STR_SELECT, STR_AVAILABLE, "Virtual Serial"]
        );
    }

    #[test]
    fn no_display_no_menu() {
        let mut board = Board::new();

        assert_eq!(select_application(&mut board.panel, false), None);
        assert!(board.panel.lines().is_empty());
    }

    #[test]
    #[serial(state)]
    fn persisted_application_is_dispatched() {
        let mut board = Board::new();
        board.nvm.write(EEPROM_APPLICATION, &[AppId::ForwardAndLog.id()]).unwrap();
        board.panel.press(&[Buttons::NONE]);

        assert_eq!(
            boot(&mut board),
            Ok(BootOutcome::Dispatch(AppId::ForwardAndLog))
        );
        assert_eq!(state::selected_application(), AppId::ForwardAndLog.id());
    }

    #[test]
    #[serial(state)]
    fn unknown_id_falls_back_to_the_default() {
        let mut board = Board::new();
        board.panel.press(&[Buttons::NONE]);

        assert_eq!(boot(&mut board), Ok(BootOutcome::Dispatch(AppId::DEFAULT)));
        assert_eq!(persisted(&board), AppId::DEFAULT.id());
    }

    #[test]
    #[serial(state)]
    fn selection_is_persisted_before_restarting() {
        let mut board = Board::new();
        board.panel.press(&[BOOT_KEY, C, C, C, C, D]);

        assert_eq!(
            boot(&mut board),
            Ok(BootOutcome::Restart(RestartReason::Selected(
                AppId::ForwardAndLog
            )))
        );
        assert_eq!(persisted(&board), AppId::ForwardAndLog.id());
    }

    #[test]
    #[serial(state)]
    fn erase_resets_the_store() {
        let mut board = Board::new();
        board.nvm.write(EEPROM_COUNTER, &[9]).unwrap();
        board.nvm.write(0x200, &[0x12; 4]).unwrap();
        board.panel.press(&[BOOT_KEY, C, C, C, C, C, C, C, D]);

        assert_eq!(
            boot(&mut board),
            Ok(BootOutcome::Restart(RestartReason::Erased))
        );
        assert_eq!(board.nvm.read_byte(EEPROM_COUNTER), Ok(0));
        assert_eq!(board.nvm.read_byte(0x200), Ok(0xFF));
        assert_eq!(persisted(&board), 0);
        assert!(!board.panel.led(Led::L2));
    }

    #[test]
    #[serial(state)]
    fn boot_key_without_display() {
        let mut board = Board::new();
        board.panel.disconnect();
        board.nvm.write(EEPROM_APPLICATION, &[AppId::Terminal.id()]).unwrap();
        board.panel.press(&[BOOT_KEY]);

        assert_eq!(
            boot(&mut board),
            Ok(BootOutcome::Restart(RestartReason::NoSelection))
        );
        assert_eq!(persisted(&board), 0);
    }

    #[test]
    fn final_states_do_not_move() {
        let mut board = Board::new();
        let done = BootState::Dispatched(AppId::Terminal);

        assert_eq!(done.step(&mut board), Ok(done));
        assert_eq!(BootState::ColdStart.outcome(), None);
    }

    #[test]
    #[should_panic(expected = "watchdog restart")]
    fn restart_arms_the_shortest_timeout() {
        let mut board = Board::new();
        assert_eq!(RESTART_TIMEOUT, WatchdogTimeout::Ms15);

        restart(&mut board);
    }
}

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
use scd_common::{
    etu::{IccClock, CPU_HZ},
    hal::{self, Buttons, Led, NotInserted},
};

use crate::{
    line::terminal_clock_present,
    regs::{self, *},
    ICC_CLOCK,
};

/// Reset line from the terminal, PD0 on INT0
pub struct ResetLine;

impl ResetLine {
    pub const fn new() -> Self {
        Self
    }
}

impl hal::TerminalReset for ResetLine {
    fn clock_present(&mut self) -> bool {
        terminal_clock_present()
    }

    fn enable_interrupt(&mut self) {
        regs::clear(EIMSK, INT0);
        regs::set(EICRA, ISC01);
        regs::clear(EICRA, ISC00);
        regs::set(EIFR, INT0);
        regs::set(EIMSK, INT0);
    }

    fn disable_interrupt(&mut self) {
        regs::clear(EIMSK, INT0);
    }
}

/// Card contacts, with the detect switch on INT1
pub struct CardSlot;

impl CardSlot {
    pub const fn new() -> Self {
        Self
    }

    fn start_clock() {
        regs::write(OCR0A, ICC_CLOCK.compare_value(CPU_HZ));
        regs::write(TCNT0, 0);
        regs::write(TCCR0A, 0x42); // toggle OC0A on compare match, CTC
        regs::write(TCCR0B, 0x01);

        regs::write(TCCR1A, 0);
        regs::write(
            TCCR1B,
            match ICC_CLOCK {
                IccClock::Mhz4 => 0x01,
                _ => 0x02,
            },
        );
    }
}

impl hal::CardSlot for CardSlot {
    fn inserted(&mut self) -> bool {
        regs::is_set(PIND, ICC_SWITCH)
    }

    fn powered(&mut self) -> bool {
        regs::is_set(DDRD, ICC_VCC) && !regs::is_set(PORTD, ICC_VCC)
    }

    fn activate(&mut self, warm: bool) -> Result<(), NotInserted> {
        if !warm {
            regs::clear(PORTB, ICC_IO | ICC_CLK);
            regs::set(DDRB, ICC_IO | ICC_CLK);
        }
        regs::clear(PORTD, ICC_RST);
        regs::set(DDRD, ICC_RST);

        if !warm {
            regs::delay_us(50);
            if !self.inserted() {
                self.deactivate();
                return Err(NotInserted);
            }
            regs::clear(PORTD, ICC_VCC);
            regs::set(DDRD, ICC_VCC);
            regs::delay_us(50);
        }

        //I/O in reception with pull-up
        regs::clear(DDRB, ICC_IO);
        regs::set(PORTB, ICC_IO);

        if !warm {
            Self::start_clock();
        }

        Ok(())
    }

    fn set_reset(&mut self, high: bool) {
        if high {
            regs::set(PORTD, ICC_RST);
        } else {
            regs::clear(PORTD, ICC_RST);
        }
    }

    fn deactivate(&mut self) {
        regs::clear(PORTD, ICC_RST);
        regs::set(DDRD, ICC_RST);

        regs::write(TCCR0A, 0);
        regs::write(TCCR0B, 0);
        regs::write(TCCR1A, 0);
        regs::write(TCCR1B, 0);

        regs::clear(PORTB, ICC_CLK | ICC_IO);
        regs::set(DDRB, ICC_CLK | ICC_IO);

        regs::set(PORTD, ICC_VCC);
        regs::set(DDRD, ICC_VCC);
    }

    fn enable_presence_interrupt(&mut self) {
        regs::set(EICRA, ISC10);
        regs::clear(EICRA, ISC11);
        regs::set(EIMSK, INT1);
    }

    fn disable_presence_interrupt(&mut self) {
        regs::clear(EIMSK, INT1);
    }
}

/// LCD driver linked from the C side
mod lcd {
    extern "C" {
        pub fn CheckLCD() -> u8;
        pub fn InitLCD();
        pub fn LCDOff();
        pub fn WriteStringLCD(text: *const u8, len: u8);
    }
}

/// LCD, buttons on PF3..PF0 (A..D, active low) and LEDs on PE7..PE4
pub struct Panel;

impl Panel {
    pub const fn new() -> Self {
        Self
    }
}

impl hal::Display for Panel {
    fn available(&mut self) -> bool {
        unsafe { lcd::CheckLCD() == 0 }
    }

    fn power(&mut self, on: bool) {
        if on {
            unsafe { lcd::InitLCD() }
        } else {
            unsafe { lcd::LCDOff() }
        }
    }

    fn write_line(&mut self, text: &str) {
        let bytes = text.as_bytes();
        let len = bytes.len().min(u8::MAX as usize);
        unsafe { lcd::WriteStringLCD(bytes.as_ptr(), len as u8) }
    }
}

impl hal::Keypad for Panel {
    fn buttons(&mut self) -> Buttons {
        let held = !regs::read(PINF);

        [
            (0x08, Buttons::A),
            (0x04, Buttons::B),
            (0x02, Buttons::C),
            (0x01, Buttons::D),
        ]
        .iter()
        .filter(|(pin, _)| held & pin != 0)
        .fold(Buttons::NONE, |acc, &(_, b)| acc | b)
    }
}

impl hal::Leds for Panel {
    fn set_led(&mut self, led: Led, on: bool) {
        let pin = match led {
            Led::L1 => 1 << 7,
            Led::L2 => 1 << 6,
            Led::L3 => 1 << 5,
            Led::L4 => 1 << 4,
        };

        regs::set(DDRE, pin);
        if on {
            regs::set(PORTE, pin);
        } else {
            regs::clear(PORTE, pin);
        }
    }
}

impl hal::Delay for Panel {
    fn delay_ms(&mut self, ms: u16) {
        for _ in 0..ms {
            regs::delay_us(1000);
        }
    }
}

/// Global interrupt flag, ports and the terminal clock counter
pub struct System;

impl System {
    pub const fn new() -> Self {
        Self
    }

    /// Configure ports and timers, interrupts end up masked
    pub fn init(&mut self) {
        regs::clear(SREG, SREG_I);
        regs::write(EICRA, 0);
        regs::write(EICRB, 0);
        regs::write(EIFR, 0xFF);
        regs::write(EIMSK, 0);

        regs::write(DDRB, 0);
        regs::write(DDRC, 0);
        regs::write(PORTC, TERMINAL_IO | TERMINAL_CLK);
        regs::write(DDRD, ICC_VCC);
        regs::write(PORTD, ICC_VCC | ICC_SWITCH | TERMINAL_RST);
        regs::clear(DDRF, 0x0F);
        regs::set(PORTF, 0x0F);

        //no prescaler on the core clock, timed sequence
        regs::write(CLKPR, CLKPCE);
        regs::write(CLKPR, 0);

        //Timer3 counts the terminal clock, normal mode
        regs::write(TCCR3A, 0);
        regs::write(TCCR3B, 0x07);
    }

    pub fn enable_interrupts(&mut self) {
        regs::set(SREG, SREG_I);
    }
}

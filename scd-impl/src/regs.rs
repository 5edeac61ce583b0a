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
//! Memory mapped I/O registers of the AT90USB1287, data space addresses
#![allow(dead_code)]

use core::ptr::{read_volatile, write_volatile};

pub const SREG: usize = 0x5F;
pub const SREG_I: u8 = 1 << 7;

pub const MCUSR: usize = 0x54;
pub const WDRF: u8 = 1 << 3;

pub const WDTCSR: usize = 0x60;
pub const WDCE: u8 = 1 << 4;
pub const WDE: u8 = 1 << 3;

pub const EECR: usize = 0x3F;
pub const EEDR: usize = 0x40;
pub const EEARL: usize = 0x41;
pub const EEARH: usize = 0x42;
pub const EERE: u8 = 1 << 0;
pub const EEPE: u8 = 1 << 1;
pub const EEMPE: u8 = 1 << 2;

pub const PINB: usize = 0x23;
pub const DDRB: usize = 0x24;
pub const PORTB: usize = 0x25;
pub const PINC: usize = 0x26;
pub const DDRC: usize = 0x27;
pub const PORTC: usize = 0x28;
pub const PIND: usize = 0x29;
pub const DDRD: usize = 0x2A;
pub const PORTD: usize = 0x2B;
pub const PINE: usize = 0x2C;
pub const DDRE: usize = 0x2D;
pub const PORTE: usize = 0x2E;
pub const PINF: usize = 0x2F;
pub const DDRF: usize = 0x30;
pub const PORTF: usize = 0x31;

pub const EIFR: usize = 0x3C;
pub const EIMSK: usize = 0x3D;
pub const EICRA: usize = 0x69;
pub const EICRB: usize = 0x6A;
pub const INT0: u8 = 1 << 0;
pub const INT1: u8 = 1 << 1;
pub const ISC00: u8 = 1 << 0;
pub const ISC01: u8 = 1 << 1;
pub const ISC10: u8 = 1 << 2;
pub const ISC11: u8 = 1 << 3;

pub const TCCR0A: usize = 0x44;
pub const TCCR0B: usize = 0x45;
pub const TCNT0: usize = 0x46;
pub const OCR0A: usize = 0x47;

pub const TCCR1A: usize = 0x80;
pub const TCCR1B: usize = 0x81;
pub const TCNT1L: usize = 0x84;

pub const TCCR3A: usize = 0x90;
pub const TCCR3B: usize = 0x91;
pub const TCNT3L: usize = 0x94;

pub const CLKPR: usize = 0x61;
pub const CLKPCE: u8 = 1 << 7;

pub const UCSR1A: usize = 0xC8;
pub const UCSR1B: usize = 0xC9;
pub const UCSR1C: usize = 0xCA;
pub const UBRR1L: usize = 0xCC;
pub const UBRR1H: usize = 0xCD;
pub const UDR1: usize = 0xCE;
pub const UDRE1: u8 = 1 << 5;
pub const TXEN1: u8 = 1 << 3;

// terminal contacts
pub const TERMINAL_IO: u8 = 1 << 4; // PC4
pub const TERMINAL_CLK: u8 = 1 << 3; // PC3
pub const TERMINAL_RST: u8 = 1 << 0; // PD0

// card contacts
pub const ICC_IO: u8 = 1 << 6; // PB6
pub const ICC_CLK: u8 = 1 << 7; // PB7
pub const ICC_RST: u8 = 1 << 4; // PD4
pub const ICC_VCC: u8 = 1 << 7; // PD7, active low
pub const ICC_SWITCH: u8 = 1 << 1; // PD1

#[inline(always)]
pub fn read(addr: usize) -> u8 {
    //safety: only called with the register addresses above
    unsafe { read_volatile(addr as *const u8) }
}

#[inline(always)]
pub fn write(addr: usize, value: u8) {
    //safety: only called with the register addresses above
    unsafe { write_volatile(addr as *mut u8, value) }
}

#[inline(always)]
pub fn set(addr: usize, mask: u8) {
    write(addr, read(addr) | mask);
}

#[inline(always)]
pub fn clear(addr: usize, mask: u8) {
    write(addr, read(addr) & !mask);
}

#[inline(always)]
pub fn is_set(addr: usize, mask: u8) -> bool {
    read(addr) & mask != 0
}

/// Read a 16 bit timer register, low byte first to latch the high one
pub fn read16(low: usize) -> u16 {
    critical_section::with(|_| {
        let lo = read(low);
        let hi = read(low + 1);
        u16::from_le_bytes([lo, hi])
    })
}

/// Write a 16 bit timer register, high byte first
pub fn write16(low: usize, value: u16) {
    let [lo, hi] = value.to_le_bytes();
    critical_section::with(|_| {
        write(low + 1, hi);
        write(low, lo);
    })
}

/// Busy-wait roughly `us` microseconds at 16 MHz
pub fn delay_us(us: u16) {
    for _ in 0..us {
        for _ in 0..3 {
            //safety: a nop has no effect
            unsafe { core::arch::asm!("nop") }
        }
    }
}

pub fn wdr() {
    //safety: resetting the watchdog counter has no other effect
    unsafe { core::arch::asm!("wdr") }
}

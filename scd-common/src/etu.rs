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
//! Elementary time unit arithmetic
//!
//! One ETU lasts `F / (D * f)` seconds where `f` is the clock given to the card.
//! Bit boundaries are found by counting ticks of a timer, so everything here is
//! expressed in ticks of that timer.

/// Clock rate conversion factor used until a card negotiates otherwise
pub const DEFAULT_F: u32 = 372;

/// Baud rate adjustment factor used until a card negotiates otherwise
pub const DEFAULT_D: u32 = 1;

/// Frequency of the microcontroller core clock
pub const CPU_HZ: u32 = 16_000_000;

/// Number of timer ticks in one ETU
///
/// `clock_hz` is the clock given to the card, `timer_hz` the rate of the
/// timer used to measure time
pub const fn ticks_per_etu(f: u32, d: u32, clock_hz: u32, timer_hz: u32) -> u32 {
    (f as u64 * timer_hz as u64 / (d as u64 * clock_hz as u64)) as u32
}

/// Duration in microseconds of `n_etu` ETUs
pub const fn wait_duration_us(f: u32, d: u32, clock_hz: u32, n_etu: u32) -> u32 {
    (n_etu as u64 * f as u64 * 1_000_000 / (d as u64 * clock_hz as u64)) as u32
}

/// Timer ticks of one ETU, with the fractions used to place samples in a bit period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EtuTiming {
    ticks: u32,
}

impl EtuTiming {
    /// Terminal side: the timer counts the terminal clock itself
    pub const TERMINAL: Self = Self::from_ticks(DEFAULT_F);

    pub const fn from_ticks(ticks: u32) -> Self {
        Self { ticks }
    }

    pub const fn new(f: u32, d: u32, clock_hz: u32, timer_hz: u32) -> Self {
        Self::from_ticks(ticks_per_etu(f, d, clock_hz, timer_hz))
    }

    pub const fn ticks(self) -> u32 {
        self.ticks
    }

    pub const fn etus(self, n: u32) -> u32 {
        self.ticks * n
    }

    /// Middle of a bit period
    pub const fn half(self) -> u32 {
        self.ticks / 2
    }

    /// A bit less than half an ETU, used to start the error signal early
    pub const fn less_than_half(self) -> u32 {
        self.ticks * 46 / 100
    }

    /// A bit more than one ETU, the minimum length of the error signal
    pub const fn extended(self) -> u32 {
        self.ticks * 1075 / 1000
    }
}

/// Clock given to the card, generated from the core clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IccClock {
    Mhz4,
    Mhz2,
    Mhz1,
    Khz800,
    Khz500,
}

impl Default for IccClock {
    fn default() -> Self {
        Self::Mhz4
    }
}

impl IccClock {
    pub const fn hz(self) -> u32 {
        match self {
            Self::Mhz4 => 4_000_000,
            Self::Mhz2 => 2_000_000,
            Self::Mhz1 => 1_000_000,
            Self::Khz800 => 800_000,
            Self::Khz500 => 500_000,
        }
    }

    /// Rate of the timer counting ETUs for this clock
    ///
    /// The fastest clock is measured with the undivided core clock, the
    /// others with the core clock divided by 8 so ETUs fit the counter
    pub const fn timer_hz(self, cpu_hz: u32) -> u32 {
        match self {
            Self::Mhz4 => cpu_hz,
            _ => cpu_hz / 8,
        }
    }

    /// Compare value toggling the clock pin at twice `hz` from `cpu_hz`
    pub const fn compare_value(self, cpu_hz: u32) -> u8 {
        (cpu_hz / (2 * self.hz()) - 1) as u8
    }

    pub const fn etu(self, cpu_hz: u32) -> EtuTiming {
        EtuTiming::new(DEFAULT_F, DEFAULT_D, self.hz(), self.timer_hz(cpu_hz))
    }
}

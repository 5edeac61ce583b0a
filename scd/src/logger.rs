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
use arrayvec::ArrayString;
use log::{Level, Metadata, Record};

use crate::board::debug_write;

/// Longest line sent to the debug output, longer ones are cut
pub const LINE_MAX: usize = 128;

/// Logger writing one line per record to the board debug output
#[derive(Default)]
pub struct ScdLog;

impl log::Log for ScdLog {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        debug_write(&Self::read_record(record))
    }

    fn flush(&self) {}
}

impl ScdLog {
    fn read_record(record: &Record) -> ArrayString<LINE_MAX> {
        let mut s = ArrayString::<LINE_MAX>::new();

        //a record that does not fit is cut short
        let _ = core::fmt::write(
            &mut s,
            format_args!(
                "[{}] {} @ {}\n",
                record.level().as_str(),
                record.target(),
                record.args()
            ),
        );

        s
    }

    ///Install this logger as the global logger
    pub fn install(level: Level) -> Result<(), log::SetLoggerError> {
        //safety: called once at boot, before interrupts are enabled
        unsafe { log::set_logger_racy(&Self {}) }?;
        log::set_max_level(level.to_level_filter());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ScdLog;
    use log::{Level, Record};

    #[test]
    fn formats_level_target_and_message() {
        match format_args!("cursor at {:#06x}", 0x88) {
            args => {
                let record = Record::builder()
                    .args(args)
                    .level(Level::Info)
                    .target("scdlib::log_writer")
                    .build();

                assert_eq!(
                    ScdLog::read_record(&record).as_str(),
                    "[INFO] scdlib::log_writer @ cursor at 0x0088\n"
                );
            }
        }
    }

    #[test]
    fn installs_only_once() {
        assert!(ScdLog::install(Level::Info).is_ok());
        assert!(ScdLog::install(Level::Trace).is_err());
        assert_eq!(log::max_level(), Level::Info.to_level_filter());
    }

    #[test]
    fn long_lines_are_truncated() {
        match format_args!("{:x<300}", "") {
            args => {
                let record = Record::builder()
                    .args(args)
                    .level(Level::Trace)
                    .target("t")
                    .build();

                let line = ScdLog::read_record(&record);
                assert_eq!(line.len(), super::LINE_MAX);
                assert!(line.starts_with("[TRACE] t @ xxx"));
            }
        }
    }
}

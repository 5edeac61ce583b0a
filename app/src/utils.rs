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
#![allow(dead_code)]

/// Assert that `$result` failed with the status code `$expected`
#[macro_export]
#[cfg(test)]
macro_rules! assert_status {
    ($result:expr, $expected:expr) => {
        match $result {
            Ok(_) => panic!("expected status {:#04x}, got success", $expected),
            Err(e) => assert_eq!(e.code(), $expected, "{:?}", e),
        }
    };
}

/// Hex dump of `len` bytes of the store starting at `from`
#[cfg(test)]
pub fn dump<E: scd::hal::Eeprom>(nvm: &scd::Nvm<E>, from: u16, len: usize) -> std::string::String {
    let mut out = std::vec::Vec::new();
    out.resize(len, 0);
    nvm.read(from, &mut out).unwrap();
    hex::encode(out)
}

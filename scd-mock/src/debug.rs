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
//! Captures log output so tests can look at it

use std::string::{String, ToString};
use std::sync::Mutex;
use std::vec::Vec;

static LINES: Mutex<Vec<String>> = Mutex::new(Vec::new());

pub fn debug_write(s: &str) {
    if let Ok(mut lines) = LINES.lock() {
        lines.push(s.to_string());
    }
}

/// Retrieve and forget everything written so far
pub fn take_lines() -> Vec<String> {
    LINES
        .lock()
        .map(|mut lines| std::mem::take(&mut *lines))
        .unwrap_or_default()
}

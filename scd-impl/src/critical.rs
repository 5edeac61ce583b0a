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
//! Single core critical section: save SREG and mask interrupts

use core::sync::atomic::{compiler_fence, Ordering};

use crate::regs::{self, SREG, SREG_I};

struct SingleCore;
critical_section::set_impl!(SingleCore);

unsafe impl critical_section::Impl for SingleCore {
    unsafe fn acquire() -> critical_section::RawRestoreState {
        let sreg = regs::read(SREG);
        regs::write(SREG, sreg & !SREG_I);
        compiler_fence(Ordering::SeqCst);
        sreg
    }

    unsafe fn release(restore: critical_section::RawRestoreState) {
        compiler_fence(Ordering::SeqCst);
        if restore & SREG_I != 0 {
            regs::set(SREG, SREG_I);
        }
    }
}

// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::sync::Arc;

use parking_lot::Mutex;
use parking_lot::MutexGuard;

use crate::mmio::RegisterOffset;

/// Spec for a regular register. It specifies its location in the window and which bits software
/// is allowed to change.
pub struct RegisterSpec {
    pub name: String,
    pub offset: RegisterOffset,
    pub reset_value: u32,
    /// Only masked bits can be written by software.
    pub writeable_mask: u32,
}

struct RegisterInner {
    spec: RegisterSpec,
    value: u32,
    write_cb: Option<Box<dyn Fn(u32) -> u32 + Send>>,
}

/// Register is a thread safe struct. Clones share the same value, so the emulated device side can
/// keep a handle while the window owns another.
#[derive(Clone)]
pub struct Register {
    inner: Arc<Mutex<RegisterInner>>,
}

impl Register {
    pub fn new(spec: RegisterSpec) -> Self {
        let value = spec.reset_value;
        Register {
            inner: Arc::new(Mutex::new(RegisterInner {
                spec,
                value,
                write_cb: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegisterInner> {
        self.inner.lock()
    }

    pub fn offset(&self) -> RegisterOffset {
        self.lock().spec.offset
    }

    pub fn name(&self) -> String {
        self.lock().spec.name.clone()
    }

    /// Software write. The writeable mask is applied, then the callback (if any) decides the value
    /// that is finally stored.
    pub fn write(&self, data: u32) {
        let (masked, cb) = {
            let mut inner = self.lock();
            let mask = inner.spec.writeable_mask;
            let masked = (inner.value & !mask) | (data & mask);
            match inner.write_cb.take() {
                Some(cb) => (masked, cb),
                None => {
                    inner.value = masked;
                    return;
                }
            }
        };
        // Callback is invoked without holding any lock, so it may read this register.
        let value = cb(masked);
        let mut inner = self.lock();
        inner.value = value;
        inner.write_cb = Some(cb);
    }

    /// Reset this register to its default value.
    pub fn reset(&self) {
        let mut locked = self.lock();
        locked.value = locked.spec.reset_value;
    }

    /// Get current value of this register.
    pub fn get_value(&self) -> u32 {
        self.lock().value
    }

    /// Set value from device side. Callback won't be invoked.
    pub fn set_value(&self, val: u32) {
        self.lock().value = val;
    }

    /// Set masked bits from device side.
    pub fn set_bits(&self, mask: u32) {
        self.lock().value |= mask;
    }

    /// Clear masked bits from device side.
    pub fn clear_bits(&self, mask: u32) {
        self.lock().value &= !mask;
    }

    /// Set a callback. It will be invoked when software writes the register.
    pub fn set_write_cb<C: 'static + Fn(u32) -> u32 + Send>(&self, callback: C) {
        self.lock().write_cb = Some(Box::new(callback));
    }
}

#[macro_export]
macro_rules! register {
    (
        name: $name:expr,
        offset: $offset:expr,
        reset_value: $rv:expr,
        writeable_mask: $mask:expr,
    ) => {{
        use $crate::register_space::*;
        Register::new(RegisterSpec {
            name: String::from($name),
            offset: $offset,
            reset_value: $rv,
            writeable_mask: $mask,
        })
    }};
    (name: $name:expr, offset: $offset:expr, reset_value: $rv:expr,) => {{
        use $crate::register_space::*;
        Register::new(RegisterSpec {
            name: String::from($name),
            offset: $offset,
            reset_value: $rv,
            writeable_mask: !0,
        })
    }};
}

#[macro_export]
macro_rules! register_array {
    (
        name: $name:expr,
        cnt: $cnt:expr,
        base_offset: $base_offset:expr,
        stride: $stride:expr,
        reset_value: $rv:expr,
    ) => {{
        use $crate::register_space::*;
        let mut v: Vec<Register> = Vec::new();
        for i in 0..$cnt {
            v.push(Register::new(RegisterSpec {
                name: format!("{}_{}", $name, i),
                offset: $base_offset + ($stride * i) as $crate::mmio::RegisterOffset,
                reset_value: $rv,
                writeable_mask: !0,
            }));
        }
        v
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn software_and_device_writes() {
        let r = register! {
            name: "",
            offset: 0x10,
            reset_value: 0xf1,
        };
        assert_eq!(r.offset(), 0x10);
        assert_eq!(r.get_value(), 0xf1);
        r.write(0xab);
        assert_eq!(r.get_value(), 0xab);
        r.reset();
        assert_eq!(r.get_value(), 0xf1);
        r.set_value(0xcc);
        assert_eq!(r.get_value(), 0xcc);
    }

    #[test]
    fn writeable_mask_limits_software() {
        let r = register! {
            name: "",
            offset: 0x10,
            reset_value: 0x0,
            writeable_mask: 0xf,
        };
        r.write(0xab);
        assert_eq!(r.get_value(), 0x0b);
        // The device side is not restricted by the mask.
        r.set_value(0xcc);
        assert_eq!(r.get_value(), 0xcc);
        r.write(0x0);
        assert_eq!(r.get_value(), 0xc0);
    }

    #[test]
    fn write_callback_decides_stored_value() {
        let state = Arc::new(Mutex::new(0u32));
        let r = register! {
            name: "",
            offset: 0x10,
            reset_value: 0x0,
        };

        let s2 = state.clone();
        r.set_write_cb(move |val: u32| {
            *s2.lock() = val;
            // Pretend the hardware immediately completes whatever bit 15 requested.
            val & !0x8000
        });
        r.write(0x8007);
        assert_eq!(*state.lock(), 0x8007);
        assert_eq!(r.get_value(), 0x7);
        r.set_value(0xab);
        assert_eq!(*state.lock(), 0x8007);
    }

    #[test]
    fn register_array_offsets() {
        let regs = register_array! {
            name: "scratch",
            cnt: 4,
            base_offset: 0x2700,
            stride: 4,
            reset_value: 0,
        };
        let offsets: Vec<_> = regs.iter().map(|r| r.offset()).collect();
        assert_eq!(offsets, vec![0x2700, 0x2704, 0x2708, 0x270c]);
        assert_eq!(regs[3].name(), "scratch_3");
    }
}

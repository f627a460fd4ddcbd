// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Access to the engine's 32-bit register windows.

use std::ptr::NonNull;

use log::error;

/// Byte offset of a register inside its window.
pub type RegisterOffset = u32;

/// A window of 32-bit registers. Callers serialize multi-register sequences themselves; the engine
/// keeps every window behind its hardware lock.
pub trait RegisterIo: Send {
    fn read(&self, offset: RegisterOffset) -> u32;

    fn write(&mut self, offset: RegisterOffset, value: u32);

    /// Read-modify-write setting `mask`.
    fn set_bits(&mut self, offset: RegisterOffset, mask: u32) {
        let value = self.read(offset);
        self.write(offset, value | mask);
    }

    /// Read-modify-write clearing `mask`.
    fn clear_bits(&mut self, offset: RegisterOffset, mask: u32) {
        let value = self.read(offset);
        self.write(offset, value & !mask);
    }
}

/// A memory-mapped register window accessed with volatile loads and stores.
pub struct MmioWindow {
    base: NonNull<u32>,
    len: usize,
}

// SAFETY:
// The window only hands out volatile accesses through `&self`/`&mut self`, and the mapping it
// points to stays valid for the lifetime promised to `MmioWindow::new`.
unsafe impl Send for MmioWindow {}

impl MmioWindow {
    /// Wraps `len` bytes of device memory mapped at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be 4-byte aligned and point to a mapping of at least `len` bytes that outlives
    /// the returned window and is not accessed through other aliases while it is in use.
    pub unsafe fn new(base: NonNull<u8>, len: usize) -> Self {
        MmioWindow {
            base: base.cast(),
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn register(&self, offset: RegisterOffset) -> Option<*mut u32> {
        let offset = offset as usize;
        if offset % 4 != 0 || offset + 4 > self.len {
            error!("register offset {:#x} outside of a {:#x} byte window", offset, self.len);
            return None;
        }
        // SAFETY:
        // `offset` was checked to lie inside the mapping.
        Some(unsafe { self.base.as_ptr().add(offset / 4) })
    }
}

impl RegisterIo for MmioWindow {
    fn read(&self, offset: RegisterOffset) -> u32 {
        match self.register(offset) {
            // SAFETY:
            // The pointer is aligned and inside the mapping.
            Some(reg) => unsafe { reg.read_volatile() },
            None => 0,
        }
    }

    fn write(&mut self, offset: RegisterOffset, value: u32) {
        if let Some(reg) = self.register(offset) {
            // SAFETY:
            // The pointer is aligned and inside the mapping.
            unsafe { reg.write_volatile(value) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volatile_window_over_memory() {
        let mut backing = vec![0u32; 16];
        let base = NonNull::new(backing.as_mut_ptr() as *mut u8).unwrap();
        // SAFETY:
        // `backing` outlives `window` and is not touched while the window is alive.
        let mut window = unsafe { MmioWindow::new(base, 64) };
        window.write(0x8, 0xdead_beef);
        window.set_bits(0xc, 0x11);
        window.clear_bits(0xc, 0x01);
        assert_eq!(window.read(0x8), 0xdead_beef);
        assert_eq!(window.read(0xc), 0x10);
        // Out of range and unaligned accesses are dropped.
        window.write(0x40, 1);
        window.write(0x2, 1);
        assert_eq!(window.read(0x40), 0);
        drop(window);
        assert_eq!(backing[2], 0xdead_beef);
        assert_eq!(backing[3], 0x10);
        assert_eq!(backing[0], 0);
    }
}

// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::collections::btree_map::BTreeMap;
use std::sync::Arc;

use log::warn;
use parking_lot::Mutex;

use super::register::Register;
use crate::mmio::RegisterIo;
use crate::mmio::RegisterOffset;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// One software access to a register window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterAccess {
    pub access: Access,
    pub offset: RegisterOffset,
    pub value: u32,
}

/// Ordered record of the accesses made to one or more windows. Clones share the same record.
#[derive(Clone, Default)]
pub struct AccessLog(Arc<Mutex<Vec<RegisterAccess>>>);

impl AccessLog {
    pub fn new() -> Self {
        Default::default()
    }

    fn record(&self, access: Access, offset: RegisterOffset, value: u32) {
        self.0.lock().push(RegisterAccess {
            access,
            offset,
            value,
        });
    }

    /// Snapshot of every access recorded so far.
    pub fn entries(&self) -> Vec<RegisterAccess> {
        self.0.lock().clone()
    }

    /// Snapshot of the writes recorded so far.
    pub fn writes(&self) -> Vec<RegisterAccess> {
        self.0
            .lock()
            .iter()
            .filter(|a| a.access == Access::Write)
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    pub fn clear(&self) {
        self.0.lock().clear()
    }
}

/// Register space represents a set of registers. It can handle read/write operations.
#[derive(Default)]
pub struct RegisterSpace {
    regs: BTreeMap<RegisterOffset, Register>,
    log: Option<AccessLog>,
}

impl RegisterSpace {
    /// Creates a new empty RegisterSpace.
    pub fn new() -> RegisterSpace {
        Default::default()
    }

    /// Record every software access into `log`.
    pub fn set_access_log(&mut self, log: AccessLog) {
        self.log = Some(log);
    }

    /// Add a register to register space.
    pub fn add_register(&mut self, reg: Register) {
        let offset = reg.offset();
        debug_assert!(offset % 4 == 0);
        let insert_result = self.regs.insert(offset, reg).is_none();
        debug_assert!(insert_result);
    }

    /// Add an array of registers.
    pub fn add_register_array(&mut self, regs: &[Register]) {
        for r in regs {
            self.add_register(r.clone());
        }
    }

    /// Returns a handle sharing the value of the register at `offset`.
    pub fn register(&self, offset: RegisterOffset) -> Option<Register> {
        self.regs.get(&offset).cloned()
    }
}

impl RegisterIo for RegisterSpace {
    fn read(&self, offset: RegisterOffset) -> u32 {
        let value = match self.regs.get(&offset) {
            Some(r) => r.get_value(),
            None => {
                warn!("read from unmapped register {:#x}", offset);
                0
            }
        };
        if let Some(log) = &self.log {
            log.record(Access::Read, offset, value);
        }
        value
    }

    /// If the targeted register has a callback, it will be invoked with the new value.
    fn write(&mut self, offset: RegisterOffset, value: u32) {
        if let Some(log) = &self.log {
            log.record(Access::Write, offset, value);
        }
        match self.regs.get(&offset) {
            Some(r) => r.write(value),
            None => warn!("write of {:#x} to unmapped register {:#x}", value, offset),
        }
    }
}

// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Contiguous DMA memory handed to the decode engine: workspaces, input FIFO, firmware bounce
//! buffers.

use std::cmp;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::ops::Bound;

use log::debug;
use remain::sorted;
use thiserror::Error as ThisError;

use crate::error::Error;

#[sorted]
#[derive(ThisError, Debug, PartialEq, Eq)]
pub enum DmaError {
    #[error("alignment {0:#x} is not a power of two")]
    BadAlignment(u64),
    #[error("pool {base:#x}+{size:#x} does not fit the engine's 32-bit address space")]
    BadPool { base: u64, size: u64 },
    #[error("region at {0:#x} is not allocated from this pool")]
    NotAllocated(u64),
    #[error("no free range of {size:#x} bytes for {tag}")]
    OutOfSpace { size: u64, tag: String },
    #[error("zero sized allocation for {0}")]
    SizeZero(String),
}

impl From<DmaError> for Error {
    fn from(e: DmaError) -> Error {
        Error::ResourceExhausted(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DmaError>;

/// A region of engine-visible memory. It can only be returned to the pool by value, so it is
/// released at most once.
#[derive(Debug)]
pub struct DmaRegion {
    addr: u64,
    mem: Vec<u8>,
}

impl DmaRegion {
    /// Bus address the engine uses to reach the region.
    pub fn addr(&self) -> u32 {
        // Pools are checked to end below 4 GiB.
        self.addr as u32
    }

    pub fn len(&self) -> usize {
        self.mem.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mem.is_empty()
    }

    /// CPU view of the region.
    pub fn as_slice(&self) -> &[u8] {
        &self.mem
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.mem
    }
}

/// First-fit allocator over one contiguous range of bus addresses. Freed ranges are coalesced
/// with their neighbours.
#[derive(Debug)]
pub struct DmaPool {
    base: u64,
    size: u64,
    /// Free ranges as inclusive `(start, end)` pairs.
    regions: BTreeSet<(u64, u64)>,
    /// Allocated ranges by start address: inclusive end and tag.
    allocs: BTreeMap<u64, (u64, String)>,
}

impl DmaPool {
    pub fn new(base: u64, size: u64) -> Result<DmaPool> {
        if size == 0 {
            return Err(DmaError::SizeZero("pool".to_string()));
        }
        match base.checked_add(size) {
            Some(end) if end <= 1 << 32 => (),
            _ => return Err(DmaError::BadPool { base, size }),
        }
        let mut regions = BTreeSet::new();
        regions.insert((base, base + size - 1));
        Ok(DmaPool {
            base,
            size,
            regions,
            allocs: BTreeMap::new(),
        })
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Total bytes currently handed out.
    pub fn allocated_bytes(&self) -> u64 {
        self.allocs
            .iter()
            .map(|(start, (end, _))| end - start + 1)
            .sum()
    }

    /// Tags of the live allocations, lowest address first.
    pub fn allocations(&self) -> Vec<String> {
        self.allocs.values().map(|(_, tag)| tag.clone()).collect()
    }

    /// Allocates `size` zeroed bytes aligned to `align`.
    pub fn allocate(&mut self, size: u64, align: u64, tag: &str) -> Result<DmaRegion> {
        if size == 0 {
            return Err(DmaError::SizeZero(tag.to_string()));
        }
        let align = cmp::max(align, 1);
        if !align.is_power_of_two() {
            return Err(DmaError::BadAlignment(align));
        }

        // finds first region matching alignment and size.
        let slot = self
            .regions
            .iter()
            .find(|(start, end)| {
                match start % align {
                    0 => start.checked_add(size - 1),
                    r => start.checked_add(size - 1 + align - r),
                }
                .map_or(false, |last| last <= *end)
            })
            .cloned()
            .ok_or_else(|| DmaError::OutOfSpace {
                size,
                tag: tag.to_string(),
            })?;

        let (slot_start, slot_end) = slot;
        let start = match slot_start % align {
            0 => slot_start,
            r => slot_start + align - r,
        };
        let end = start + size - 1;

        self.regions.remove(&slot);
        if start > slot_start {
            self.regions.insert((slot_start, start - 1));
        }
        if end < slot_end {
            self.regions.insert((end + 1, slot_end));
        }
        self.allocs.insert(start, (end, tag.to_string()));
        debug!("dma: {} at {:#x}, {:#x} bytes", tag, start, size);

        Ok(DmaRegion {
            addr: start,
            mem: vec![0; size as usize],
        })
    }

    /// Returns `region` to the pool, coalescing neighboring free ranges.
    pub fn free(&mut self, region: DmaRegion) -> Result<()> {
        let (end, tag) = self
            .allocs
            .remove(&region.addr)
            .ok_or(DmaError::NotAllocated(region.addr))?;
        debug!("dma: release {} at {:#x}", tag, region.addr);

        let mut slot = (region.addr, end);
        let smaller = self
            .regions
            .range((Bound::Unbounded, Bound::Excluded(slot)))
            .next_back()
            .cloned();
        if let Some(smaller) = smaller {
            if smaller.1 + 1 == slot.0 {
                self.regions.remove(&smaller);
                slot.0 = smaller.0;
            }
        }
        let larger = self
            .regions
            .range((Bound::Excluded(slot), Bound::Unbounded))
            .next()
            .cloned();
        if let Some(larger) = larger {
            if slot.1 + 1 == larger.0 {
                self.regions.remove(&larger);
                slot.1 = larger.1;
            }
        }
        self.regions.insert(slot);
        Ok(())
    }
}

// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Canvases are entries of the memory controller's lookup table describing a 2D plane (address,
//! stride, height). The decoder firmware addresses frame planes by canvas index.

use crate::buffer::FrameBuffer;
use crate::dos::DMC_CAV_LUT_ADDR;
use crate::dos::DMC_CAV_LUT_DATAH;
use crate::dos::DMC_CAV_LUT_DATAL;
use crate::error::Error;
use crate::error::Result;
use crate::format::PixelFormat;
use crate::mmio::RegisterIo;
use crate::mmio::RegisterOffset;

/// Number of entries in the canvas lookup table.
pub const CANVAS_COUNT: usize = 256;

pub const CANVAS_WRAP_NONE: u32 = 0;
pub const CANVAS_BLKMODE_LINEAR: u32 = 0;

const CANVAS_LUT_WR_EN: u32 = 0x2 << 8;

/// Engine-wide allocator of canvas indices.
pub struct CanvasAllocator {
    used: [bool; CANVAS_COUNT],
}

impl Default for CanvasAllocator {
    fn default() -> Self {
        CanvasAllocator {
            used: [false; CANVAS_COUNT],
        }
    }
}

impl CanvasAllocator {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn alloc(&mut self) -> Option<u8> {
        let index = self.used.iter().position(|used| !used)?;
        self.used[index] = true;
        Some(index as u8)
    }

    /// Allocates `count` indices, or none at all.
    pub fn alloc_n(&mut self, count: usize) -> Result<Vec<u8>> {
        let mut indices = Vec::with_capacity(count);
        for _ in 0..count {
            match self.alloc() {
                Some(index) => indices.push(index),
                None => {
                    self.free_all(&indices);
                    return Err(Error::ResourceExhausted(format!(
                        "{} canvases requested, {} available",
                        count,
                        indices.len()
                    )));
                }
            }
        }
        Ok(indices)
    }

    pub fn free(&mut self, index: u8) {
        self.used[index as usize] = false;
    }

    pub fn free_all(&mut self, indices: &[u8]) {
        for index in indices {
            self.free(*index);
        }
    }

    pub fn in_use(&self) -> usize {
        self.used.iter().filter(|used| **used).count()
    }
}

/// Geometry of one canvas entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanvasDesc {
    pub addr: u32,
    pub width: u32,
    pub height: u32,
    pub wrap: u32,
    pub blkmode: u32,
}

impl CanvasDesc {
    pub fn linear(addr: u32, width: u32, height: u32) -> Self {
        CanvasDesc {
            addr,
            width,
            height,
            wrap: CANVAS_WRAP_NONE,
            blkmode: CANVAS_BLKMODE_LINEAR,
        }
    }

    fn data_low(&self) -> u32 {
        let addr = ((self.addr as u64 + 7) >> 3) as u32;
        let width = (self.width + 7) >> 3;
        (addr & 0x1fff_ffff) | ((width & 0x7) << 29)
    }

    fn data_high(&self) -> u32 {
        let width = (self.width + 7) >> 3;
        ((width >> 3) & 0x1ff)
            | ((self.height & 0x1fff) << 9)
            | ((self.wrap & 0x3) << 22)
            | ((self.blkmode & 0x3) << 24)
    }
}

/// Writes `desc` into canvas `index`.
pub fn program(dmc: &mut dyn RegisterIo, index: u8, desc: &CanvasDesc) {
    dmc.write(DMC_CAV_LUT_DATAL, desc.data_low());
    dmc.write(DMC_CAV_LUT_DATAH, desc.data_high());
    dmc.write(DMC_CAV_LUT_ADDR, CANVAS_LUT_WR_EN | index as u32);
    // Read back to flush the write.
    dmc.read(DMC_CAV_LUT_DATAH);
}

/// Packs the canvas indices of a frame's planes into the word the firmware expects.
pub fn canvas_word(y: u8, u: u8, v: u8) -> u32 {
    (v as u32) << 16 | (u as u32) << 8 | y as u32
}

fn align(value: u32, to: u32) -> u32 {
    (value + to - 1) & !(to - 1)
}

/// Canvas geometries for the planes of one decoded frame.
pub fn plane_canvases(
    frame: &FrameBuffer,
    format: PixelFormat,
    width: u32,
    height: u32,
) -> Vec<CanvasDesc> {
    let width = align(width, 64);
    let height = align(height, 64);
    match format {
        PixelFormat::NV12 => vec![
            CanvasDesc::linear(frame.planes[0], width, height),
            CanvasDesc::linear(frame.planes[1], width, height / 2),
        ],
        PixelFormat::YUV420 => vec![
            CanvasDesc::linear(frame.planes[0], width, height),
            CanvasDesc::linear(frame.planes[1], width / 2, height / 2),
            CanvasDesc::linear(frame.planes[2], width / 2, height / 2),
        ],
        _ => Vec::new(),
    }
}

/// Programs one canvas per plane of every frame and writes each frame's canvas word into the
/// next register of `targets`, a list of `(first register, register count)` ranges. `indices`
/// holds one allocated canvas per plane of every frame, frame by frame.
///
/// Arguments are checked before any register is written.
#[allow(clippy::too_many_arguments)]
pub fn set_frame_canvases(
    dos: &mut dyn RegisterIo,
    dmc: &mut dyn RegisterIo,
    indices: &[u8],
    frames: &[FrameBuffer],
    format: PixelFormat,
    width: u32,
    height: u32,
    targets: &[(RegisterOffset, u32)],
) -> Result<()> {
    let regs: Vec<RegisterOffset> = targets
        .iter()
        .flat_map(|(base, count)| (0..*count).map(move |i| base + 4 * i))
        .collect();
    if frames.len() > regs.len() {
        return Err(Error::InvalidParameter(format!(
            "{} frames but only {} canvas registers",
            frames.len(),
            regs.len()
        )));
    }
    let planes = format.num_planes();
    if planes == 0 || frames.iter().any(|f| f.planes.len() != planes) {
        return Err(Error::InvalidParameter(format!(
            "frames do not match output format {}",
            format
        )));
    }
    if indices.len() != frames.len() * planes {
        return Err(Error::InvalidParameter(format!(
            "{} canvases for {} frames of {} planes",
            indices.len(),
            frames.len(),
            planes
        )));
    }

    for ((frame, reg), ids) in frames.iter().zip(regs).zip(indices.chunks(planes)) {
        for (desc, index) in plane_canvases(frame, format, width, height)
            .iter()
            .zip(ids)
        {
            program(dmc, *index, desc);
        }
        let word = match ids {
            [y, uv] => canvas_word(*y, *uv, *uv),
            [y, u, v] => canvas_word(*y, *u, *v),
            _ => 0,
        };
        dos.write(reg, word);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register_space::Access;
    use crate::register_space::AccessLog;
    use crate::register_space::RegisterSpace;

    #[test]
    fn allocator_all_or_nothing() {
        let mut canvases = CanvasAllocator::new();
        let first = canvases.alloc_n(250).unwrap();
        assert_eq!(first.len(), 250);
        assert!(matches!(
            canvases.alloc_n(7),
            Err(Error::ResourceExhausted(_))
        ));
        assert_eq!(canvases.in_use(), 250);
        canvases.free_all(&first[..10]);
        assert_eq!(canvases.alloc(), Some(0));
        assert_eq!(canvases.in_use(), 241);
    }

    #[test]
    fn word_packing() {
        assert_eq!(canvas_word(0x12, 0x34, 0x56), 0x0056_3412);
        assert_eq!(canvas_word(4, 5, 5), 0x0005_0504);
    }

    #[test]
    fn program_sequence() {
        let log = AccessLog::new();
        let mut dmc = RegisterSpace::new();
        dmc.set_access_log(log.clone());
        let desc = CanvasDesc::linear(0x1000_0000, 1920, 1088);
        program(&mut dmc, 7, &desc);
        let entries = log.entries();
        assert_eq!(entries.len(), 4);
        // 1920 / 8 = 240 = 0b11110_000: the low 3 bits go to DATAL, the rest to DATAH.
        assert_eq!(entries[0].offset, DMC_CAV_LUT_DATAL);
        assert_eq!(entries[0].value, 0x1000_0000 >> 3);
        assert_eq!(entries[1].offset, DMC_CAV_LUT_DATAH);
        assert_eq!(entries[1].value, 30 | 1088 << 9);
        assert_eq!(entries[2].offset, DMC_CAV_LUT_ADDR);
        assert_eq!(entries[2].value, 0x207);
        assert_eq!(entries[3].access, Access::Read);
        assert_eq!(entries[3].offset, DMC_CAV_LUT_DATAH);
    }

    #[test]
    fn odd_width_rounds_up() {
        let desc = CanvasDesc::linear(0x1001, 9, 2);
        assert_eq!(desc.data_low(), 0x201 | 2 << 29);
        assert_eq!(desc.data_high(), 2 << 9);
    }

    #[test]
    fn frame_canvases_fill_targets_in_order() {
        let log = AccessLog::new();
        let mut dos = RegisterSpace::new();
        dos.set_access_log(log.clone());
        let mut dmc = RegisterSpace::new();
        let mut canvases = CanvasAllocator::new();
        let frames: Vec<FrameBuffer> = (0..3u32)
            .map(|i| FrameBuffer::new(vec![0x1000_0000 * (i + 1), 0x1080_0000 * (i + 1)]))
            .collect();
        let indices = canvases.alloc_n(6).unwrap();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
        set_frame_canvases(
            &mut dos,
            &mut dmc,
            &indices,
            &frames,
            PixelFormat::NV12,
            1920,
            1080,
            &[(0x100, 2), (0x200, 4)],
        )
        .unwrap();
        let writes: Vec<(u32, u32)> = log.writes().iter().map(|a| (a.offset, a.value)).collect();
        assert_eq!(
            writes,
            vec![
                (0x100, canvas_word(0, 1, 1)),
                (0x104, canvas_word(2, 3, 3)),
                (0x200, canvas_word(4, 5, 5)),
            ]
        );
    }

    #[test]
    fn frame_canvases_reject_before_writing() {
        let log = AccessLog::new();
        let mut dos = RegisterSpace::new();
        dos.set_access_log(log.clone());
        let mut dmc = RegisterSpace::new();
        dmc.set_access_log(log.clone());
        let frames = vec![FrameBuffer::new(vec![0x1000, 0x2000])];
        // Too many frames for the registers.
        assert!(set_frame_canvases(
            &mut dos,
            &mut dmc,
            &[0, 1, 2, 3],
            &[frames[0].clone(), frames[0].clone()],
            PixelFormat::NV12,
            64,
            64,
            &[(0x100, 1)],
        )
        .is_err());
        // Plane count does not match the format.
        assert!(set_frame_canvases(
            &mut dos,
            &mut dmc,
            &[0, 1, 2],
            &frames,
            PixelFormat::YUV420,
            64,
            64,
            &[(0x100, 1)],
        )
        .is_err());
        // Not enough canvases.
        assert!(set_frame_canvases(
            &mut dos,
            &mut dmc,
            &[0],
            &frames,
            PixelFormat::NV12,
            64,
            64,
            &[(0x100, 1)],
        )
        .is_err());
        assert!(log.is_empty());
    }
}

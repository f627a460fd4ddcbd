// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Per compressed-format family firmware protocols.
//!
//! Each family knows how much private DMA memory its firmware needs, which scratch registers
//! carry the canvas words of the output buffers, how completions are reported and how buffers
//! are handed back. The session core drives a backend through `CodecOps` only.

mod h264;
mod mpeg12;
mod mpeg4;

pub use h264::H264Codec;
pub use mpeg12::Mpeg12Codec;
pub use mpeg4::recycle_mask;
pub use mpeg4::Mpeg4Codec;

use log::error;

use crate::buffer::FrameBuffer;
use crate::canvas::set_frame_canvases;
use crate::dma::DmaPool;
use crate::dma::DmaRegion;
use crate::error::Result;
use crate::format::PixelFormat;
use crate::mmio::RegisterIo;
use crate::mmio::RegisterOffset;

/// Firmware protocol family a compressed format is decoded with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodecFamily {
    Mpeg12,
    Mpeg4,
    H264,
}

impl CodecFamily {
    /// Number of output buffers the family's completion and recycle registers can address.
    pub fn max_buffer_slots(self) -> u32 {
        match self {
            CodecFamily::Mpeg12 => 8,
            CodecFamily::Mpeg4 => 8,
            // 5 bit indices, but only 24 canvas registers.
            CodecFamily::H264 => 24,
        }
    }

    /// Bytes of firmware following the instruction memory image that the backend loads itself.
    pub fn extended_firmware_size(self) -> usize {
        match self {
            CodecFamily::H264 => h264::SIZE_EXT_FW as usize,
            _ => 0,
        }
    }
}

/// Geometry and buffer count a session decodes with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamLayout {
    pub width: u32,
    pub height: u32,
    pub buffers: u32,
}

/// Everything a backend may touch while programming its initial register set.
pub struct StartContext<'a> {
    pub dos: &'a mut dyn RegisterIo,
    pub dmc: &'a mut dyn RegisterIo,
    pub dma: &'a mut DmaPool,
    /// One allocated canvas per plane of every frame, frame by frame.
    pub canvas_indices: &'a [u8],
    pub frames: &'a [FrameBuffer],
    pub output_format: PixelFormat,
    pub width: u32,
    pub height: u32,
}

impl<'a> StartContext<'a> {
    pub fn layout(&self) -> StreamLayout {
        StreamLayout {
            width: self.width,
            height: self.height,
            buffers: self.frames.len() as u32,
        }
    }

    /// Programs the output buffers' canvases and writes their canvas words into `targets`.
    pub fn set_canvases(&mut self, targets: &[(RegisterOffset, u32)]) -> Result<()> {
        set_frame_canvases(
            &mut *self.dos,
            &mut *self.dmc,
            self.canvas_indices,
            self.frames,
            self.output_format,
            self.width,
            self.height,
            targets,
        )
    }
}

/// Most frames a single interrupt can report.
pub const MAX_IRQ_FRAMES: usize = 24;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodedFrame {
    pub index: u8,
    pub corrupted: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceChange {
    pub width: u32,
    pub height: u32,
    pub min_buffers: u32,
}

/// What a backend found while servicing one interrupt. Fixed size so the interrupt path does not
/// allocate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IrqReport {
    frames: [DecodedFrame; MAX_IRQ_FRAMES],
    count: usize,
    pub fatal: bool,
    pub source_change: Option<SourceChange>,
}

impl IrqReport {
    /// Records a decoded frame. Returns false if the report is full.
    pub fn push_frame(&mut self, frame: DecodedFrame) -> bool {
        match self.frames.get_mut(self.count) {
            Some(slot) => {
                *slot = frame;
                self.count += 1;
                true
            }
            None => false,
        }
    }

    pub fn frames(&self) -> &[DecodedFrame] {
        &self.frames[..self.count]
    }
}

/// Operations the session core invokes on a codec family.
pub trait CodecOps {
    /// Allocates the family's private DMA memory for a stream laid out as `layout`. Touches no
    /// register. Either everything is allocated or nothing is. Calling it again once memory is
    /// held is a no-op.
    fn reserve(&mut self, dma: &mut DmaPool, layout: &StreamLayout) -> Result<()>;

    /// Reserves memory if not done yet, then programs canvases and the initial register set.
    fn start(&mut self, ctx: &mut StartContext) -> Result<()>;

    /// Receives the firmware bytes following the instruction memory image.
    fn load_extended_firmware(&mut self, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    /// Releases what `reserve` acquired. Safe after a partial start and when called twice.
    fn stop(&mut self, dma: &mut DmaPool) -> Result<()>;

    /// Services one interrupt. Acknowledges it through `ASSIST_MBOX1_CLR_REG` exactly once, as
    /// the last write.
    fn on_interrupt(&mut self, regs: &mut dyn RegisterIo) -> IrqReport;

    /// Whether the engine's recycle input is empty.
    fn can_recycle(&self, regs: &dyn RegisterIo) -> bool;

    /// Hands output buffer `index` back to the engine. Only valid right after `can_recycle`
    /// returned true.
    fn recycle(&mut self, regs: &mut dyn RegisterIo, index: u8);
}

/// The closed set of codec backends.
pub enum CodecBackend {
    Mpeg12(Mpeg12Codec),
    Mpeg4(Mpeg4Codec),
    H264(H264Codec),
}

impl CodecBackend {
    pub fn new(family: CodecFamily) -> Self {
        match family {
            CodecFamily::Mpeg12 => CodecBackend::Mpeg12(Default::default()),
            CodecFamily::Mpeg4 => CodecBackend::Mpeg4(Default::default()),
            CodecFamily::H264 => CodecBackend::H264(Default::default()),
        }
    }

    pub fn family(&self) -> CodecFamily {
        match self {
            CodecBackend::Mpeg12(_) => CodecFamily::Mpeg12,
            CodecBackend::Mpeg4(_) => CodecFamily::Mpeg4,
            CodecBackend::H264(_) => CodecFamily::H264,
        }
    }

    fn ops(&mut self) -> &mut dyn CodecOps {
        match self {
            CodecBackend::Mpeg12(c) => c,
            CodecBackend::Mpeg4(c) => c,
            CodecBackend::H264(c) => c,
        }
    }
}

impl CodecOps for CodecBackend {
    fn reserve(&mut self, dma: &mut DmaPool, layout: &StreamLayout) -> Result<()> {
        self.ops().reserve(dma, layout)
    }

    fn start(&mut self, ctx: &mut StartContext) -> Result<()> {
        self.ops().start(ctx)
    }

    fn load_extended_firmware(&mut self, data: &[u8]) -> Result<()> {
        self.ops().load_extended_firmware(data)
    }

    fn stop(&mut self, dma: &mut DmaPool) -> Result<()> {
        self.ops().stop(dma)
    }

    fn on_interrupt(&mut self, regs: &mut dyn RegisterIo) -> IrqReport {
        self.ops().on_interrupt(regs)
    }

    fn can_recycle(&self, regs: &dyn RegisterIo) -> bool {
        match self {
            CodecBackend::Mpeg12(c) => c.can_recycle(regs),
            CodecBackend::Mpeg4(c) => c.can_recycle(regs),
            CodecBackend::H264(c) => c.can_recycle(regs),
        }
    }

    fn recycle(&mut self, regs: &mut dyn RegisterIo, index: u8) {
        self.ops().recycle(regs, index)
    }
}

/// Returns every region in `regions` to `dma`. All regions are released even if one fails; the
/// first failure is returned.
pub(crate) fn release_all(
    dma: &mut DmaPool,
    regions: impl IntoIterator<Item = Option<DmaRegion>>,
) -> Result<()> {
    let mut result = Ok(());
    for region in regions.into_iter().flatten() {
        if let Err(e) = dma.free(region) {
            error!("failed to release codec memory: {}", e);
            if result.is_ok() {
                result = Err(e.into());
            }
        }
    }
    result
}

// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! H.264.
//!
//! The firmware talks through AV_SCRATCH_0: its low byte is a command, the rest are arguments.
//! Unlike the MPEG families it can report several frames per interrupt and asks the driver for
//! reference motion vector memory once it has parsed the stream headers.

use log::debug;
use log::error;
use log::warn;

use super::release_all;
use super::CodecOps;
use super::DecodedFrame;
use super::IrqReport;
use super::SourceChange;
use super::StartContext;
use super::StreamLayout;
use crate::dma::DmaPool;
use crate::dma::DmaRegion;
use crate::dos::*;
use crate::error::Error;
use crate::error::Result;
use crate::mmio::RegisterIo;

pub(super) const SIZE_EXT_FW: u64 = 20 * 1024;
const SIZE_WORKSPACE: u64 = 0x1ee000;
const SIZE_SEI: u64 = 8 * 1024;
/// Offset the firmware adds to the workspace address it is given.
const WORKSPACE_BUF_OFFSET: u32 = 0x0100_0000;
/// Motion vector bytes per macroblock of a reference frame.
const MB_MV_SIZE: u64 = 96;

const CMD_MASK: u32 = 0xff;
const CMD_SRC_CHANGE: u32 = 1;
const CMD_FRAMES_READY: u32 = 2;
const CMD_FATAL_ERROR: u32 = 6;
const CMD_BAD_WIDTH: u32 = 7;
const CMD_BAD_HEIGHT: u32 = 8;

const SEI_DATA_READY: u32 = 1 << 15;

const BUF_IDX_MASK: u32 = 0x1f;
const ERROR_FLAG: u32 = 1 << 9;

const MB_TOTAL_BIT: u32 = 8;
const MB_TOTAL_MASK: u32 = 0xffff;
const MB_WIDTH_MASK: u32 = 0xff;
const MAX_REF_BIT: u32 = 24;
const MAX_REF_MASK: u32 = 0x7f;

/// Per-frame status words live in AV_SCRATCH_1 onwards.
const MAX_FRAMES_READY: u32 = AV_SCRATCH_COUNT - 1;

const CANVAS_TARGETS: &[(u32, u32)] = &[(ANC0_CANVAS_ADDR, 24)];

fn align(value: u32, to: u32) -> u32 {
    (value + to - 1) / to * to
}

/// Macroblock count of a frame with dimensions rounded up to whole 4x4 macroblock groups.
fn aligned_mb_total(mb_width: u32, mb_height: u32) -> u64 {
    align(mb_width, 4) as u64 * align(mb_height, 4) as u64
}

#[derive(Default)]
pub struct H264Codec {
    workspace: Option<DmaRegion>,
    sei: Option<DmaRegion>,
    ext_fw: Option<DmaRegion>,
    /// Reference motion vectors, sized for the largest stream the session accepts.
    ref_mv: Option<DmaRegion>,
    buffers: u32,
}

impl H264Codec {
    fn try_reserve(&mut self, dma: &mut DmaPool, layout: &StreamLayout) -> Result<()> {
        let mb_total = aligned_mb_total(
            (layout.width + 15) / 16,
            (layout.height + 15) / 16,
        );
        let ref_size = mb_total * MB_MV_SIZE * layout.buffers.max(1) as u64;
        self.workspace = Some(dma.allocate(SIZE_WORKSPACE, 0x1000, "h264 workspace")?);
        self.sei = Some(dma.allocate(SIZE_SEI, 0x1000, "h264 sei")?);
        self.ext_fw = Some(dma.allocate(SIZE_EXT_FW, 0x1000, "h264 extended firmware")?);
        self.ref_mv = Some(dma.allocate(ref_size, 0x1000, "h264 reference mv")?);
        self.buffers = layout.buffers;
        Ok(())
    }

    fn addr(region: &Option<DmaRegion>) -> u32 {
        region.as_ref().map_or(0, DmaRegion::addr)
    }

    /// Answers the firmware's request for reference memory once it knows the stream geometry.
    fn source_change(&mut self, regs: &mut dyn RegisterIo, report: &mut IrqReport) {
        let parsed = regs.read(AV_SCRATCH_1);
        let mb_width = parsed & MB_WIDTH_MASK;
        let mb_total = (parsed >> MB_TOTAL_BIT) & MB_TOTAL_MASK;
        let max_ref = (parsed >> MAX_REF_BIT) & MAX_REF_MASK;
        if mb_width == 0 {
            error!("h264 source change with zero width");
            report.fatal = true;
            return;
        }
        let mb_height = mb_total / mb_width;

        let crop = regs.read(AV_SCRATCH_6);
        let crop_bottom = crop & 0xff;
        let crop_right = (crop >> 16) & 0xff;
        let width = (mb_width * 16).saturating_sub(crop_right);
        let height = (mb_height * 16).saturating_sub(crop_bottom);

        let needed = aligned_mb_total(mb_width, mb_height) * MB_MV_SIZE * max_ref as u64;
        let ref_mv = match &self.ref_mv {
            Some(r) if needed <= r.len() as u64 => r.addr(),
            _ => {
                error!(
                    "h264 stream {}x{} needs {} reference frames, more than the session holds",
                    width, height, max_ref
                );
                report.fatal = true;
                return;
            }
        };
        debug!("h264 source change: {}x{}, {} references", width, height, max_ref);

        regs.write(AV_SCRATCH_1, ref_mv);
        regs.write(AV_SCRATCH_4, ref_mv + needed as u32);
        regs.write(
            AV_SCRATCH_0,
            (max_ref << 24) | (self.buffers << 16) | (self.buffers << 8),
        );
        report.source_change = Some(SourceChange {
            width,
            height,
            min_buffers: max_ref,
        });
    }

    fn frames_ready(&mut self, regs: &mut dyn RegisterIo, status: u32, report: &mut IrqReport) {
        let errors = regs.read(AV_SCRATCH_D);
        if errors != 0 {
            warn!("h264 decoder reported {} errors", errors);
            regs.write(AV_SCRATCH_D, 0);
        }

        let count = (status >> 8) & 0xff;
        if count > MAX_FRAMES_READY {
            warn!("h264 reported {} frames at once, only {} are readable", count, MAX_FRAMES_READY);
        }
        for i in 0..count.min(MAX_FRAMES_READY) {
            let frame = regs.read(AV_SCRATCH_1 + 4 * i);
            report.push_frame(DecodedFrame {
                index: (frame & BUF_IDX_MASK) as u8,
                corrupted: frame & ERROR_FLAG != 0,
            });
        }
    }
}

impl CodecOps for H264Codec {
    fn reserve(&mut self, dma: &mut DmaPool, layout: &StreamLayout) -> Result<()> {
        if self.workspace.is_some() {
            return Ok(());
        }
        if let Err(e) = self.try_reserve(dma, layout) {
            // Failures are logged by release_all.
            let _ = self.stop(dma);
            return Err(e);
        }
        Ok(())
    }

    fn start(&mut self, ctx: &mut StartContext) -> Result<()> {
        let layout = ctx.layout();
        self.reserve(ctx.dma, &layout)?;
        ctx.set_canvases(CANVAS_TARGETS)?;

        let workspace = Self::addr(&self.workspace);
        let sei = Self::addr(&self.sei);
        let ext_fw = Self::addr(&self.ext_fw);
        let dos = &mut *ctx.dos;
        dos.set_bits(POWER_CTL_VLD, (1 << 9) | (1 << 6));
        dos.clear_bits(MDEC_PIC_DC_CTRL, 1 << 17);
        dos.write(AV_SCRATCH_0, 0);
        dos.write(AV_SCRATCH_1, workspace.wrapping_sub(WORKSPACE_BUF_OFFSET));
        dos.write(AV_SCRATCH_7, 0);
        dos.write(AV_SCRATCH_8, 0);
        dos.write(AV_SCRATCH_D, 0);
        dos.write(AV_SCRATCH_G, ext_fw);
        dos.write(AV_SCRATCH_I, sei.wrapping_sub(workspace));
        dos.write(AV_SCRATCH_J, 0);
        // Enable error correction.
        let ec = dos.read(AV_SCRATCH_F);
        dos.write(AV_SCRATCH_F, (ec & 0xffff_ffc3) | (1 << 4) | (1 << 7));
        dos.write(MDEC_PIC_DC_THRESH, 0x4040_38aa);
        Ok(())
    }

    fn load_extended_firmware(&mut self, data: &[u8]) -> Result<()> {
        let region = self.ext_fw.as_mut().ok_or_else(|| {
            Error::ProtocolViolation("extended firmware before memory was reserved".to_string())
        })?;
        let len = data.len().min(region.len());
        region.as_mut_slice()[..len].copy_from_slice(&data[..len]);
        Ok(())
    }

    fn stop(&mut self, dma: &mut DmaPool) -> Result<()> {
        release_all(
            dma,
            [
                self.ref_mv.take(),
                self.ext_fw.take(),
                self.sei.take(),
                self.workspace.take(),
            ],
        )
    }

    fn on_interrupt(&mut self, regs: &mut dyn RegisterIo) -> IrqReport {
        let mut report = IrqReport::default();
        let status = regs.read(AV_SCRATCH_0);
        match status & CMD_MASK {
            CMD_SRC_CHANGE => self.source_change(regs, &mut report),
            CMD_FRAMES_READY => {
                self.frames_ready(regs, status, &mut report);
                regs.write(AV_SCRATCH_0, 0);
            }
            CMD_FATAL_ERROR => {
                error!("h264 decoder fatal error");
                report.fatal = true;
            }
            CMD_BAD_WIDTH | CMD_BAD_HEIGHT => {
                error!("h264 stream size unsupported ({:#x})", status);
                report.fatal = true;
            }
            _ => regs.write(AV_SCRATCH_0, 0),
        }

        // SEI data is not used.
        if regs.read(AV_SCRATCH_J) & SEI_DATA_READY != 0 {
            regs.write(AV_SCRATCH_J, 0);
        }
        regs.write(ASSIST_MBOX1_CLR_REG, 1);
        report
    }

    fn can_recycle(&self, regs: &dyn RegisterIo) -> bool {
        regs.read(AV_SCRATCH_7) == 0 || regs.read(AV_SCRATCH_8) == 0
    }

    fn recycle(&mut self, regs: &mut dyn RegisterIo, index: u8) {
        // Either slot works; use the first empty one.
        if regs.read(AV_SCRATCH_7) == 0 {
            regs.write(AV_SCRATCH_7, index as u32 + 1);
        } else {
            regs.write(AV_SCRATCH_8, index as u32 + 1);
        }
    }
}

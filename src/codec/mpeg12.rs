// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! MPEG-1 and MPEG-2 video.

use log::error;

use super::release_all;
use super::CodecOps;
use super::DecodedFrame;
use super::IrqReport;
use super::StartContext;
use super::StreamLayout;
use crate::dma::DmaPool;
use crate::dma::DmaRegion;
use crate::dos::*;
use crate::error::Result;
use crate::mmio::RegisterIo;

const SIZE_WORKSPACE: u64 = 128 * 1024;
/// Closed caption buffer at the start of the workspace.
const SIZE_CCBUF: u32 = 4 * 1024;

const MREG_BUFFERIN: u32 = AV_SCRATCH_8;
const MREG_BUFFEROUT: u32 = AV_SCRATCH_9;
const MREG_CMD: u32 = AV_SCRATCH_A;
const MREG_CO_MV_START: u32 = AV_SCRATCH_B;
const MREG_ERROR_COUNT: u32 = AV_SCRATCH_C;
const MREG_WAIT_BUFFER: u32 = AV_SCRATCH_E;
const MREG_FATAL_ERROR: u32 = AV_SCRATCH_F;

/// Any of BUFFEROUT bits 17..23 set: the event carries no frame.
const BUFFEROUT_SKIP: u32 = 0x00fe_0000;

const CANVAS_TARGETS: &[(u32, u32)] = &[(AV_SCRATCH_0, 8)];

#[derive(Default)]
pub struct Mpeg12Codec {
    workspace: Option<DmaRegion>,
}

/// Output buffer index encoded in a BUFFEROUT value, or `None` if the event carries no frame.
fn output_index(out: u32) -> Option<u8> {
    if out == 0 || out & BUFFEROUT_SKIP != 0 {
        return None;
    }
    Some(((out & 0xf).wrapping_sub(1) & 0x7) as u8)
}

impl CodecOps for Mpeg12Codec {
    fn reserve(&mut self, dma: &mut DmaPool, _layout: &StreamLayout) -> Result<()> {
        if self.workspace.is_none() {
            self.workspace = Some(dma.allocate(
                SIZE_WORKSPACE + SIZE_CCBUF as u64,
                0x1000,
                "mpeg12 workspace",
            )?);
        }
        Ok(())
    }

    fn start(&mut self, ctx: &mut StartContext) -> Result<()> {
        let layout = ctx.layout();
        self.reserve(ctx.dma, &layout)?;
        let workspace = match &self.workspace {
            Some(w) => w.addr(),
            None => 0,
        };
        ctx.set_canvases(CANVAS_TARGETS)?;

        let (width, height) = (ctx.width, ctx.height);
        let dos = &mut *ctx.dos;
        dos.write(POWER_CTL_VLD, 1 << 4);
        dos.write(MREG_CO_MV_START, workspace + SIZE_CCBUF);
        dos.write(MPEG1_2_REG, 0);
        dos.write(PSCALE_CTRL, 0);
        dos.write(PIC_HEAD_INFO, 0x380);
        dos.write(M4_CONTROL_REG, 0);
        dos.write(MREG_BUFFERIN, 0);
        dos.write(MREG_BUFFEROUT, 0);
        dos.write(MREG_CMD, (width << 16) | height);
        dos.write(MREG_ERROR_COUNT, 0);
        dos.write(MREG_FATAL_ERROR, 0);
        dos.write(MREG_WAIT_BUFFER, 0);
        Ok(())
    }

    fn stop(&mut self, dma: &mut DmaPool) -> Result<()> {
        release_all(dma, [self.workspace.take()])
    }

    fn on_interrupt(&mut self, regs: &mut dyn RegisterIo) -> IrqReport {
        let mut report = IrqReport::default();
        if regs.read(MREG_FATAL_ERROR) == 1 {
            error!("mpeg1/2 fatal error");
            report.fatal = true;
        } else {
            let out = regs.read(MREG_BUFFEROUT);
            if out != 0 {
                if let Some(index) = output_index(out) {
                    report.push_frame(DecodedFrame {
                        index,
                        corrupted: false,
                    });
                }
                regs.write(MREG_BUFFEROUT, 0);
            }
        }
        regs.write(ASSIST_MBOX1_CLR_REG, 1);
        report
    }

    fn can_recycle(&self, regs: &dyn RegisterIo) -> bool {
        regs.read(MREG_BUFFERIN) == 0
    }

    fn recycle(&mut self, regs: &mut dyn RegisterIo, index: u8) {
        regs.write(MREG_BUFFERIN, index as u32 + 1);
    }
}

// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! MPEG-4 part 2, H.263 and XVID.

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

const SIZE_WORKSPACE: u64 = 1 << 20;
/// Address the firmware assumes its DC/AC prediction buffer starts at.
const DCAC_BUFF_START_IP: u32 = 0x02b0_0000;

const MREG_BUFFERIN: u32 = AV_SCRATCH_8;
const MREG_BUFFEROUT: u32 = AV_SCRATCH_9;
const MP4_NOT_CODED_CNT: u32 = AV_SCRATCH_A;
const MEM_OFFSET_REG: u32 = AV_SCRATCH_F;
const MREG_FATAL_ERROR: u32 = AV_SCRATCH_L;

const CANVAS_TARGETS: &[(u32, u32)] = &[(AV_SCRATCH_0, 4), (AV_SCRATCH_G, 4)];

/// Value written into BUFFERIN to hand buffer `index` back: every bit set except the buffer's.
pub fn recycle_mask(index: u8) -> u32 {
    debug_assert!(index < 8);
    !(1u32 << index)
}

#[derive(Default)]
pub struct Mpeg4Codec {
    workspace: Option<DmaRegion>,
}

impl CodecOps for Mpeg4Codec {
    fn reserve(&mut self, dma: &mut DmaPool, _layout: &StreamLayout) -> Result<()> {
        if self.workspace.is_none() {
            self.workspace = Some(dma.allocate(SIZE_WORKSPACE, 0x1000, "mpeg4 workspace")?);
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

        let dos = &mut *ctx.dos;
        dos.write(POWER_CTL_VLD, (1 << 7) | (1 << 6));
        dos.write(MEM_OFFSET_REG, workspace.wrapping_sub(DCAC_BUFF_START_IP));
        dos.write(PSCALE_CTRL, 0);
        dos.write(MP4_NOT_CODED_CNT, 0);
        dos.write(MREG_BUFFERIN, 0);
        dos.write(MREG_BUFFEROUT, 0);
        dos.write(MREG_FATAL_ERROR, 0);
        dos.write(MDEC_PIC_DC_THRESH, 0x4040_38aa);
        Ok(())
    }

    fn stop(&mut self, dma: &mut DmaPool) -> Result<()> {
        release_all(dma, [self.workspace.take()])
    }

    fn on_interrupt(&mut self, regs: &mut dyn RegisterIo) -> IrqReport {
        let mut report = IrqReport::default();
        if regs.read(MREG_FATAL_ERROR) == 1 {
            error!("mpeg4 fatal error");
            report.fatal = true;
        }
        // A frame may complete in the same event as the fault.
        let out = regs.read(MREG_BUFFEROUT);
        if out != 0 {
            report.push_frame(DecodedFrame {
                index: (out & 0x7) as u8,
                corrupted: false,
            });
            // Re-arm for the next frame.
            regs.write(MREG_BUFFEROUT, 0);
        }
        regs.write(ASSIST_MBOX1_CLR_REG, 1);
        report
    }

    fn can_recycle(&self, regs: &dyn RegisterIo) -> bool {
        regs.read(MREG_BUFFERIN) == 0
    }

    fn recycle(&mut self, regs: &mut dyn RegisterIo, index: u8) {
        regs.write(MREG_BUFFERIN, recycle_mask(index));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::FrameBuffer;
    use crate::format::PixelFormat;
    use crate::register_space::AccessLog;
    use crate::register_space::RegisterSpace;

    fn dos() -> RegisterSpace {
        let mut dos = RegisterSpace::new();
        dos.add_register_array(&register_array!(
            name: "av_scratch",
            cnt: AV_SCRATCH_COUNT,
            base_offset: AV_SCRATCH_0,
            stride: 4,
            reset_value: 0,
        ));
        dos.add_register(register!(
            name: "assist_mbox1_clr",
            offset: ASSIST_MBOX1_CLR_REG,
            reset_value: 0,
        ));
        dos
    }

    #[test]
    fn inverted_mask() {
        assert_eq!(recycle_mask(0), 0xffff_fffe);
        assert_eq!(recycle_mask(3), 0xffff_fff7);
        assert_eq!(recycle_mask(7), 0xffff_ff7f);
        for i in 0..8 {
            assert_eq!((!recycle_mask(i)).count_ones(), 1);
            assert_eq!((!recycle_mask(i)).trailing_zeros(), i as u32);
        }
    }

    #[test]
    fn start_programs_baseline() {
        let mut dos = dos();
        dos.write(MREG_BUFFERIN, 0x55);
        dos.write(MREG_FATAL_ERROR, 1);
        let mut dmc = RegisterSpace::new();
        let mut dma = DmaPool::new(0x1000_0000, 0x20_0000).unwrap();
        let frames: Vec<FrameBuffer> = (0..8u32)
            .map(|i| {
                FrameBuffer::new(vec![0x2000_0000 + i * 0x40_0000, 0x2030_0000 + i * 0x40_0000])
            })
            .collect();
        let indices: Vec<u8> = (10..26).collect();
        let mut codec = Mpeg4Codec::default();
        codec
            .start(&mut StartContext {
                dos: &mut dos,
                dmc: &mut dmc,
                dma: &mut dma,
                canvas_indices: &indices,
                frames: &frames,
                output_format: PixelFormat::NV12,
                width: 1920,
                height: 1080,
            })
            .unwrap();

        for reg in [MREG_BUFFERIN, MREG_BUFFEROUT, MREG_FATAL_ERROR, MP4_NOT_CODED_CNT] {
            assert_eq!(dos.read(reg), 0, "{:#x}", reg);
        }
        assert_eq!(dos.read(MEM_OFFSET_REG), 0x1000_0000 - DCAC_BUFF_START_IP);
        assert_eq!(dos.read(AV_SCRATCH_0), 0x000b_0b0a);
        assert_eq!(dos.read(AV_SCRATCH_3), 0x0011_1110);
        assert_eq!(dos.read(AV_SCRATCH_G), 0x0013_1312);
        assert_eq!(dos.read(AV_SCRATCH_J), 0x0019_1918);
        assert_eq!(dma.allocated_bytes(), SIZE_WORKSPACE);

        codec.stop(&mut dma).unwrap();
        assert_eq!(dma.allocated_bytes(), 0);
        // Second stop has nothing left to release.
        codec.stop(&mut dma).unwrap();
    }

    #[test]
    fn start_fails_without_memory() {
        let log = AccessLog::new();
        let mut dos = dos();
        dos.set_access_log(log.clone());
        let mut dmc = RegisterSpace::new();
        dmc.set_access_log(log.clone());
        let mut dma = DmaPool::new(0x1000_0000, 0x8_0000).unwrap();
        let mut codec = Mpeg4Codec::default();
        let result = codec.start(&mut StartContext {
            dos: &mut dos,
            dmc: &mut dmc,
            dma: &mut dma,
            canvas_indices: &[],
            frames: &[],
            output_format: PixelFormat::NV12,
            width: 1920,
            height: 1080,
        });
        assert!(result.unwrap_err().is_retryable());
        assert!(log.is_empty());
        codec.stop(&mut dma).unwrap();
    }

    #[test]
    fn interrupt_reports_buffer_and_acks_last() {
        let log = AccessLog::new();
        let mut dos = dos();
        dos.set_access_log(log.clone());
        let device = dos.register(MREG_BUFFEROUT).unwrap();
        device.set_value(3);

        let mut codec = Mpeg4Codec::default();
        let report = codec.on_interrupt(&mut dos);
        assert_eq!(
            report.frames(),
            &[DecodedFrame {
                index: 3,
                corrupted: false
            }]
        );
        assert!(!report.fatal);
        assert_eq!(device.get_value(), 0);

        let writes = log.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[1].offset, ASSIST_MBOX1_CLR_REG);
        assert_eq!(writes[1].value, 1);
    }

    #[test]
    fn interrupt_without_status_still_acks() {
        let log = AccessLog::new();
        let mut dos = dos();
        dos.set_access_log(log.clone());
        let mut codec = Mpeg4Codec::default();
        let report = codec.on_interrupt(&mut dos);
        assert!(report.frames().is_empty());
        let writes = log.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].offset, ASSIST_MBOX1_CLR_REG);
    }

    #[test]
    fn fatal_error() {
        let log = AccessLog::new();
        let mut dos = dos();
        dos.set_access_log(log.clone());
        dos.register(MREG_FATAL_ERROR).unwrap().set_value(1);
        let mut codec = Mpeg4Codec::default();
        let report = codec.on_interrupt(&mut dos);
        assert!(report.fatal);
        let writes = log.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].offset, ASSIST_MBOX1_CLR_REG);
    }

    #[test]
    fn fatal_error_with_completed_frame() {
        let log = AccessLog::new();
        let mut dos = dos();
        dos.set_access_log(log.clone());
        dos.register(MREG_FATAL_ERROR).unwrap().set_value(1);
        let out = dos.register(MREG_BUFFEROUT).unwrap();
        out.set_value(3);
        let mut codec = Mpeg4Codec::default();
        let report = codec.on_interrupt(&mut dos);
        assert!(report.fatal);
        assert_eq!(
            report.frames(),
            &[DecodedFrame {
                index: 3,
                corrupted: false
            }]
        );
        assert_eq!(out.get_value(), 0);
        let writes = log.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].offset, MREG_BUFFEROUT);
        assert_eq!(writes[1].offset, ASSIST_MBOX1_CLR_REG);
    }

    #[test]
    fn recycle_protocol() {
        let mut dos = dos();
        let mut codec = Mpeg4Codec::default();
        assert!(codec.can_recycle(&dos));
        codec.recycle(&mut dos, 5);
        assert_eq!(dos.read(MREG_BUFFERIN), 0xffff_ffdf);
        assert!(!codec.can_recycle(&dos));
        // Firmware consumes the request.
        dos.register(MREG_BUFFERIN).unwrap().set_value(0);
        assert!(codec.can_recycle(&dos));
    }
}

// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! A software model of the decode engine's register windows.
//!
//! The model implements just enough device behaviour for the driver to run against it: IMEM DMA
//! completes immediately (unless told to hang), the input FIFO read pointer follows its start
//! pointer, and canvas writes are latched into a table. Firmware behaviour is scripted by the
//! caller through the `signal_*` helpers.

use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::codec::CodecFamily;
use crate::config::EngineConfig;
use crate::dos::*;
use crate::engine::VdecCore;
use crate::error::Result;
use crate::mmio::RegisterOffset;
use crate::register_space::AccessLog;
use crate::register_space::Register;
use crate::register_space::RegisterSpace;

const DOS_REGISTERS: &[(&str, RegisterOffset)] = &[
    ("vdec_assist_amr1_int8", VDEC_ASSIST_AMR1_INT8),
    ("assist_mbox1_clr_reg", ASSIST_MBOX1_CLR_REG),
    ("assist_mbox1_mask", ASSIST_MBOX1_MASK),
    ("mpsr", MPSR),
    ("cpsr", CPSR),
    ("imem_dma_ctrl", IMEM_DMA_CTRL),
    ("imem_dma_adr", IMEM_DMA_ADR),
    ("imem_dma_count", IMEM_DMA_COUNT),
    ("pscale_ctrl", PSCALE_CTRL),
    ("gclk_en", GCLK_EN),
    ("mdec_pic_dc_ctrl", MDEC_PIC_DC_CTRL),
    ("mdec_pic_dc_thresh", MDEC_PIC_DC_THRESH),
    ("mpeg1_2_reg", MPEG1_2_REG),
    ("pic_head_info", PIC_HEAD_INFO),
    ("power_ctl_vld", POWER_CTL_VLD),
    ("m4_control_reg", M4_CONTROL_REG),
    ("vld_mem_vififo_start_ptr", VLD_MEM_VIFIFO_START_PTR),
    ("vld_mem_vififo_curr_ptr", VLD_MEM_VIFIFO_CURR_PTR),
    ("vld_mem_vififo_end_ptr", VLD_MEM_VIFIFO_END_PTR),
    ("vld_mem_vififo_control", VLD_MEM_VIFIFO_CONTROL),
    ("vld_mem_vififo_wp", VLD_MEM_VIFIFO_WP),
    ("vld_mem_vififo_rp", VLD_MEM_VIFIFO_RP),
    ("vld_mem_vififo_level", VLD_MEM_VIFIFO_LEVEL),
    ("vld_mem_vififo_buf_cntl", VLD_MEM_VIFIFO_BUF_CNTL),
    ("vld_mem_vififo_wrap_count", VLD_MEM_VIFIFO_WRAP_COUNT),
    ("dos_sw_reset0", DOS_SW_RESET0),
    ("dos_gclk_en0", DOS_GCLK_EN0),
    ("dos_mem_pd_vdec", DOS_MEM_PD_VDEC),
    ("dos_vdec_mcrcc_stall_ctrl", DOS_VDEC_MCRCC_STALL_CTRL),
];

const DMC_REGISTERS: &[(&str, RegisterOffset)] = &[
    ("dmc_cav_lut_datal", DMC_CAV_LUT_DATAL),
    ("dmc_cav_lut_datah", DMC_CAV_LUT_DATAH),
    ("dmc_cav_lut_addr", DMC_CAV_LUT_ADDR),
];

const CANVAS_WRITE: u32 = 1 << 9;

fn registers(named: &[(&str, RegisterOffset)]) -> Vec<Register> {
    named
        .iter()
        .map(|(name, offset)| {
            register!(
                name: *name,
                offset: *offset,
                reset_value: 0,
            )
        })
        .collect()
}

/// Emulated DOS and DMC register files. Windows handed out by `dos_window` and `dmc_window` share
/// their registers with the model, so the caller can play the firmware's part.
pub struct EmulatedEngine {
    dos: BTreeMap<RegisterOffset, Register>,
    dmc: BTreeMap<RegisterOffset, Register>,
    log: AccessLog,
    imem_hang: Arc<AtomicBool>,
    /// Canvas table: index to (DATAL, DATAH).
    canvases: Arc<Mutex<BTreeMap<u8, (u32, u32)>>>,
}

impl Default for EmulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EmulatedEngine {
    pub fn new() -> Self {
        let mut dos: BTreeMap<RegisterOffset, Register> = BTreeMap::new();
        let scratch = register_array!(
            name: "av_scratch",
            cnt: AV_SCRATCH_COUNT,
            base_offset: AV_SCRATCH_0,
            stride: 4,
            reset_value: 0,
        );
        let anc = register_array!(
            name: "anc_canvas_addr",
            cnt: 24u32,
            base_offset: ANC0_CANVAS_ADDR,
            stride: 4,
            reset_value: 0,
        );
        for reg in registers(DOS_REGISTERS).into_iter().chain(scratch).chain(anc) {
            dos.insert(reg.offset(), reg);
        }
        let dmc: BTreeMap<RegisterOffset, Register> = registers(DMC_REGISTERS)
            .into_iter()
            .map(|reg| (reg.offset(), reg))
            .collect();

        let engine = EmulatedEngine {
            dos,
            dmc,
            log: AccessLog::new(),
            imem_hang: Arc::new(AtomicBool::new(false)),
            canvases: Arc::new(Mutex::new(BTreeMap::new())),
        };
        engine.wire();
        engine
    }

    fn dos_reg(&self, offset: RegisterOffset) -> Register {
        // Every offset used here is in DOS_REGISTERS or the scratch array.
        match self.dos.get(&offset) {
            Some(reg) => reg.clone(),
            None => register!(name: "unmapped", offset: offset, reset_value: 0,),
        }
    }

    fn dmc_reg(&self, offset: RegisterOffset) -> Register {
        match self.dmc.get(&offset) {
            Some(reg) => reg.clone(),
            None => register!(name: "unmapped", offset: offset, reset_value: 0,),
        }
    }

    fn wire(&self) {
        let hang = self.imem_hang.clone();
        self.dos_reg(IMEM_DMA_CTRL).set_write_cb(move |value| {
            if hang.load(Ordering::SeqCst) {
                value
            } else {
                value & !IMEM_DMA_BUSY
            }
        });

        let curr = self.dos_reg(VLD_MEM_VIFIFO_CURR_PTR);
        let rp = self.dos_reg(VLD_MEM_VIFIFO_RP);
        self.dos_reg(VLD_MEM_VIFIFO_START_PTR)
            .set_write_cb(move |value| {
                curr.set_value(value);
                rp.set_value(value);
                value
            });

        let datal = self.dmc_reg(DMC_CAV_LUT_DATAL);
        let datah = self.dmc_reg(DMC_CAV_LUT_DATAH);
        let canvases = self.canvases.clone();
        self.dmc_reg(DMC_CAV_LUT_ADDR).set_write_cb(move |value| {
            if value & CANVAS_WRITE != 0 {
                canvases
                    .lock()
                    .insert(value as u8, (datal.get_value(), datah.get_value()));
            }
            value
        });
    }

    fn window(&self, regs: &BTreeMap<RegisterOffset, Register>) -> RegisterSpace {
        let mut space = RegisterSpace::new();
        for reg in regs.values() {
            space.add_register(reg.clone());
        }
        space.set_access_log(self.log.clone());
        space
    }

    /// A DOS window backed by the model. Accesses are recorded in `log`.
    pub fn dos_window(&self) -> RegisterSpace {
        self.window(&self.dos)
    }

    /// A DMC window backed by the model. Accesses are recorded in `log`.
    pub fn dmc_window(&self) -> RegisterSpace {
        self.window(&self.dmc)
    }

    /// Accesses made through every window, in order.
    pub fn log(&self) -> &AccessLog {
        &self.log
    }

    /// Attaches a `VdecCore` to fresh windows of this model.
    pub fn core(&self, config: EngineConfig) -> Result<Arc<VdecCore>> {
        VdecCore::new(
            config,
            Box::new(self.dos_window()),
            Box::new(self.dmc_window()),
        )
    }

    /// Shared handle to the DOS register at `offset`.
    pub fn register(&self, offset: RegisterOffset) -> Option<Register> {
        self.dos.get(&offset).cloned()
    }

    /// Device-side read of a DOS register. Not logged.
    pub fn get(&self, offset: RegisterOffset) -> u32 {
        self.dos.get(&offset).map_or(0, Register::get_value)
    }

    /// Device-side write of a DOS register. Not logged and no callback runs.
    pub fn set(&self, offset: RegisterOffset, value: u32) {
        if let Some(reg) = self.dos.get(&offset) {
            reg.set_value(value);
        }
    }

    /// Makes IMEM DMA transfers never complete.
    pub fn set_imem_hang(&self, hang: bool) {
        self.imem_hang.store(hang, Ordering::SeqCst);
    }

    /// The engine parsed everything written so far.
    pub fn consume_input(&self) {
        self.set(VLD_MEM_VIFIFO_RP, self.get(VLD_MEM_VIFIFO_WP));
    }

    /// Canvas data words latched for `index`.
    pub fn canvas(&self, index: u8) -> Option<(u32, u32)> {
        self.canvases.lock().get(&index).copied()
    }

    /// Firmware side: a frame was decoded into output buffer `index`.
    pub fn signal_frame(&self, family: CodecFamily, index: u8) {
        match family {
            // Upper bits carry the picture type.
            CodecFamily::Mpeg4 => self.set(AV_SCRATCH_9, 1 << 8 | index as u32),
            CodecFamily::Mpeg12 => self.set(AV_SCRATCH_9, index as u32 + 1),
            CodecFamily::H264 => {
                self.set(AV_SCRATCH_1, index as u32);
                self.set(AV_SCRATCH_0, 1 << 8 | 2);
            }
        }
    }

    /// Firmware side: decoding failed beyond recovery.
    pub fn signal_fatal(&self, family: CodecFamily) {
        match family {
            CodecFamily::Mpeg4 => self.set(AV_SCRATCH_L, 1),
            CodecFamily::Mpeg12 => self.set(AV_SCRATCH_F, 1),
            CodecFamily::H264 => self.set(AV_SCRATCH_0, 6),
        }
    }

    /// Firmware side (H.264): the sequence header of a `mb_width` x `mb_height` macroblock
    /// stream needing `max_refs` reference frames was parsed.
    pub fn signal_source_change(&self, mb_width: u32, mb_height: u32, max_refs: u32) {
        self.set(
            AV_SCRATCH_1,
            max_refs << 24 | (mb_width * mb_height) << 8 | mb_width,
        );
        self.set(AV_SCRATCH_6, 0);
        self.set(AV_SCRATCH_0, 1);
    }

    /// Firmware side: every recycled buffer was taken back.
    pub fn accept_recycles(&self, family: CodecFamily) {
        match family {
            CodecFamily::Mpeg4 | CodecFamily::Mpeg12 => self.set(AV_SCRATCH_8, 0),
            CodecFamily::H264 => {
                self.set(AV_SCRATCH_7, 0);
                self.set(AV_SCRATCH_8, 0);
            }
        }
    }
}

// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Byte offsets of the registers the driver touches in the DOS decoder window and the DMC canvas
//! window.

use crate::mmio::RegisterOffset;

pub const VDEC_ASSIST_AMR1_INT8: RegisterOffset = 0x00b4;
pub const ASSIST_MBOX1_CLR_REG: RegisterOffset = 0x01d4;
pub const ASSIST_MBOX1_MASK: RegisterOffset = 0x01d8;

pub const MPSR: RegisterOffset = 0x0c04;
pub const CPSR: RegisterOffset = 0x0c84;

pub const IMEM_DMA_CTRL: RegisterOffset = 0x0d00;
pub const IMEM_DMA_ADR: RegisterOffset = 0x0d04;
pub const IMEM_DMA_COUNT: RegisterOffset = 0x0d08;
/// Set by software to start an IMEM transfer; the engine clears it when done.
pub const IMEM_DMA_BUSY: u32 = 1 << 15;

pub const PSCALE_CTRL: RegisterOffset = 0x2444;
pub const GCLK_EN: RegisterOffset = 0x260c;
pub const MDEC_PIC_DC_CTRL: RegisterOffset = 0x2638;
pub const ANC0_CANVAS_ADDR: RegisterOffset = 0x2640;
pub const MDEC_PIC_DC_THRESH: RegisterOffset = 0x26e0;

pub const AV_SCRATCH_0: RegisterOffset = 0x2700;
pub const AV_SCRATCH_1: RegisterOffset = 0x2704;
pub const AV_SCRATCH_2: RegisterOffset = 0x2708;
pub const AV_SCRATCH_3: RegisterOffset = 0x270c;
pub const AV_SCRATCH_4: RegisterOffset = 0x2710;
pub const AV_SCRATCH_5: RegisterOffset = 0x2714;
pub const AV_SCRATCH_6: RegisterOffset = 0x2718;
pub const AV_SCRATCH_7: RegisterOffset = 0x271c;
pub const AV_SCRATCH_8: RegisterOffset = 0x2720;
pub const AV_SCRATCH_9: RegisterOffset = 0x2724;
pub const AV_SCRATCH_A: RegisterOffset = 0x2728;
pub const AV_SCRATCH_B: RegisterOffset = 0x272c;
pub const AV_SCRATCH_C: RegisterOffset = 0x2730;
pub const AV_SCRATCH_D: RegisterOffset = 0x2734;
pub const AV_SCRATCH_E: RegisterOffset = 0x2738;
pub const AV_SCRATCH_F: RegisterOffset = 0x273c;
pub const AV_SCRATCH_G: RegisterOffset = 0x2740;
pub const AV_SCRATCH_H: RegisterOffset = 0x2744;
pub const AV_SCRATCH_I: RegisterOffset = 0x2748;
pub const AV_SCRATCH_J: RegisterOffset = 0x274c;
pub const AV_SCRATCH_K: RegisterOffset = 0x2750;
pub const AV_SCRATCH_L: RegisterOffset = 0x2754;
/// Number of consecutive AV_SCRATCH registers (0..9, A..L).
pub const AV_SCRATCH_COUNT: u32 = 22;

pub const MPEG1_2_REG: RegisterOffset = 0x3004;
pub const PIC_HEAD_INFO: RegisterOffset = 0x300c;
pub const POWER_CTL_VLD: RegisterOffset = 0x3020;
pub const M4_CONTROL_REG: RegisterOffset = 0x30a4;

pub const VLD_MEM_VIFIFO_START_PTR: RegisterOffset = 0x3100;
pub const VLD_MEM_VIFIFO_CURR_PTR: RegisterOffset = 0x3104;
pub const VLD_MEM_VIFIFO_END_PTR: RegisterOffset = 0x3108;
pub const VLD_MEM_VIFIFO_CONTROL: RegisterOffset = 0x3110;
pub const VLD_MEM_VIFIFO_WP: RegisterOffset = 0x3114;
pub const VLD_MEM_VIFIFO_RP: RegisterOffset = 0x3118;
pub const VLD_MEM_VIFIFO_LEVEL: RegisterOffset = 0x311c;
pub const VLD_MEM_VIFIFO_BUF_CNTL: RegisterOffset = 0x3120;
pub const VLD_MEM_VIFIFO_WRAP_COUNT: RegisterOffset = 0x3134;

pub const DOS_SW_RESET0: RegisterOffset = 0xfc00;
pub const DOS_GCLK_EN0: RegisterOffset = 0xfc04;
pub const DOS_MEM_PD_VDEC: RegisterOffset = 0xfcc0;
pub const DOS_VDEC_MCRCC_STALL_CTRL: RegisterOffset = 0xfd00;

/// Size of the DOS register window.
pub const DOS_WINDOW_SIZE: usize = 0x10000;

pub const DMC_CAV_LUT_DATAL: RegisterOffset = 0x48;
pub const DMC_CAV_LUT_DATAH: RegisterOffset = 0x4c;
pub const DMC_CAV_LUT_ADDR: RegisterOffset = 0x50;

/// Size of the DMC register window.
pub const DMC_WINDOW_SIZE: usize = 0x100;

/// Offset of the `index`th AV_SCRATCH register.
pub const fn av_scratch(index: u32) -> RegisterOffset {
    AV_SCRATCH_0 + 4 * index
}

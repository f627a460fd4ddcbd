// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Register sequences of the VDEC1 decode block: the generation used by every format the registry
//! knows about.

use log::debug;
use log::error;

use crate::dma::DmaRegion;
use crate::dos::*;
use crate::error::Error;
use crate::error::Result;
use crate::firmware::Firmware;
use crate::firmware::MC_SIZE;
use crate::mmio::RegisterIo;

const MEM_BUFCTRL_MANUAL: u32 = 1 << 1;
const MEM_CTRL_FILL_EN: u32 = 1 << 1;
const MEM_CTRL_EMPTY_EN: u32 = 1 << 2;
const MEM_FILL_ON_LEVEL: u32 = 1 << 10;
const MEM_FIFO_CNT_BIT: u32 = 16;

const IMEM_DMA_START: u32 = IMEM_DMA_BUSY | (7 << 16);

/// Selects two-plane output in the picture writer.
const DC_CTRL_NV12: u32 = 1 << 17;
const DC_CTRL_MC_READ: u32 = 1 << 31;

/// Takes the block out of reset and powers its memories.
pub fn power_up(dos: &mut dyn RegisterIo) {
    dos.write(DOS_SW_RESET0, 0xffff_fffc);
    dos.write(DOS_SW_RESET0, 0);
    dos.write(DOS_GCLK_EN0, 0x3ff);
    dos.write(DOS_MEM_PD_VDEC, 0);
    dos.write(DOS_VDEC_MCRCC_STALL_CTRL, 0);
    dos.write(GCLK_EN, 0x3ff);
    dos.clear_bits(MDEC_PIC_DC_CTRL, DC_CTRL_MC_READ);
}

/// Points the input FIFO at `vififo` and arms it. The write pointer starts at the base.
pub fn init_input(dos: &mut dyn RegisterIo, vififo: &DmaRegion) {
    let base = vififo.addr();
    let size = vififo.len() as u32;
    dos.write(VLD_MEM_VIFIFO_CONTROL, 0);
    dos.write(VLD_MEM_VIFIFO_WRAP_COUNT, 0);
    dos.write(POWER_CTL_VLD, 1 << 4);

    dos.write(VLD_MEM_VIFIFO_START_PTR, base);
    dos.write(VLD_MEM_VIFIFO_CURR_PTR, base);
    dos.write(VLD_MEM_VIFIFO_END_PTR, base + size - 8);

    dos.set_bits(VLD_MEM_VIFIFO_CONTROL, 1);
    dos.clear_bits(VLD_MEM_VIFIFO_CONTROL, 1);

    dos.write(VLD_MEM_VIFIFO_BUF_CNTL, MEM_BUFCTRL_MANUAL);
    dos.write(VLD_MEM_VIFIFO_WP, base);

    dos.set_bits(VLD_MEM_VIFIFO_BUF_CNTL, 1);
    dos.clear_bits(VLD_MEM_VIFIFO_BUF_CNTL, 1);

    dos.set_bits(
        VLD_MEM_VIFIFO_CONTROL,
        (0x11 << MEM_FIFO_CNT_BIT) | MEM_FILL_ON_LEVEL | MEM_CTRL_FILL_EN | MEM_CTRL_EMPTY_EN,
    );
}

/// Pushes the instruction memory image of `firmware` into the engine through `bounce`, then
/// polls the DMA for at most `poll_limit` reads.
pub fn load_firmware(
    dos: &mut dyn RegisterIo,
    bounce: &mut DmaRegion,
    firmware: &Firmware,
    poll_limit: u32,
) -> Result<()> {
    let code = firmware.code();
    if bounce.len() < MC_SIZE || code.len() != MC_SIZE {
        return Err(Error::FirmwareLoadFailure {
            path: firmware.path().to_string(),
            reason: format!("image is {} bytes, expected {}", code.len(), MC_SIZE),
        });
    }
    bounce.as_mut_slice()[..MC_SIZE].copy_from_slice(code);

    dos.write(MPSR, 0);
    dos.write(CPSR, 0);
    dos.clear_bits(MDEC_PIC_DC_CTRL, DC_CTRL_MC_READ);

    dos.write(IMEM_DMA_ADR, bounce.addr());
    dos.write(IMEM_DMA_COUNT, (MC_SIZE / 4) as u32);
    dos.write(IMEM_DMA_CTRL, IMEM_DMA_START);

    for polls in 1..=poll_limit {
        if dos.read(IMEM_DMA_CTRL) & IMEM_DMA_BUSY == 0 {
            debug!("firmware {} loaded after {} polls", firmware.path(), polls);
            return Ok(());
        }
    }
    error!("firmware {}: IMEM DMA still busy", firmware.path());
    Err(Error::FirmwareLoadFailure {
        path: firmware.path().to_string(),
        reason: "DMA hang".to_string(),
    })
}

/// Unmasks the mailbox interrupt, selects the output layout and lets the firmware run.
pub fn enable(dos: &mut dyn RegisterIo, two_plane: bool) {
    dos.write(ASSIST_MBOX1_CLR_REG, 1);
    dos.write(ASSIST_MBOX1_MASK, 1);
    if two_plane {
        dos.set_bits(MDEC_PIC_DC_CTRL, DC_CTRL_NV12);
    } else {
        dos.clear_bits(MDEC_PIC_DC_CTRL, DC_CTRL_NV12);
    }
    dos.write(MPSR, 1);
}

/// Halts the firmware, masks its interrupt and powers the block down.
pub fn stop(dos: &mut dyn RegisterIo) {
    dos.write(MPSR, 0);
    dos.write(CPSR, 0);
    dos.write(ASSIST_MBOX1_MASK, 0);

    dos.write(DOS_SW_RESET0, (1 << 12) | (1 << 11));
    dos.write(DOS_SW_RESET0, 0);
    // Flush.
    dos.read(DOS_SW_RESET0);

    dos.write(DOS_MEM_PD_VDEC, 0xffff_ffff);
}

pub fn ack(dos: &mut dyn RegisterIo) {
    dos.write(ASSIST_MBOX1_CLR_REG, 1);
}

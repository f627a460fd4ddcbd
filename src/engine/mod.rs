// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The decode engine shared by every session: register windows, DMA memory, canvas indices and
//! the interrupt entry point.

pub mod vdec1;

use std::sync::Arc;

use log::info;
use log::warn;
use parking_lot::Mutex;
use parking_lot::MutexGuard;

use crate::canvas::CanvasAllocator;
use crate::config::EngineConfig;
use crate::dma::DmaPool;
use crate::dma::DmaRegion;
use crate::error::Error;
use crate::error::Result;
use crate::firmware::Firmware;
use crate::format::HwRevision;
use crate::format::PixelFormat;
use crate::mmio::RegisterIo;
use crate::registry;
use crate::registry::Capability;
use crate::session::Session;
use crate::session::SessionShared;

/// Register sequences of a hardware generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineOps {
    Vdec1,
}

impl EngineOps {
    pub fn power_up(self, dos: &mut dyn RegisterIo) {
        match self {
            EngineOps::Vdec1 => vdec1::power_up(dos),
        }
    }

    pub fn init_input(self, dos: &mut dyn RegisterIo, vififo: &DmaRegion) {
        match self {
            EngineOps::Vdec1 => vdec1::init_input(dos, vififo),
        }
    }

    pub fn load_firmware(
        self,
        dos: &mut dyn RegisterIo,
        bounce: &mut DmaRegion,
        firmware: &Firmware,
        poll_limit: u32,
    ) -> Result<()> {
        match self {
            EngineOps::Vdec1 => vdec1::load_firmware(dos, bounce, firmware, poll_limit),
        }
    }

    pub fn enable(self, dos: &mut dyn RegisterIo, two_plane: bool) {
        match self {
            EngineOps::Vdec1 => vdec1::enable(dos, two_plane),
        }
    }

    pub fn stop(self, dos: &mut dyn RegisterIo) {
        match self {
            EngineOps::Vdec1 => vdec1::stop(dos),
        }
    }

    pub fn ack(self, dos: &mut dyn RegisterIo) {
        match self {
            EngineOps::Vdec1 => vdec1::ack(dos),
        }
    }

    /// Generation of the decode block found on `revision`.
    pub fn for_revision(revision: HwRevision) -> Self {
        match revision {
            HwRevision::Gxbb | HwRevision::Gxl | HwRevision::Gxm => EngineOps::Vdec1,
        }
    }
}

/// Whether an interrupt belonged to a started session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IrqReturn {
    None,
    Handled,
}

/// Everything behind the engine's hardware lock.
pub(crate) struct EngineHw {
    pub dos: Box<dyn RegisterIo>,
    pub dmc: Box<dyn RegisterIo>,
    pub dma: DmaPool,
    pub canvases: CanvasAllocator,
    /// Path of the firmware currently in instruction memory.
    pub firmware: Option<String>,
}

/// One decode engine. At most one session runs on it at a time.
pub struct VdecCore {
    config: EngineConfig,
    hw: Mutex<EngineHw>,
    /// The started session, if any. Only ever locked on its own.
    active: Mutex<Option<Arc<SessionShared>>>,
}

impl VdecCore {
    /// Attaches to an engine whose DOS and DMC register windows are `dos` and `dmc`.
    pub fn new(
        config: EngineConfig,
        dos: Box<dyn RegisterIo>,
        dmc: Box<dyn RegisterIo>,
    ) -> Result<Arc<VdecCore>> {
        config.validate()?;
        let dma = DmaPool::new(config.dma_base, config.dma_size)?;
        info!(
            "vdec: {} engine, dma {:#x}+{:#x}",
            config.revision, config.dma_base, config.dma_size
        );
        Ok(Arc::new(VdecCore {
            config,
            hw: Mutex::new(EngineHw {
                dos,
                dmc,
                dma,
                canvases: CanvasAllocator::new(),
                firmware: None,
            }),
            active: Mutex::new(None),
        }))
    }

    pub fn revision(&self) -> HwRevision {
        self.config.revision
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn query_capability(&self, format: PixelFormat) -> Result<Capability> {
        registry::resolve(self.config.revision, format).map(Capability::from)
    }

    pub fn capabilities(&self) -> Vec<Capability> {
        registry::capabilities(self.config.revision)
    }

    /// Creates an idle session decoding `format`.
    pub fn open_session(self: &Arc<Self>, format: PixelFormat) -> Result<Session> {
        let desc = registry::resolve(self.config.revision, format)?;
        Ok(Session::new(self.clone(), desc))
    }

    /// Interrupt entry point. Services the started session's completion, or only acknowledges
    /// the engine if there is none.
    pub fn handle_interrupt(&self) -> IrqReturn {
        let session = self.active.lock().clone();
        let mut hw = self.hw.lock();
        match session {
            Some(session) => {
                session.service_interrupt(&mut hw);
                IrqReturn::Handled
            }
            None => {
                warn!("vdec: interrupt without a started session");
                EngineOps::for_revision(self.config.revision).ack(&mut *hw.dos);
                IrqReturn::None
            }
        }
    }

    /// Path of the firmware currently loaded into the engine.
    pub fn loaded_firmware(&self) -> Option<String> {
        self.hw.lock().firmware.clone()
    }

    /// Bytes of DMA memory currently held by sessions.
    pub fn dma_allocated(&self) -> u64 {
        self.hw.lock().dma.allocated_bytes()
    }

    /// Tags of the live DMA allocations.
    pub fn dma_allocations(&self) -> Vec<String> {
        self.hw.lock().dma.allocations()
    }

    pub fn canvases_in_use(&self) -> usize {
        self.hw.lock().canvases.in_use()
    }

    pub fn has_active_session(&self) -> bool {
        self.active.lock().is_some()
    }

    pub(crate) fn hw(&self) -> MutexGuard<'_, EngineHw> {
        self.hw.lock()
    }

    /// Makes `session` the engine's started session.
    pub(crate) fn claim(&self, session: &Arc<SessionShared>) -> Result<()> {
        let mut active = self.active.lock();
        if active.is_some() {
            return Err(Error::EngineBusy);
        }
        *active = Some(session.clone());
        Ok(())
    }

    pub(crate) fn release(&self, session: &Arc<SessionShared>) {
        let mut active = self.active.lock();
        if matches!(&*active, Some(s) if Arc::ptr_eq(s, session)) {
            *active = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dos::ASSIST_MBOX1_CLR_REG;
    use crate::emulated::EmulatedEngine;

    #[test]
    fn rejects_bad_config() {
        let emu = EmulatedEngine::new();
        let config = EngineConfig {
            vififo_size: 100,
            ..Default::default()
        };
        assert!(matches!(
            VdecCore::new(
                config,
                Box::new(emu.dos_window()),
                Box::new(emu.dmc_window())
            ),
            Err(Error::InvalidParameter(_))
        ));
        let config = EngineConfig {
            dma_base: 0xffff_0000,
            ..Default::default()
        };
        assert!(matches!(
            VdecCore::new(
                config,
                Box::new(emu.dos_window()),
                Box::new(emu.dmc_window())
            ),
            Err(Error::ResourceExhausted(_))
        ));
    }

    #[test]
    fn spurious_interrupt_is_acked() {
        let emu = EmulatedEngine::new();
        let core = emu.core(EngineConfig::default()).unwrap();
        assert_eq!(core.handle_interrupt(), IrqReturn::None);
        let writes = emu.log().writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].offset, ASSIST_MBOX1_CLR_REG);
    }

    #[test]
    fn capability_queries() {
        let emu = EmulatedEngine::new();
        let config = EngineConfig {
            revision: HwRevision::Gxbb,
            ..Default::default()
        };
        let core = emu.core(config).unwrap();
        assert_eq!(core.revision(), HwRevision::Gxbb);
        let cap = core.query_capability(PixelFormat::Xvid).unwrap();
        assert_eq!(cap.output_formats, vec![PixelFormat::NV12, PixelFormat::YUV420]);
        assert!(matches!(
            core.query_capability(PixelFormat::YUV420),
            Err(Error::NotSupported { .. })
        ));
        assert_eq!(core.capabilities().len(), 6);
        assert!(core.open_session(PixelFormat::NV12).is_err());
        assert!(core.loaded_firmware().is_none());
        assert_eq!(core.dma_allocated(), 0);
    }

    #[test]
    fn single_claim() {
        let emu = EmulatedEngine::new();
        let core = emu.core(EngineConfig::default()).unwrap();
        let a = core.open_session(PixelFormat::Mpeg4).unwrap();
        let b = core.open_session(PixelFormat::H264).unwrap();
        core.claim(a.shared()).unwrap();
        assert!(matches!(core.claim(b.shared()), Err(Error::EngineBusy)));
        // Releasing a session that does not hold the engine changes nothing.
        core.release(b.shared());
        assert!(core.has_active_session());
        core.release(a.shared());
        assert!(!core.has_active_session());
        core.claim(b.shared()).unwrap();
        core.release(b.shared());
    }
}

// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! A decode session: the state machine a client drives to decode one stream on the engine.
//!
//! Locks are always taken in the order engine hardware, backend, session state, event queue.
//! The engine's active-session slot is never held together with any of them.

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use log::debug;
use log::error;
use log::info;
use log::warn;
use parking_lot::Mutex;

use crate::buffer::BufferState;
use crate::buffer::FrameBuffer;
use crate::buffer::OutputPool;
use crate::codec::CodecBackend;
use crate::codec::CodecOps;
use crate::codec::IrqReport;
use crate::codec::StartContext;
use crate::codec::StreamLayout;
use crate::dma::DmaRegion;
use crate::dos::VLD_MEM_VIFIFO_RP;
use crate::dos::VLD_MEM_VIFIFO_WP;
use crate::engine::EngineHw;
use crate::engine::EngineOps;
use crate::engine::VdecCore;
use crate::error::Error;
use crate::error::Result;
use crate::event::DecoderEvent;
use crate::event::EventQueue;
use crate::event::SyncEventQueue;
use crate::firmware::Firmware;
use crate::firmware::MC_SIZE;
use crate::format::PixelFormat;
use crate::registry::FormatDescriptor;

/// Space the engine keeps between its write and read pointers.
const VIFIFO_GUARD: u64 = 8;
const VIFIFO_ALIGN: u64 = 0x1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
    /// The engine reported a fatal fault. Only `stop` is accepted.
    Error,
}

/// Stream geometry and decoded pixel format of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionParams {
    pub width: u32,
    pub height: u32,
    pub output_format: PixelFormat,
}

/// A chunk of compressed stream and the presentation timestamp of the frame it starts.
#[derive(Clone, Copy, Debug)]
pub struct AccessUnit<'a> {
    pub data: &'a [u8],
    pub timestamp: u64,
}

struct SessionInner {
    state: SessionState,
    pool: OutputPool,
    /// Timestamps of queued access units not yet matched with a decoded frame.
    timestamps: VecDeque<u64>,
    keyframe_found: bool,
}

/// The part of a session the interrupt path and the recycle worker reach.
pub(crate) struct SessionShared {
    desc: &'static FormatDescriptor,
    backend: Mutex<CodecBackend>,
    inner: Mutex<SessionInner>,
    events: SyncEventQueue<DecoderEvent>,
}

impl SessionShared {
    fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    fn set_state(&self, state: SessionState) {
        self.inner.lock().state = state;
    }

    fn push_event(&self, event: DecoderEvent) {
        if let Err(e) = self.events.queue_event(event) {
            warn!("vdec: dropping event: {}", e);
        }
    }

    /// Completion half of the interrupt path. Runs with the hardware lock held.
    pub(crate) fn service_interrupt(&self, hw: &mut EngineHw) {
        let state = self.state();
        if state != SessionState::Running {
            debug!("vdec: interrupt for a session in state {:?}", state);
            self.desc.engine.ack(&mut *hw.dos);
            return;
        }
        let report = self.backend.lock().on_interrupt(&mut *hw.dos);
        self.complete(&report);
    }

    fn complete(&self, report: &IrqReport) {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Running {
            debug!("vdec: abandoning completion in state {:?}", inner.state);
            return;
        }

        if let Some(change) = report.source_change {
            info!(
                "vdec: {} stream is {}x{}, {} buffers needed",
                self.desc.format, change.width, change.height, change.min_buffers
            );
            self.push_event(DecoderEvent::SourceChanged {
                width: change.width,
                height: change.height,
                min_buffers: change.min_buffers,
            });
        }

        for frame in report.frames() {
            if let Err(e) = inner.pool.mark_decoded(frame.index) {
                warn!("vdec: rejected completion: {}", e);
                continue;
            }
            // The firmware does not say which frames are keyframes.
            // TODO: report picture types once the firmware status words are decoded.
            inner.keyframe_found = true;
            let timestamp = inner.timestamps.pop_front();
            self.push_event(DecoderEvent::FrameDecoded {
                buffer_index: frame.index,
                timestamp,
                keyframe: inner.keyframe_found,
                corrupted: frame.corrupted,
            });
        }

        if report.fatal {
            error!("vdec: {} session hit a fatal engine fault", self.desc.format);
            inner.state = SessionState::Error;
            self.push_event(DecoderEvent::HardwareFault);
        }
    }

    /// Hands pending buffers back to the engine, one per observed empty recycle input.
    fn pump_recycle(&self, core: &VdecCore) -> usize {
        let mut hw = core.hw();
        let mut backend = self.backend.lock();
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Running {
            return 0;
        }
        let mut recycled = 0;
        while let Some(index) = inner.pool.next_recycle() {
            if !backend.can_recycle(&*hw.dos) {
                break;
            }
            backend.recycle(&mut *hw.dos, index);
            inner.pool.complete_recycle();
            recycled += 1;
        }
        recycled
    }
}

/// Background thread pumping recycles at a fixed interval.
struct RecycleWorker {
    kill: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl RecycleWorker {
    fn spawn(
        core: Arc<VdecCore>,
        shared: Arc<SessionShared>,
        interval: Duration,
    ) -> std::io::Result<RecycleWorker> {
        let (kill, killed) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("vdec_recycle".to_owned())
            .spawn(move || loop {
                match killed.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        shared.pump_recycle(&core);
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;
        Ok(RecycleWorker { kill, handle })
    }

    fn stop(self) {
        // The worker also exits if the channel is already gone.
        let _ = self.kill.send(());
        if self.handle.join().is_err() {
            error!("vdec: recycle worker panicked");
        }
    }
}

/// Bytes that fit into a ring of `size` bytes with write offset `wp` and read offset `rp`,
/// keeping the guard gap the engine needs between them.
fn ring_free(size: u64, wp: u64, rp: u64) -> u64 {
    let used = (wp + size - rp) % size;
    size.saturating_sub(used + VIFIFO_GUARD)
}

/// Memory and indices a started session holds outside its backend.
#[derive(Default)]
struct Resources {
    vififo: Option<DmaRegion>,
    /// Write offset into the input ring.
    wp: u32,
    canvas_indices: Vec<u8>,
    powered: bool,
}

/// Returns everything in `res` and the backend's memory to the engine. Powers the engine down
/// first if it was powered up.
fn teardown(
    ops: EngineOps,
    hw: &mut EngineHw,
    backend: &mut CodecBackend,
    res: &mut Resources,
) -> Result<()> {
    if res.powered {
        ops.stop(&mut *hw.dos);
        res.powered = false;
    }
    let mut result = backend.stop(&mut hw.dma);
    hw.canvases.free_all(&res.canvas_indices);
    res.canvas_indices.clear();
    if let Some(vififo) = res.vififo.take() {
        if let Err(e) = hw.dma.free(vififo) {
            error!("vdec: failed to release the input fifo: {}", e);
            result = result.and(Err(e.into()));
        }
    }
    hw.firmware = None;
    result
}

/// A decode session for one compressed format.
pub struct Session {
    core: Arc<VdecCore>,
    shared: Arc<SessionShared>,
    params: SessionParams,
    frames: Vec<FrameBuffer>,
    resources: Option<Resources>,
    worker: Option<RecycleWorker>,
}

impl Session {
    pub(crate) fn new(core: Arc<VdecCore>, desc: &'static FormatDescriptor) -> Session {
        let depth = core
            .config()
            .event_queue_depth
            .max(desc.max_buffers as usize + 2);
        let params = SessionParams {
            width: desc.max_width,
            height: desc.max_height,
            output_format: desc.output_formats[0],
        };
        Session {
            shared: Arc::new(SessionShared {
                desc,
                backend: Mutex::new(CodecBackend::new(desc.codec)),
                inner: Mutex::new(SessionInner {
                    state: SessionState::Idle,
                    pool: OutputPool::new(0),
                    timestamps: VecDeque::new(),
                    keyframe_found: false,
                }),
                events: EventQueue::with_capacity(depth).into(),
            }),
            core,
            params,
            frames: Vec::new(),
            resources: None,
            worker: None,
        }
    }

    pub(crate) fn shared(&self) -> &Arc<SessionShared> {
        &self.shared
    }

    pub fn descriptor(&self) -> &'static FormatDescriptor {
        self.shared.desc
    }

    pub fn params(&self) -> SessionParams {
        self.params
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn buffer_state(&self, index: u8) -> Option<BufferState> {
        self.shared.inner.lock().pool.state(index)
    }

    /// Set once any frame completed.
    pub fn keyframe_found(&self) -> bool {
        self.shared.inner.lock().keyframe_found
    }

    fn expect_state(&self, expected: SessionState, op: &str) -> Result<()> {
        let state = self.state();
        if state != expected {
            return Err(Error::ProtocolViolation(format!(
                "{} in state {:?}, expected {:?}",
                op, state, expected
            )));
        }
        Ok(())
    }

    /// Sets the stream geometry and output format.
    pub fn configure(&mut self, params: SessionParams) -> Result<()> {
        self.expect_state(SessionState::Idle, "configure")?;
        let desc = self.shared.desc;
        if params.width == 0 || params.height == 0 {
            return Err(Error::InvalidParameter(format!(
                "{}x{} is empty",
                params.width, params.height
            )));
        }
        if params.width > desc.max_width || params.height > desc.max_height {
            return Err(Error::InvalidParameter(format!(
                "{}x{} exceeds {}x{}",
                params.width, params.height, desc.max_width, desc.max_height
            )));
        }
        if !desc.output_formats.contains(&params.output_format) {
            return Err(Error::InvalidParameter(format!(
                "{} cannot be decoded to {}",
                desc.format, params.output_format
            )));
        }
        self.params = params;
        Ok(())
    }

    /// Assigns the output buffers frames are decoded into. Buffer `i` is addressed by index `i`.
    pub fn set_output_buffers(&mut self, frames: Vec<FrameBuffer>) -> Result<()> {
        self.expect_state(SessionState::Idle, "set_output_buffers")?;
        let desc = self.shared.desc;
        let count = frames.len() as u32;
        let max = desc.max_buffers.min(desc.codec.max_buffer_slots());
        if count < desc.min_buffers || count > max {
            return Err(Error::InvalidParameter(format!(
                "{} output buffers, {} needs {}..={}",
                count, desc.format, desc.min_buffers, max
            )));
        }
        self.check_planes(&frames)?;
        self.shared.inner.lock().pool = OutputPool::new(frames.len());
        self.frames = frames;
        Ok(())
    }

    fn check_planes(&self, frames: &[FrameBuffer]) -> Result<()> {
        let planes = self.params.output_format.num_planes();
        match frames.iter().position(|f| f.planes.len() != planes) {
            Some(i) => Err(Error::InvalidParameter(format!(
                "buffer {} has {} planes, {} has {}",
                i,
                frames[i].planes.len(),
                self.params.output_format,
                planes
            ))),
            None => Ok(()),
        }
    }

    /// Claims the engine, loads the firmware and starts decoding. On failure everything acquired
    /// is released and the session is idle again.
    pub fn start(&mut self) -> Result<()> {
        self.expect_state(SessionState::Idle, "start")?;
        if self.frames.is_empty() {
            return Err(Error::ProtocolViolation(
                "start before set_output_buffers".to_string(),
            ));
        }
        self.check_planes(&self.frames)?;

        self.shared.set_state(SessionState::Starting);
        if let Err(e) = self.core.claim(&self.shared) {
            self.shared.set_state(SessionState::Idle);
            return Err(e);
        }
        match self.start_engine() {
            Ok(resources) => self.resources = Some(resources),
            Err(e) => {
                warn!("vdec: failed to start {} session: {}", self.shared.desc.format, e);
                self.core.release(&self.shared);
                self.shared.set_state(SessionState::Idle);
                return Err(e);
            }
        }
        self.shared.set_state(SessionState::Running);
        info!(
            "vdec: started {} session, {}x{} {} with {} buffers",
            self.shared.desc.format,
            self.params.width,
            self.params.height,
            self.params.output_format,
            self.frames.len()
        );

        if let Some(interval) = self.core.config().recycle_interval() {
            match RecycleWorker::spawn(self.core.clone(), self.shared.clone(), interval) {
                Ok(worker) => self.worker = Some(worker),
                Err(e) => warn!("vdec: no recycle worker, relying on pump_recycle: {}", e),
            }
        }
        Ok(())
    }

    fn start_engine(&self) -> Result<Resources> {
        let desc = self.shared.desc;
        let config = self.core.config();
        // Nothing is allocated or written until the blob is known to be usable.
        let firmware = Firmware::load(
            &config.firmware_dir,
            desc.firmware_path,
            desc.codec.extended_firmware_size(),
        )?;

        let mut hw = self.core.hw();
        let mut backend = self.shared.backend.lock();
        let mut res = Resources::default();
        let result = self.bring_up(&mut hw, &mut backend, &firmware, &mut res);
        match result {
            Ok(()) => Ok(res),
            Err(e) => {
                if let Err(cleanup) = teardown(desc.engine, &mut hw, &mut backend, &mut res) {
                    error!("vdec: cleanup after failed start: {}", cleanup);
                }
                Err(e)
            }
        }
    }

    fn bring_up(
        &self,
        hw: &mut EngineHw,
        backend: &mut CodecBackend,
        firmware: &Firmware,
        res: &mut Resources,
    ) -> Result<()> {
        let config = self.core.config();
        res.vififo = Some(hw.dma.allocate(config.vififo_size, VIFIFO_ALIGN, "vififo")?);
        let mut bounce = hw.dma.allocate(MC_SIZE as u64, 0x1000, "firmware bounce")?;
        let result = self.program(hw, backend, firmware, &mut bounce, res);
        if let Err(e) = hw.dma.free(bounce) {
            error!("vdec: failed to release the firmware bounce buffer: {}", e);
        }
        result
    }

    fn program(
        &self,
        hw: &mut EngineHw,
        backend: &mut CodecBackend,
        firmware: &Firmware,
        bounce: &mut DmaRegion,
        res: &mut Resources,
    ) -> Result<()> {
        let ops = self.shared.desc.engine;
        let config = self.core.config();
        let params = self.params;

        backend.reserve(
            &mut hw.dma,
            &StreamLayout {
                width: params.width,
                height: params.height,
                buffers: self.frames.len() as u32,
            },
        )?;
        res.canvas_indices = hw
            .canvases
            .alloc_n(self.frames.len() * params.output_format.num_planes())?;
        backend.load_extended_firmware(firmware.extended())?;

        // All memory is held; from here on registers are written in hardware order.
        res.powered = true;
        ops.power_up(&mut *hw.dos);
        if let Some(vififo) = &res.vififo {
            ops.init_input(&mut *hw.dos, vififo);
        }
        ops.load_firmware(&mut *hw.dos, bounce, firmware, config.firmware_poll_limit)?;
        hw.firmware = Some(firmware.path().to_string());

        backend.start(&mut StartContext {
            dos: &mut *hw.dos,
            dmc: &mut *hw.dmc,
            dma: &mut hw.dma,
            canvas_indices: &res.canvas_indices,
            frames: &self.frames,
            output_format: params.output_format,
            width: params.width,
            height: params.height,
        })?;
        ops.enable(&mut *hw.dos, params.output_format.num_planes() == 2);
        Ok(())
    }

    /// Copies one access unit into the input ring and advances the engine's write pointer.
    pub fn queue_input(&mut self, unit: AccessUnit) -> Result<()> {
        if unit.data.is_empty() {
            return Err(Error::InvalidParameter("empty access unit".to_string()));
        }
        let mut hw = self.core.hw();
        match self.state() {
            SessionState::Running => (),
            SessionState::Error => return Err(Error::HardwareFault),
            state => {
                return Err(Error::ProtocolViolation(format!(
                    "queue_input in state {:?}",
                    state
                )))
            }
        }
        let res = self
            .resources
            .as_mut()
            .ok_or_else(|| Error::ProtocolViolation("session has no input ring".to_string()))?;
        let vififo = res
            .vififo
            .as_mut()
            .ok_or_else(|| Error::ProtocolViolation("session has no input ring".to_string()))?;

        let base = vififo.addr();
        let size = vififo.len() as u64;
        let rp = hw.dos.read(VLD_MEM_VIFIFO_RP);
        if rp < base || (rp - base) as u64 >= size {
            return Err(Error::ResourceExhausted(format!(
                "input read pointer {:#x} outside of the ring",
                rp
            )));
        }
        let free = ring_free(size, res.wp as u64, (rp - base) as u64);
        let len = unit.data.len();
        if len as u64 > free {
            return Err(Error::ResourceExhausted(format!(
                "{} byte access unit, {} bytes free in the input ring",
                len, free
            )));
        }

        let wp = res.wp as usize;
        let ring = vififo.as_mut_slice();
        let first = len.min(ring.len() - wp);
        ring[wp..wp + first].copy_from_slice(&unit.data[..first]);
        ring[..len - first].copy_from_slice(&unit.data[first..]);
        res.wp = ((wp + len) % ring.len()) as u32;

        self.shared.inner.lock().timestamps.push_back(unit.timestamp);
        hw.dos.write(VLD_MEM_VIFIFO_WP, base + res.wp);
        Ok(())
    }

    /// Returns a decoded buffer to the session. It goes back to the engine as soon as the engine
    /// accepts a recycle.
    pub fn submit_output_buffer(&self, index: u8) -> Result<()> {
        {
            let mut inner = self.shared.inner.lock();
            if inner.state != SessionState::Running {
                return Err(Error::ProtocolViolation(format!(
                    "submit_output_buffer in state {:?}",
                    inner.state
                )));
            }
            inner.pool.queue_recycle(index)?;
        }
        self.pump_recycle();
        Ok(())
    }

    /// Issues pending recycles the engine can take now. Returns how many were issued.
    pub fn pump_recycle(&self) -> usize {
        self.shared.pump_recycle(&self.core)
    }

    /// Stops decoding and releases the engine. Buffers the client still holds are abandoned.
    pub fn stop(&mut self) -> Result<()> {
        match self.state() {
            SessionState::Stopped => return Ok(()),
            SessionState::Idle => {
                self.shared.set_state(SessionState::Stopped);
                self.shared.events.close();
                return Ok(());
            }
            SessionState::Running | SessionState::Error => (),
            state => {
                return Err(Error::ProtocolViolation(format!(
                    "stop in state {:?}",
                    state
                )))
            }
        }

        if let Some(worker) = self.worker.take() {
            worker.stop();
        }

        let result = {
            let mut hw = self.core.hw();
            let mut backend = self.shared.backend.lock();
            let abandoned = {
                let mut inner = self.shared.inner.lock();
                inner.state = SessionState::Stopping;
                inner.timestamps.clear();
                inner.pool.abandon()
            };
            if abandoned > 0 {
                debug!("vdec: abandoning {} output buffers", abandoned);
            }
            let mut res = self.resources.take().unwrap_or_default();
            teardown(self.shared.desc.engine, &mut hw, &mut backend, &mut res)
        };

        self.core.release(&self.shared);
        self.shared.set_state(SessionState::Stopped);
        self.shared.events.close();
        info!("vdec: stopped {} session", self.shared.desc.format);
        result
    }

    /// Blocks for the next event. Fails once the session is stopped and every event was read.
    pub fn dequeue_event(&self) -> Result<DecoderEvent> {
        self.shared
            .events
            .dequeue_event()
            .map_err(|e| Error::ProtocolViolation(e.to_string()))
    }

    pub fn dequeue_event_timeout(&self, timeout: Duration) -> Option<DecoderEvent> {
        self.shared.events.dequeue_event_timeout(timeout)
    }

    pub fn try_dequeue_event(&self) -> Option<DecoderEvent> {
        self.shared.events.try_dequeue_event()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if matches!(self.state(), SessionState::Running | SessionState::Error) {
            if let Err(e) = self.stop() {
                error!("vdec: failed to stop session on drop: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::config::EngineConfig;
    use crate::dos::*;
    use crate::emulated::EmulatedEngine;
    use crate::engine::IrqReturn;

    struct Fixture {
        dir: tempfile::TempDir,
        emu: EmulatedEngine,
        core: Arc<VdecCore>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("meson/gx")).unwrap();
        fs::write(dir.path().join("meson/gx/vmpeg4_mc_5"), vec![0u8; MC_SIZE]).unwrap();
        let emu = EmulatedEngine::new();
        let core = emu
            .core(EngineConfig {
                firmware_dir: dir.path().to_path_buf(),
                vififo_size: 0x1_0000,
                recycle_interval_ms: None,
                ..Default::default()
            })
            .unwrap();
        Fixture {
            dir,
            emu,
            core,
        }
    }

    fn frames(count: u32) -> Vec<FrameBuffer> {
        (0..count)
            .map(|i| {
                let y = 0x4000_0000 + i * 0x40_0000;
                FrameBuffer::new(vec![y, y + 0x30_0000])
            })
            .collect()
    }

    fn running(f: &Fixture) -> Session {
        let mut session = f.core.open_session(PixelFormat::Mpeg4).unwrap();
        session.set_output_buffers(frames(8)).unwrap();
        session.start().unwrap();
        session
    }

    #[test]
    fn configure_validation() {
        let f = fixture();
        let mut session = f.core.open_session(PixelFormat::H264).unwrap();
        assert_eq!(session.params().output_format, PixelFormat::NV12);
        assert_eq!((session.params().width, session.params().height), (1920, 1080));
        let bad = [
            (0, 720, PixelFormat::NV12),
            (1920, 1088, PixelFormat::NV12),
            (1280, 720, PixelFormat::YUV420),
            (1280, 720, PixelFormat::H264),
        ];
        for (width, height, output_format) in bad {
            assert!(matches!(
                session.configure(SessionParams {
                    width,
                    height,
                    output_format
                }),
                Err(Error::InvalidParameter(_))
            ));
        }
        session
            .configure(SessionParams {
                width: 1280,
                height: 720,
                output_format: PixelFormat::NV12,
            })
            .unwrap();
        assert_eq!(session.params().width, 1280);
    }

    #[test]
    fn output_buffer_validation() {
        let f = fixture();
        let mut session = f.core.open_session(PixelFormat::Mpeg4).unwrap();
        assert!(session.set_output_buffers(frames(7)).is_err());
        assert!(session.set_output_buffers(frames(9)).is_err());
        let three_planes = vec![FrameBuffer::new(vec![1, 2, 3]); 8];
        assert!(session.set_output_buffers(three_planes).is_err());
        session.set_output_buffers(frames(8)).unwrap();
        assert_eq!(session.buffer_state(7), Some(BufferState::Free));
        assert_eq!(session.buffer_state(8), None);
    }

    #[test]
    fn operations_out_of_order() {
        let f = fixture();
        let mut session = f.core.open_session(PixelFormat::Mpeg4).unwrap();
        assert!(matches!(session.start(), Err(Error::ProtocolViolation(_))));
        assert!(matches!(
            session.submit_output_buffer(0),
            Err(Error::ProtocolViolation(_))
        ));
        assert!(matches!(
            session.queue_input(AccessUnit {
                data: &[0, 0, 1],
                timestamp: 0
            }),
            Err(Error::ProtocolViolation(_))
        ));
        session.stop().unwrap();
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(f.emu.log().is_empty());
        assert!(session.dequeue_event().is_err());
    }

    #[test]
    fn start_and_stop_release_everything() {
        let f = fixture();
        let mut session = running(&f);
        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(
            f.core.loaded_firmware().as_deref(),
            Some("meson/gx/vmpeg4_mc_5")
        );
        assert_eq!(f.core.canvases_in_use(), 16);
        assert_eq!(
            f.core.dma_allocations(),
            vec!["vififo".to_string(), "mpeg4 workspace".to_string()]
        );
        assert_eq!(f.emu.get(MPSR), 1);

        session.stop().unwrap();
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(f.core.dma_allocated(), 0);
        assert_eq!(f.core.canvases_in_use(), 0);
        assert!(f.core.loaded_firmware().is_none());
        assert!(!f.core.has_active_session());
        assert_eq!(f.emu.get(MPSR), 0);
    }

    #[test]
    fn ring_space() {
        assert_eq!(ring_free(0x1_0000, 0, 0), 0x1_0000 - VIFIFO_GUARD);
        assert_eq!(ring_free(0x1_0000, 0x100, 0), 0x1_0000 - 0x100 - VIFIFO_GUARD);
        // The writer wrapped, the reader has not.
        assert_eq!(ring_free(0x1_0000, 0x10, 0xff00), 0xff00 - 0x10 - VIFIFO_GUARD);
        // Rings larger than 2 GiB do not overflow.
        let size = 0xffff_f000;
        assert_eq!(ring_free(size, size - 8, 4), 4);
        assert_eq!(ring_free(size, 0x1000, 0x1000), size - VIFIFO_GUARD);
        assert_eq!(ring_free(16, 8, 0), 0);
    }

    #[test]
    fn input_ring_wraps_and_fills() {
        let f = fixture();
        let mut session = running(&f);
        let base = f.emu.get(VLD_MEM_VIFIFO_START_PTR);
        assert_eq!(f.emu.get(VLD_MEM_VIFIFO_RP), base);

        let unit = vec![0xabu8; 0x6000];
        session
            .queue_input(AccessUnit {
                data: &unit,
                timestamp: 1,
            })
            .unwrap();
        session
            .queue_input(AccessUnit {
                data: &unit,
                timestamp: 2,
            })
            .unwrap();
        assert_eq!(f.emu.get(VLD_MEM_VIFIFO_WP), base + 0xc000);
        // 0x4000 - 8 bytes left.
        assert!(matches!(
            session.queue_input(AccessUnit {
                data: &unit,
                timestamp: 3
            }),
            Err(Error::ResourceExhausted(_))
        ));

        f.emu.consume_input();
        session
            .queue_input(AccessUnit {
                data: &unit,
                timestamp: 3,
            })
            .unwrap();
        assert_eq!(f.emu.get(VLD_MEM_VIFIFO_WP), base + 0x2000);
        session.stop().unwrap();
    }

    #[test]
    fn completion_after_stop_is_abandoned() {
        let f = fixture();
        let mut session = running(&f);
        session.stop().unwrap();
        f.emu.set(AV_SCRATCH_9, 2);
        // The engine no longer has a session; the interrupt is only acknowledged.
        assert_eq!(f.core.handle_interrupt(), IrqReturn::None);
        assert_eq!(session.buffer_state(2), Some(BufferState::Free));
        assert!(session.try_dequeue_event().is_none());
    }

    #[test]
    fn drop_stops_the_session() {
        let f = fixture();
        let session = running(&f);
        drop(session);
        assert!(!f.core.has_active_session());
        assert_eq!(f.core.dma_allocated(), 0);
    }

    #[test]
    fn worker_recycles_in_background() {
        let f = fixture();
        let core = f
            .emu
            .core(EngineConfig {
                firmware_dir: f.dir.path().to_path_buf(),
                vififo_size: 0x1_0000,
                recycle_interval_ms: Some(1),
                ..Default::default()
            })
            .unwrap();
        let mut session = core.open_session(PixelFormat::Mpeg4).unwrap();
        session.set_output_buffers(frames(8)).unwrap();
        session.start().unwrap();

        // Engine still busy with an earlier recycle.
        f.emu.set(AV_SCRATCH_8, 0xffff_fffe);
        f.emu.set(AV_SCRATCH_9, 1 << 8 | 4);
        core.handle_interrupt();
        assert_eq!(session.buffer_state(4), Some(BufferState::Decoded));
        session.submit_output_buffer(4).unwrap();
        assert_eq!(session.buffer_state(4), Some(BufferState::Recycling));

        f.emu.set(AV_SCRATCH_8, 0);
        let mut waited = 0;
        while session.buffer_state(4) != Some(BufferState::Free) && waited < 2000 {
            thread::sleep(Duration::from_millis(1));
            waited += 1;
        }
        assert_eq!(session.buffer_state(4), Some(BufferState::Free));
        assert_eq!(f.emu.get(AV_SCRATCH_8), 0xffff_ffef);
        session.stop().unwrap();
    }
}

// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Command line front end: lists capabilities, checks firmware and drives an emulated engine.

use std::path::Path;
use std::path::PathBuf;

use anyhow::bail;
use anyhow::Context;
use argh::FromArgs;
use log::error;
use log::info;
use vdec::emulated::EmulatedEngine;
use vdec::firmware::Firmware;
use vdec::registry;
use vdec::AccessUnit;
use vdec::DecoderEvent;
use vdec::EngineConfig;
use vdec::FrameBuffer;
use vdec::HwRevision;
use vdec::PixelFormat;

/// Bus address of the first emulated output buffer. Outside the default DMA pool.
const FRAME_BASE: u32 = 0x4000_0000;
const FRAME_STRIDE: u32 = 0x40_0000;
const PLANE_STRIDE: u32 = 0x20_0000;

#[derive(FromArgs)]
#[argh(subcommand, name = "caps", description = "List the formats an engine decodes.")]
struct CapsCommand {
    /// hardware revision (gxbb, gxl or gxm)
    #[argh(option, default = "HwRevision::Gxl")]
    revision: HwRevision,
    /// print JSON instead of a table
    #[argh(switch)]
    json: bool,
}

#[derive(FromArgs)]
#[argh(
    subcommand,
    name = "check-firmware",
    description = "Check that every firmware blob of a revision is present and large enough."
)]
struct CheckFirmwareCommand {
    /// engine configuration file
    #[argh(option)]
    config: Option<PathBuf>,
    /// firmware directory, overriding the configuration
    #[argh(option)]
    firmware_dir: Option<PathBuf>,
    /// hardware revision, overriding the configuration
    #[argh(option)]
    revision: Option<HwRevision>,
}

#[derive(FromArgs)]
#[argh(
    subcommand,
    name = "simulate",
    description = "Decode a synthetic stream on an emulated engine."
)]
struct SimulateCommand {
    /// compressed format to decode
    #[argh(option, default = "PixelFormat::Mpeg4")]
    format: PixelFormat,
    /// number of frames to decode
    #[argh(option, default = "16")]
    frames: u32,
    /// engine configuration file
    #[argh(option)]
    config: Option<PathBuf>,
    /// firmware directory, overriding the configuration
    #[argh(option)]
    firmware_dir: Option<PathBuf>,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Caps(CapsCommand),
    CheckFirmware(CheckFirmwareCommand),
    Simulate(SimulateCommand),
}

#[derive(FromArgs)]
/// Amlogic vdec decode engine utilities.
struct Options {
    #[argh(subcommand)]
    command: Command,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("failed to load configuration {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn caps(cmd: CapsCommand) -> anyhow::Result<()> {
    let caps = registry::capabilities(cmd.revision);
    if cmd.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&caps).context("failed to serialize capabilities")?
        );
        return Ok(());
    }
    for cap in caps {
        let outputs: Vec<String> = cap.output_formats.iter().map(|f| f.to_string()).collect();
        println!(
            "{:<6} buffers {:>2}..={:<2} up to {}x{} -> {}",
            cap.format.to_string(),
            cap.min_buffers,
            cap.max_buffers,
            cap.max_width,
            cap.max_height,
            outputs.join(", ")
        );
    }
    Ok(())
}

fn check_firmware(cmd: CheckFirmwareCommand) -> anyhow::Result<()> {
    let mut config = load_config(cmd.config.as_deref())?;
    if let Some(dir) = cmd.firmware_dir {
        config.firmware_dir = dir;
    }
    if let Some(revision) = cmd.revision {
        config.revision = revision;
    }

    let mut missing = 0;
    for cap in registry::capabilities(config.revision) {
        let desc = registry::resolve(config.revision, cap.format)?;
        match Firmware::load(
            &config.firmware_dir,
            desc.firmware_path,
            desc.codec.extended_firmware_size(),
        ) {
            Ok(_) => println!("{:<6} {} ok", desc.format.to_string(), desc.firmware_path),
            Err(e) => {
                println!("{:<6} {}", desc.format.to_string(), e);
                missing += 1;
            }
        }
    }
    if missing > 0 {
        bail!("{} formats cannot be decoded on {}", missing, config.revision);
    }
    Ok(())
}

fn simulate(cmd: SimulateCommand) -> anyhow::Result<()> {
    let mut config = load_config(cmd.config.as_deref())?;
    if let Some(dir) = cmd.firmware_dir {
        config.firmware_dir = dir;
    }
    // Recycles are pumped in lock step with the scripted firmware.
    config.recycle_interval_ms = None;

    let emu = EmulatedEngine::new();
    let core = emu
        .core(config)
        .context("failed to attach to the emulated engine")?;
    let mut session = core
        .open_session(cmd.format)
        .with_context(|| format!("failed to open a {} session", cmd.format))?;
    let desc = session.descriptor();
    let family = desc.codec;
    let planes = session.params().output_format.num_planes() as u32;
    let buffers = desc.min_buffers;
    let frames = (0..buffers)
        .map(|i| {
            FrameBuffer::new(
                (0..planes)
                    .map(|p| FRAME_BASE + i * FRAME_STRIDE + p * PLANE_STRIDE)
                    .collect(),
            )
        })
        .collect();
    session.set_output_buffers(frames)?;
    session.start().context("failed to start the session")?;

    if family == vdec::codec::CodecFamily::H264 {
        let params = session.params();
        emu.signal_source_change((params.width + 15) / 16, (params.height + 15) / 16, buffers);
        core.handle_interrupt();
    }

    let mut decoded = 0;
    for i in 0..cmd.frames {
        // A start code is enough, the emulated engine does not parse.
        let unit = [0u8, 0, 1, 0xb6, i as u8];
        session
            .queue_input(AccessUnit {
                data: &unit,
                timestamp: i as u64 * 33_333,
            })
            .with_context(|| format!("failed to queue access unit {}", i))?;
        emu.consume_input();
        emu.signal_frame(family, (i % buffers) as u8);
        core.handle_interrupt();

        while let Some(event) = session.try_dequeue_event() {
            println!("{:?}", event);
            match event {
                DecoderEvent::FrameDecoded { buffer_index, .. } => {
                    decoded += 1;
                    session.submit_output_buffer(buffer_index)?;
                }
                DecoderEvent::HardwareFault => bail!("engine fault after {} frames", decoded),
                DecoderEvent::SourceChanged { .. } => (),
            }
        }
        emu.accept_recycles(family);
        session.pump_recycle();
    }

    session.stop().context("failed to stop the session")?;
    info!(
        "decoded {} of {} frames, {} bytes of DMA memory still held",
        decoded,
        cmd.frames,
        core.dma_allocated()
    );
    if decoded != cmd.frames {
        bail!("only {} of {} frames decoded", decoded, cmd.frames);
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options: Options = argh::from_env();
    let result = match options.command {
        Command::Caps(cmd) => caps(cmd),
        Command::CheckFirmware(cmd) => check_firmware(cmd),
        Command::Simulate(cmd) => simulate(cmd),
    };
    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Emulated engine plus a firmware directory holding every blob of a revision.

#![allow(dead_code)]

use std::fs;
use std::sync::Arc;

use tempfile::TempDir;
use vdec::emulated::EmulatedEngine;
use vdec::firmware::MC_SIZE;
use vdec::registry;
use vdec::EngineConfig;
use vdec::FrameBuffer;
use vdec::HwRevision;
use vdec::VdecCore;

pub struct Fixture {
    pub dir: TempDir,
    pub emu: EmulatedEngine,
    pub core: Arc<VdecCore>,
}

impl Fixture {
    /// A gxl engine with a small input ring and no recycle worker.
    pub fn new() -> Fixture {
        Fixture::with_config(|_| ())
    }

    pub fn with_config<F: FnOnce(&mut EngineConfig)>(f: F) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EngineConfig {
            firmware_dir: dir.path().to_path_buf(),
            vififo_size: 0x1_0000,
            recycle_interval_ms: None,
            ..Default::default()
        };
        f(&mut config);
        write_firmware(&dir, config.revision);
        let emu = EmulatedEngine::new();
        let core = emu.core(config).unwrap();
        Fixture { dir, emu, core }
    }

    pub fn firmware_path(&self, path: &str) -> std::path::PathBuf {
        self.dir.path().join(path)
    }
}

fn write_firmware(dir: &TempDir, revision: HwRevision) {
    for cap in registry::capabilities(revision) {
        let desc = registry::resolve(revision, cap.format).unwrap();
        let path = dir.path().join(desc.firmware_path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let size = MC_SIZE + desc.codec.extended_firmware_size();
        let blob: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        fs::write(path, blob).unwrap();
    }
}

/// `count` output buffers with `planes` planes each, outside of the engine's DMA pool.
pub fn frames(count: u32, planes: u32) -> Vec<FrameBuffer> {
    (0..count)
        .map(|i| {
            FrameBuffer::new(
                (0..planes)
                    .map(|p| 0x4000_0000 + i * 0x40_0000 + p * 0x20_0000)
                    .collect(),
            )
        })
        .collect()
}

// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Per hardware revision tables describing which compressed formats the engine decodes, and how.

use serde::Serialize;

use crate::codec::CodecFamily;
use crate::engine::EngineOps;
use crate::error::Error;
use crate::error::Result;
use crate::format::HwRevision;
use crate::format::PixelFormat;

/// Capabilities and plumbing for one compressed format on one silicon generation.
#[derive(Debug, PartialEq, Eq)]
pub struct FormatDescriptor {
    pub format: PixelFormat,
    pub min_buffers: u32,
    pub max_buffers: u32,
    pub max_width: u32,
    pub max_height: u32,
    /// Firmware blob, relative to the configured firmware directory.
    pub firmware_path: &'static str,
    /// Decoded pixel formats the engine can produce, preferred first.
    pub output_formats: &'static [PixelFormat],
    pub codec: CodecFamily,
    pub engine: EngineOps,
}

const MPEG12_OUTPUTS: &[PixelFormat] = &[PixelFormat::NV12, PixelFormat::YUV420];
const MPEG4_OUTPUTS: &[PixelFormat] = &[PixelFormat::NV12, PixelFormat::YUV420];
const H264_OUTPUTS: &[PixelFormat] = &[PixelFormat::NV12];

const MPEG12_FIRMWARE: &str = "meson/gx/vmpeg12_mc";
const MPEG4_FIRMWARE: &str = "meson/gx/vmpeg4_mc_5";

macro_rules! descriptor {
    ($format:ident, $codec:ident, $min:expr, $max:expr, $fw:expr, $outputs:expr) => {
        FormatDescriptor {
            format: PixelFormat::$format,
            min_buffers: $min,
            max_buffers: $max,
            max_width: 1920,
            max_height: 1080,
            firmware_path: $fw,
            output_formats: $outputs,
            codec: CodecFamily::$codec,
            engine: EngineOps::Vdec1,
        }
    };
}

static GXBB_FORMATS: &[FormatDescriptor] = &[
    descriptor!(Mpeg1, Mpeg12, 8, 8, MPEG12_FIRMWARE, MPEG12_OUTPUTS),
    descriptor!(Mpeg2, Mpeg12, 8, 8, MPEG12_FIRMWARE, MPEG12_OUTPUTS),
    descriptor!(Mpeg4, Mpeg4, 8, 8, MPEG4_FIRMWARE, MPEG4_OUTPUTS),
    descriptor!(H263, Mpeg4, 8, 8, MPEG4_FIRMWARE, MPEG4_OUTPUTS),
    descriptor!(Xvid, Mpeg4, 8, 8, MPEG4_FIRMWARE, MPEG4_OUTPUTS),
    descriptor!(H264, H264, 2, 24, "meson/gx/gxbb_vh264_mc", H264_OUTPUTS),
];

static GXL_FORMATS: &[FormatDescriptor] = &[
    descriptor!(Mpeg1, Mpeg12, 8, 8, MPEG12_FIRMWARE, MPEG12_OUTPUTS),
    descriptor!(Mpeg2, Mpeg12, 8, 8, MPEG12_FIRMWARE, MPEG12_OUTPUTS),
    descriptor!(Mpeg4, Mpeg4, 8, 8, MPEG4_FIRMWARE, MPEG4_OUTPUTS),
    descriptor!(H263, Mpeg4, 8, 8, MPEG4_FIRMWARE, MPEG4_OUTPUTS),
    descriptor!(Xvid, Mpeg4, 8, 8, MPEG4_FIRMWARE, MPEG4_OUTPUTS),
    descriptor!(H264, H264, 2, 24, "meson/gx/vh264_mc", H264_OUTPUTS),
];

fn table(revision: HwRevision) -> &'static [FormatDescriptor] {
    match revision {
        HwRevision::Gxbb => GXBB_FORMATS,
        // GXM shares the GXL decode block.
        HwRevision::Gxl | HwRevision::Gxm => GXL_FORMATS,
    }
}

/// Looks up the descriptor for `format` on `revision`.
pub fn resolve(revision: HwRevision, format: PixelFormat) -> Result<&'static FormatDescriptor> {
    table(revision)
        .iter()
        .find(|desc| desc.format == format)
        .ok_or(Error::NotSupported { revision, format })
}

/// What a client needs to negotiate a stream before opening a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Capability {
    pub format: PixelFormat,
    pub min_buffers: u32,
    pub max_buffers: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub output_formats: Vec<PixelFormat>,
}

impl From<&FormatDescriptor> for Capability {
    fn from(desc: &FormatDescriptor) -> Self {
        Capability {
            format: desc.format,
            min_buffers: desc.min_buffers,
            max_buffers: desc.max_buffers,
            max_width: desc.max_width,
            max_height: desc.max_height,
            output_formats: desc.output_formats.to_vec(),
        }
    }
}

/// Returns the capabilities of every format decodable on `revision`.
pub fn capabilities(revision: HwRevision) -> Vec<Capability> {
    table(revision).iter().map(Capability::from).collect()
}

// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Pixel formats and hardware revisions known to the decode engine.

use std::fmt;
use std::fmt::Display;
use std::str::FromStr;

use enumn::N;
use serde::Deserialize;
use serde::Serialize;

/// Builds a little-endian fourcc code, V4L2 style.
pub const fn fourcc(code: &[u8; 4]) -> u32 {
    (code[0] as u32) | (code[1] as u32) << 8 | (code[2] as u32) << 16 | (code[3] as u32) << 24
}

#[derive(PartialEq, Eq, PartialOrd, Ord, N, Clone, Copy, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum PixelFormat {
    // Raw formats
    NV12 = fourcc(b"NV12"),
    YUV420 = fourcc(b"YU12"),

    // Bitstream formats
    Mpeg1 = fourcc(b"MPG1"),
    Mpeg2 = fourcc(b"MPG2"),
    Mpeg4 = fourcc(b"MPG4"),
    H263 = fourcc(b"H263"),
    Xvid = fourcc(b"XVID"),
    H264 = fourcc(b"H264"),
}

impl PixelFormat {
    pub fn fourcc(self) -> u32 {
        self as u32
    }

    pub fn is_compressed(self) -> bool {
        self.num_planes() == 0
    }

    /// Number of separately addressed planes of a decoded frame in this format.
    pub fn num_planes(self) -> usize {
        match self {
            PixelFormat::NV12 => 2,
            PixelFormat::YUV420 => 3,
            _ => 0,
        }
    }
}

impl Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use PixelFormat::*;
        match self {
            NV12 => write!(f, "NV12"),
            YUV420 => write!(f, "YUV420"),
            Mpeg1 => write!(f, "MPEG1"),
            Mpeg2 => write!(f, "MPEG2"),
            Mpeg4 => write!(f, "MPEG4"),
            H263 => write!(f, "H263"),
            Xvid => write!(f, "XVID"),
            H264 => write!(f, "H264"),
        }
    }
}

impl FromStr for PixelFormat {
    type Err = String;

    /// Accepts either a format name ("mpeg4", "nv12", ...) or a raw fourcc ("MPG4").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use PixelFormat::*;
        let format = match s.to_ascii_lowercase().as_str() {
            "nv12" => NV12,
            "yuv420" => YUV420,
            "mpeg1" => Mpeg1,
            "mpeg2" => Mpeg2,
            "mpeg4" => Mpeg4,
            "h263" => H263,
            "xvid" => Xvid,
            "h264" => H264,
            _ => {
                let code: [u8; 4] = s
                    .as_bytes()
                    .try_into()
                    .map_err(|_| format!("unknown pixel format {}", s))?;
                PixelFormat::n(fourcc(&code)).ok_or_else(|| format!("unknown fourcc {}", s))?
            }
        };
        Ok(format)
    }
}

/// Silicon generation the decode engine belongs to.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HwRevision {
    Gxbb,
    Gxl,
    Gxm,
}

impl HwRevision {
    pub const ALL: [HwRevision; 3] = [HwRevision::Gxbb, HwRevision::Gxl, HwRevision::Gxm];
}

impl Display for HwRevision {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HwRevision::Gxbb => write!(f, "gxbb"),
            HwRevision::Gxl => write!(f, "gxl"),
            HwRevision::Gxm => write!(f, "gxm"),
        }
    }
}

impl FromStr for HwRevision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gxbb" => Ok(HwRevision::Gxbb),
            "gxl" => Ok(HwRevision::Gxl),
            "gxm" => Ok(HwRevision::Gxm),
            _ => Err(format!("unknown hardware revision {}", s)),
        }
    }
}

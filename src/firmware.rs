// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Decoder firmware blobs.

use std::fs;
use std::path::Path;

use log::debug;

use crate::error::Error;
use crate::error::Result;

/// Size of the engine's instruction memory. Blobs are at least this large and only this much is
/// loaded.
pub const MC_SIZE: usize = 16 * 1024;

/// Microcode ready to be pushed into the engine.
pub struct Firmware {
    path: String,
    code: Vec<u8>,
    extended: Vec<u8>,
}

impl Firmware {
    /// Reads `path` relative to `firmware_dir`. Some codecs expect `extended_size` more bytes
    /// after the instruction memory image, which they load themselves.
    pub fn load(firmware_dir: &Path, path: &str, extended_size: usize) -> Result<Firmware> {
        let full = firmware_dir.join(path);
        let mut code = fs::read(&full).map_err(|e| Error::FirmwareLoadFailure {
            path: full.display().to_string(),
            reason: e.to_string(),
        })?;
        let expected = MC_SIZE + extended_size;
        if code.len() < expected {
            return Err(Error::FirmwareLoadFailure {
                path: full.display().to_string(),
                reason: format!("{} bytes, expected at least {}", code.len(), expected),
            });
        }
        debug!("firmware {}: {} bytes", full.display(), code.len());
        let mut extended = code.split_off(MC_SIZE);
        extended.truncate(extended_size);
        Ok(Firmware {
            path: path.to_string(),
            code,
            extended,
        })
    }

    /// Path relative to the firmware directory.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The first `MC_SIZE` bytes of the blob.
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// The bytes following the instruction memory image, if the codec asked for any.
    pub fn extended(&self) -> &[u8] {
        &self.extended
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_truncates() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("meson/gx")).unwrap();
        let mut blob = vec![0xa5u8; MC_SIZE + 100];
        blob[MC_SIZE - 1] = 0x11;
        fs::write(dir.path().join("meson/gx/vmpeg4_mc_5"), &blob).unwrap();

        let fw = Firmware::load(dir.path(), "meson/gx/vmpeg4_mc_5", 0).unwrap();
        assert_eq!(fw.path(), "meson/gx/vmpeg4_mc_5");
        assert_eq!(fw.code().len(), MC_SIZE);
        assert_eq!(fw.code()[MC_SIZE - 1], 0x11);
        assert!(fw.extended().is_empty());
    }

    #[test]
    fn load_extended() {
        let dir = tempfile::tempdir().unwrap();
        let mut blob = vec![0u8; MC_SIZE + 64];
        blob[MC_SIZE] = 0x42;
        fs::write(dir.path().join("vh264_mc"), &blob).unwrap();

        let fw = Firmware::load(dir.path(), "vh264_mc", 32).unwrap();
        assert_eq!(fw.code().len(), MC_SIZE);
        assert_eq!(fw.extended().len(), 32);
        assert_eq!(fw.extended()[0], 0x42);
        assert!(Firmware::load(dir.path(), "vh264_mc", 65).is_err());
    }

    #[test]
    fn missing_or_short_blob() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Firmware::load(dir.path(), "meson/gx/vh264_mc", 0),
            Err(Error::FirmwareLoadFailure { .. })
        ));
        fs::write(dir.path().join("short"), vec![0u8; MC_SIZE - 1]).unwrap();
        match Firmware::load(dir.path(), "short", 0) {
            Err(Error::FirmwareLoadFailure { reason, .. }) => {
                assert!(reason.contains("16384"), "{}", reason)
            }
            _ => panic!("short firmware accepted"),
        }
    }
}

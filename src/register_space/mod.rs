// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Software model of a register window, used to emulate the decode engine.

#[macro_use]
mod register;
mod register_space;

pub use self::register::*;
pub use self::register_space::*;

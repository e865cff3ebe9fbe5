// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Build script for rk-bootm.

fn main() {
    // These are read with `option_env!` so changing them must trigger a rebuild.
    println!("cargo:rerun-if-env-changed=LOG_LEVEL");
    println!("cargo:rerun-if-env-changed=BOOTM_KEY_CHECK");
}

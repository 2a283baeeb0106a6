//! Emits linker directives for the native connectivity engine.
//!
//! The engine ships as a shared library (`libopenlimits_sharp`). Point
//! `EXLINK_ENGINE_DIR` at the directory containing it to link against the
//! real engine. When the variable is unset no directives are emitted: the
//! rlib still builds, and the unit tests provide the ABI symbols themselves
//! through an in-crate stub engine.

use std::env;

fn main() {
    println!("cargo:rerun-if-env-changed=EXLINK_ENGINE_DIR");

    if let Ok(dir) = env::var("EXLINK_ENGINE_DIR") {
        println!("cargo:rustc-link-search=native={dir}");
        println!("cargo:rustc-link-lib=dylib=openlimits_sharp");
    }
}

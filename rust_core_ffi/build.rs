// Copyright 2024 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.

// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

//! Writes rust_core.h, stamped with the crate version, next to the built
//! libraries.
use std::{env, path::Path};

fn main() {
    println!("cargo:rerun-if-changed=cbindgen.toml");
    println!("cargo:rerun-if-changed=src");

    let version = env::var("CARGO_PKG_VERSION").expect("CARGO_PKG_VERSION is not set");
    let crate_dir = env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set");
    // OUT_DIR is target/<profile>/build/<pkg>/out
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR not set");
    let header = Path::new(&out_dir)
        .ancestors()
        .nth(3)
        .expect("Invalid OUT_DIR structure")
        .join("rust_core.h");

    let mut config = cbindgen::Config::from_file(Path::new(&crate_dir).join("cbindgen.toml"))
        .expect("cbindgen.toml is invalid");
    let banner = config.header.take().unwrap_or_default();
    config.header = Some(format!("{banner}\n// Version: {version}\n"));

    match cbindgen::generate_with_config(&crate_dir, config) {
        Ok(bindings) => {
            bindings.write_to_file(&header);
        }
        Err(e) => println!("cargo:warning=rust_core.h not generated: {e}"),
    }
}

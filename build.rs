extern crate cc;
extern crate pkg_config;

use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src/assimp/shim.cpp");

    // Only the native backend links against libassimp
    if env::var_os("CARGO_FEATURE_ASSIMP").is_none() {
        return;
    }

    // Ask pkg-config where libassimp is, but link it only after the shim
    let lib = pkg_config::Config::new()
        .atleast_version("5.0.0")
        .cargo_metadata(false)
        .probe("assimp")
        .ok();

    // The importer/exporter objects are C++ only
    let target = env::var("TARGET").unwrap_or_default();
    let mut build = cc::Build::new();
    build.cpp(true).file("src/assimp/shim.cpp");
    if let Some(ref lib) = lib {
        for dir in &lib.include_paths {
            build.include(dir);
        }
    }
    if target.contains("msvc") {
        build.flag("/EHsc");
    } else {
        build.flag_if_supported("-std=c++14");
    }
    build.compile("asset_bridge_shim");

    match lib {
        Some(lib) => {
            for dir in &lib.link_paths {
                println!("cargo:rustc-link-search=native={}", dir.display());
            }
            for name in &lib.libs {
                println!("cargo:rustc-link-lib={}", name);
            }
        }
        // Otherwise hope it is on the default search path
        None => println!("cargo:rustc-link-lib=assimp"),
    }

    // Link to libstdc++ on GNU
    if target.contains("gnu") {
        println!("cargo:rustc-link-lib=stdc++");
    }
}

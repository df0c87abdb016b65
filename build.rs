//! Build-time hints for locating FFmpeg on Windows.
//!
//! `ffmpeg-sys-next` does the actual discovery. On Windows that usually
//! means a vcpkg install, and a missing `FFMPEG_DIR` produces a linker error
//! far from its cause, so this script points at the likely fix up front.

use std::{env, path::PathBuf};

const WATCHED_VARIABLES: [&str; 4] = ["FFMPEG_DIR", "VCPKG_ROOT", "VCPKGRS_DYNAMIC", "VCPKGRS_TRIPLET"];
const DEFAULT_TRIPLET: &str = "x64-windows";

fn warn(message: &str) {
    println!("cargo:warning={message}");
}

fn vcpkg_ffmpeg_dir() -> Option<PathBuf> {
    let root = env::var_os("VCPKG_ROOT")?;
    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| DEFAULT_TRIPLET.to_string());
    Some(PathBuf::from(root).join("installed").join(triplet))
}

fn main() {
    for variable in WATCHED_VARIABLES {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    let windows = env::var("CARGO_CFG_TARGET_OS").is_ok_and(|os| os == "windows");
    if !windows || env::var_os("FFMPEG_DIR").is_some() {
        return;
    }

    match vcpkg_ffmpeg_dir() {
        None => warn(
            "chaptermark needs FFmpeg development libraries. Install them with vcpkg and set FFMPEG_DIR (or VCPKG_ROOT).",
        ),
        Some(directory) if directory.exists() => {
            warn(&format!(
                "Using vcpkg FFmpeg at {0}; set FFMPEG_DIR={0} to pin it.",
                directory.display()
            ));
            if env::var_os("VCPKGRS_DYNAMIC").is_none() {
                warn("Set VCPKGRS_DYNAMIC=1 if your vcpkg FFmpeg is a dynamic build.");
            }
        }
        Some(directory) => warn(&format!(
            "VCPKG_ROOT is set, but {} holds no FFmpeg install.",
            directory.display()
        )),
    }
}

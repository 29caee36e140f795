fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Only the FFmpeg decoder links native libraries
    if std::env::var_os("CARGO_FEATURE_FFMPEG").is_none() {
        return;
    }

    // Configure FFmpeg paths for macOS (Homebrew installation)
    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if target_os == "macos" && std::path::Path::new("/opt/homebrew/Cellar/ffmpeg").exists() {
        println!("cargo:rustc-link-search=/opt/homebrew/lib");
        for lib in ["avcodec", "avformat", "avutil", "swscale"] {
            println!("cargo:rustc-link-lib=dylib={}", lib);
        }
    }
}

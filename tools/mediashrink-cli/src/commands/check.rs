//! Check host capabilities.

use mediashrink_common::config::{config_file_path, AppConfig};

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("MediaShrink System Check");
    println!("{}", "=".repeat(50));

    let path = config_file_path();
    if path.exists() {
        println!("[OK] Config: {}", path.display());
    } else {
        println!("[OK] Config: defaults ({} not found)", path.display());
    }

    println!("[OK] Image codecs: JPEG, PNG, WebP");

    let all_ok = check_capture(config);

    println!();
    if all_ok {
        println!("Video and audio capture are available.");
    } else {
        println!("Video and audio need --simulate on this build.");
    }

    Ok(())
}

#[cfg(feature = "gstreamer")]
fn check_capture(config: &AppConfig) -> bool {
    use mediashrink_capture_engine::backend::{GstHost, GstHostOptions};
    use mediashrink_platform_core::CaptureHost;

    let host = match GstHost::new(GstHostOptions::default()) {
        Ok(host) => host,
        Err(e) => {
            println!("[FAIL] GStreamer: {e}");
            return false;
        }
    };
    println!("[OK] GStreamer initialized");

    let mut any_video = false;
    for mime in &config.video.format_preference {
        if host.is_type_supported(mime) {
            any_video = true;
            println!("     [OK]   {mime}");
        } else {
            println!("     [--]   {mime}");
        }
    }
    let audio_ok = host.is_type_supported(&config.audio.format);
    println!(
        "     [{}]   {}",
        if audio_ok { "OK" } else { "--" },
        config.audio.format
    );

    any_video && audio_ok
}

#[cfg(not(feature = "gstreamer"))]
fn check_capture(_config: &AppConfig) -> bool {
    println!("[WARN] GStreamer: not compiled in (build with --features gstreamer)");
    false
}

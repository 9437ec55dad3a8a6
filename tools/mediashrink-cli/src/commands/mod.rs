pub mod audio;
pub mod check;
pub mod config;
pub mod image;
pub mod lookup;
pub mod video;

use std::io::Write;
use std::path::{Path, PathBuf};

use mediashrink_media_model::{progress_channel, ProgressReporter};
use tokio::task::JoinHandle;

/// Reporter whose updates are echoed on a single terminal line.
///
/// Drop the reporter, then await the handle, to flush the final line.
pub(crate) fn progress_printer() -> (ProgressReporter, JoinHandle<()>) {
    let (tx, mut rx) = progress_channel();
    let handle = tokio::spawn(async move {
        let mut printed = false;
        while let Some(progress) = rx.recv().await {
            print!(
                "\r  Progress: {:>5.1}% ({:?})      ",
                progress.fraction * 100.0,
                progress.stage
            );
            let _ = std::io::stdout().flush();
            printed = true;
        }
        if printed {
            println!();
        }
    });
    (ProgressReporter::new(tx), handle)
}

/// `<dir of input>/<prefix><stem>.<ext>` unless an explicit path was given.
pub(crate) fn output_path(
    explicit: Option<PathBuf>,
    input: &Path,
    prefix: &str,
    stem: &str,
    ext: &str,
) -> PathBuf {
    explicit.unwrap_or_else(|| {
        let dir = input.parent().unwrap_or_else(|| Path::new("."));
        dir.join(format!("{prefix}{stem}.{ext}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_sits_next_to_input() {
        let path = output_path(None, Path::new("/tmp/in/clip.mp4"), "compressed_", "clip", "webm");
        assert_eq!(path, PathBuf::from("/tmp/in/compressed_clip.webm"));
    }

    #[test]
    fn explicit_output_wins() {
        let path = output_path(
            Some(PathBuf::from("out.jpg")),
            Path::new("photo.png"),
            "compressed_",
            "photo",
            "jpg",
        );
        assert_eq!(path, PathBuf::from("out.jpg"));
    }
}

//! Attach the source audio to an encoded video with the `ffmpeg` tool.

use std::path::Path;
use std::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    #[error("Failed to run ffmpeg: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("ffmpeg exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("Input file not found: {0}")]
    MissingInput(String),
}

/// Arguments for copying the video stream and adding the first audio stream,
/// cut to the shorter of the two.
pub fn mux_args(video: &Path, audio: &Path, output: &Path) -> Vec<String> {
    let path = |p: &Path| p.to_string_lossy().into_owned();
    vec![
        "-y".into(),
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        path(video),
        "-i".into(),
        path(audio),
        "-c:v".into(),
        "copy".into(),
        "-map".into(),
        "0:v:0".into(),
        "-map".into(),
        "1:a:0".into(),
        "-shortest".into(),
        path(output),
    ]
}

/// Mux `video` and `audio` into `output`.
pub fn mux_audio(video: &Path, audio: &Path, output: &Path) -> Result<(), MuxError> {
    mux_audio_with(Path::new("ffmpeg"), video, audio, output)
}

/// [`mux_audio`] with an explicit ffmpeg executable.
pub fn mux_audio_with(
    ffmpeg: &Path,
    video: &Path,
    audio: &Path,
    output: &Path,
) -> Result<(), MuxError> {
    for input in [video, audio] {
        if !input.exists() {
            return Err(MuxError::MissingInput(input.display().to_string()));
        }
    }

    log::info!("Muxing {} + {} -> {}", video.display(), audio.display(), output.display());
    let result = Command::new(ffmpeg)
        .args(mux_args(video, audio, output))
        .output()?;

    if !result.status.success() {
        return Err(MuxError::Failed {
            status: result.status.to_string(),
            stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
        });
    }
    Ok(())
}

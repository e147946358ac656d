//! ffmpeg child process as the upstream producer.
//!
//! ffmpeg decodes and rescales the video and writes raw RGB24 frames to
//! its stdout. Optionally it also binarises the picture itself with the
//! `threshold` filter, fed by constant gray/black/white colour planes.

use super::config::{SourceConfig, StreamConfig, ThresholdFilter};
use super::stream::{ByteSource, SourceError};
use std::ffi::OsString;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

/// Spawns ffmpeg and streams its raw video output.
#[derive(Debug)]
pub struct FfmpegSource {
    program: PathBuf,
    input: PathBuf,
    input_fps: Option<u32>,
    threshold_filter: Option<ThresholdFilter>,
    width: u32,
    height: u32,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
    finished: bool,
}

impl FfmpegSource {
    /// Creates a source decoding `input` to `stream.width x stream.height`.
    pub fn new(input: impl Into<PathBuf>, stream: &StreamConfig) -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            input: input.into(),
            input_fps: None,
            threshold_filter: None,
            width: stream.width,
            height: stream.height,
            child: None,
            stdout: None,
            stderr: None,
            finished: false,
        }
    }

    /// Builds a source from configuration; `None` if no input file is set.
    pub fn from_config(source: &SourceConfig, stream: &StreamConfig) -> Option<Self> {
        let input = source.input.clone()?;
        let mut ffmpeg = Self::new(input, stream).with_program(source.ffmpeg.clone());
        ffmpeg.input_fps = source.input_fps;
        ffmpeg.threshold_filter = source.threshold_filter;
        Some(ffmpeg)
    }

    /// Uses a specific ffmpeg binary.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Forces the input frame rate.
    pub fn with_input_fps(mut self, fps: u32) -> Self {
        self.input_fps = Some(fps);
        self
    }

    /// Enables ffmpeg-side binarisation.
    pub fn with_threshold_filter(mut self, filter: ThresholdFilter) -> Self {
        self.threshold_filter = Some(filter);
        self
    }

    /// Command-line arguments passed to ffmpeg.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-hide_banner".into(), "-nostdin".into()];

        if let Some(fps) = self.input_fps {
            args.push("-r".into());
            args.push(fps.to_string().into());
        }
        args.push("-i".into());
        args.push(self.input.clone().into_os_string());

        if let Some(filter) = self.threshold_filter {
            for colour in ["gray", "black", "white"] {
                args.push("-f".into());
                args.push("lavfi".into());
                args.push("-i".into());
                args.push(
                    format!(
                        "color={}:s={}x{}",
                        colour, filter.source_width, filter.source_height
                    )
                    .into(),
                );
            }
            args.push("-lavfi".into());
            args.push("threshold".into());
        }

        for arg in [
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "-s".to_string(),
            format!("{}x{}", self.width, self.height),
            "pipe:1".to_string(),
        ] {
            args.push(arg.into());
        }
        args
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args().iter().map(|a| a.to_string_lossy().into_owned()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn collect_stderr(&mut self) -> String {
        self.stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    }
}

impl ByteSource for FfmpegSource {
    fn open(&mut self) -> Result<(), SourceError> {
        let mut child = Command::new(&self.program)
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SourceError::Spawn {
                program: self.program.to_string_lossy().into_owned(),
                source,
            })?;

        tracing::info!(command = %self.command_line(), "Spawned ffmpeg");

        // Drain stderr on its own thread so a chatty ffmpeg cannot block
        // on a full pipe while we are reading stdout.
        self.stderr = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text);
                text
            })
        });
        self.stdout = child.stdout.take();
        self.child = Some(child);
        self.finished = false;
        Ok(())
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, SourceError> {
        let stdout = self.stdout.as_mut().ok_or(SourceError::NotOpen)?;
        loop {
            match stdout.read(buf) {
                Ok(0) => {
                    self.finished = true;
                    return Ok(0);
                }
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn close(&mut self) -> Result<(), SourceError> {
        self.stdout = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        if !self.finished {
            tracing::debug!("Stopping ffmpeg before end of stream");
            let _ = child.kill();
            let _ = child.wait();
            self.collect_stderr();
            return Ok(());
        }

        let status = child.wait()?;
        let stderr = self.collect_stderr();
        if status.success() {
            tracing::info!("ffmpeg finished");
            Ok(())
        } else {
            Err(SourceError::Exited {
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            })
        }
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_of(source: &FfmpegSource) -> Vec<String> {
        source
            .args()
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_plain_decode_args() {
        let source = FfmpegSource::new("video.mp4", &StreamConfig::with_dimensions(86, 64));
        let args = args_of(&source);

        assert_eq!(
            args,
            vec![
                "-hide_banner", "-nostdin", "-i", "video.mp4", "-f", "rawvideo", "-pix_fmt",
                "rgb24", "-s", "86x64", "pipe:1"
            ]
        );
    }

    #[test]
    fn test_threshold_filter_args() {
        let source = FfmpegSource::new("video.mp4", &StreamConfig::with_dimensions(86, 64))
            .with_input_fps(30)
            .with_threshold_filter(ThresholdFilter {
                source_width: 480,
                source_height: 360,
            });
        let args = args_of(&source);

        assert_eq!(&args[2..6], &["-r", "30", "-i", "video.mp4"]);
        assert!(args.contains(&"color=gray:s=480x360".to_string()));
        assert!(args.contains(&"color=black:s=480x360".to_string()));
        assert!(args.contains(&"color=white:s=480x360".to_string()));

        let lavfi = args.iter().position(|a| a == "-lavfi").unwrap();
        assert_eq!(args[lavfi + 1], "threshold");
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
    }

    #[test]
    fn test_from_config_requires_input() {
        let stream = StreamConfig::default();
        assert!(FfmpegSource::from_config(&SourceConfig::default(), &stream).is_none());

        let config = SourceConfig {
            input: Some(PathBuf::from("clip.mkv")),
            input_fps: Some(24),
            ..Default::default()
        };
        let source = FfmpegSource::from_config(&config, &stream).unwrap();
        assert_eq!(source.input_fps, Some(24));
    }

    #[test]
    fn test_missing_binary_reports_spawn_error() {
        let mut source = FfmpegSource::new("video.mp4", &StreamConfig::default())
            .with_program("/nonexistent/bw-frames-ffmpeg");
        assert!(matches!(source.open(), Err(SourceError::Spawn { .. })));
        assert!(matches!(
            source.read_chunk(&mut [0u8; 4]),
            Err(SourceError::NotOpen)
        ));
    }
}

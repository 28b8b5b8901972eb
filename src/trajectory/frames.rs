//! Video frame decoding and suffix alignment.
//!
//! Recordings start before the experiment does, so the video usually holds
//! more frames than the archive has steps. Only the last `steps + 1` frames
//! line up with the archive. Containers rarely support reliable seeking by
//! frame index, so [`align_suffix`] decodes sequentially: one pass to count
//! the frames, a second pass to skip the leading ones and keep the rest.

use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};

use serde::Deserialize;

use super::tensor::Frame;
use crate::error::LoadError;

// ---------------------------------------------------------------------------
// Decoder traits
// ---------------------------------------------------------------------------

/// Sequential access to decoded frames, from the start of the stream.
pub trait FrameReader {
    /// Decode the next frame, or `None` at the end of the stream.
    fn next_frame(&mut self) -> Result<Option<Frame>, LoadError>;

    /// Advance past one frame without keeping it. Returns `false` at the end.
    fn skip_frame(&mut self) -> Result<bool, LoadError> {
        Ok(self.next_frame()?.is_some())
    }
}

/// Something that can be decoded from the start, any number of times.
pub trait FrameSource {
    fn open(&self) -> Result<Box<dyn FrameReader + '_>, LoadError>;
}

// ---------------------------------------------------------------------------
// Alignment
// ---------------------------------------------------------------------------

/// Return the last `required` frames of `source`, in stream order.
///
/// Fails with [`LoadError::InsufficientFrames`] when the stream is shorter
/// than `required`.
pub fn align_suffix<S: FrameSource + ?Sized>(
    source: &S,
    required: usize,
) -> Result<Vec<Frame>, LoadError> {
    let total = count_frames(source)?;
    tracing::debug!(total, required, "Counted video frames");
    if total < required {
        return Err(LoadError::InsufficientFrames {
            available: total,
            required,
        });
    }

    let leading = total - required;
    let mut reader = source.open()?;
    for skipped in 0..leading {
        if !reader.skip_frame()? {
            return Err(LoadError::InsufficientFrames {
                available: skipped,
                required,
            });
        }
    }

    let mut frames = Vec::with_capacity(required);
    while frames.len() < required {
        match reader.next_frame()? {
            Some(frame) => frames.push(frame),
            None => {
                return Err(LoadError::InsufficientFrames {
                    available: frames.len(),
                    required,
                })
            }
        }
    }
    Ok(frames)
}

/// Decode the whole stream once, discarding the frames.
pub fn count_frames<S: FrameSource + ?Sized>(source: &S) -> Result<usize, LoadError> {
    let mut reader = source.open()?;
    let mut total = 0;
    while reader.skip_frame()? {
        total += 1;
    }
    Ok(total)
}

// ---------------------------------------------------------------------------
// In-memory frames
// ---------------------------------------------------------------------------

/// Frames already held in memory.
#[derive(Debug, Clone, Default)]
pub struct VecFrameSource {
    frames: Vec<Frame>,
}

impl VecFrameSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames }
    }
}

struct SliceReader<'a> {
    frames: std::slice::Iter<'a, Frame>,
}

impl FrameReader for SliceReader<'_> {
    fn next_frame(&mut self) -> Result<Option<Frame>, LoadError> {
        Ok(self.frames.next().cloned())
    }

    fn skip_frame(&mut self) -> Result<bool, LoadError> {
        Ok(self.frames.next().is_some())
    }
}

impl FrameSource for VecFrameSource {
    fn open(&self) -> Result<Box<dyn FrameReader + '_>, LoadError> {
        Ok(Box::new(SliceReader {
            frames: self.frames.iter(),
        }))
    }
}

// ---------------------------------------------------------------------------
// ffmpeg-backed decoding
// ---------------------------------------------------------------------------

/// Decodes a video file by running `ffmpeg` and reading raw RGB frames from
/// its standard output.
#[derive(Debug, Clone)]
pub struct FfmpegSource {
    path: PathBuf,
    ffmpeg_bin: String,
    ffprobe_bin: String,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: usize,
    height: usize,
}

impl FfmpegSource {
    pub fn new(path: impl AsRef<Path>, ffmpeg_bin: &str, ffprobe_bin: &str) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ffmpeg_bin: ffmpeg_bin.to_string(),
            ffprobe_bin: ffprobe_bin.to_string(),
        }
    }

    /// Width and height of the first video stream.
    pub fn probe_dimensions(&self) -> Result<(usize, usize), LoadError> {
        let output = Command::new(&self.ffprobe_bin)
            .arg("-v")
            .arg("error")
            .arg("-select_streams")
            .arg("v:0")
            .arg("-show_entries")
            .arg("stream=width,height")
            .arg("-of")
            .arg("json")
            .arg(&self.path)
            .output()
            .map_err(|e| LoadError::Video(format!("failed to run {}: {e}", self.ffprobe_bin)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            return Err(LoadError::Video(format!(
                "ffprobe failed on {}: {stderr}",
                self.path.display()
            )));
        }
        let probe: ProbeOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| LoadError::Video(format!("unreadable ffprobe output: {e}")))?;
        let stream = probe.streams.first().ok_or_else(|| {
            LoadError::Video(format!("{} has no video stream", self.path.display()))
        })?;
        if stream.width == 0 || stream.height == 0 {
            return Err(LoadError::Video(format!(
                "{} reports an empty frame size",
                self.path.display()
            )));
        }
        Ok((stream.width, stream.height))
    }
}

impl FrameSource for FfmpegSource {
    fn open(&self) -> Result<Box<dyn FrameReader + '_>, LoadError> {
        let (width, height) = self.probe_dimensions()?;
        let mut child = Command::new(&self.ffmpeg_bin)
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(&self.path)
            .arg("-vsync")
            .arg("0")
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("pipe:1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| LoadError::Video(format!("failed to run {}: {e}", self.ffmpeg_bin)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LoadError::Video("ffmpeg stdout was not captured".into()))?;
        let stderr = child.stderr.take().map(drain_stderr);
        Ok(Box::new(FfmpegReader {
            child,
            stdout: BufReader::new(stdout),
            stderr,
            width,
            height,
            buf: vec![0; width * height * 3],
            finished: false,
        }))
    }
}

/// Read the decoder's stderr on its own thread. ffmpeg stops emitting frames
/// once an unread stderr pipe fills up.
fn drain_stderr(mut pipe: ChildStderr) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut bytes = Vec::new();
        pipe.read_to_end(&mut bytes).ok();
        String::from_utf8_lossy(&bytes).into_owned()
    })
}

struct FfmpegReader {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
    width: usize,
    height: usize,
    buf: Vec<u8>,
    finished: bool,
}

impl FfmpegReader {
    /// Fill `buf` with the next raw frame. Returns `false` at end of stream.
    fn read_raw(&mut self) -> Result<bool, LoadError> {
        if self.finished {
            return Ok(false);
        }
        match self.stdout.read_exact(&mut self.buf) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                self.finish()?;
                Ok(false)
            }
            Err(e) => Err(LoadError::Io(e)),
        }
    }

    /// Reap the decoder and surface its error output if it failed.
    fn finish(&mut self) -> Result<(), LoadError> {
        self.finished = true;
        let status = self.child.wait()?;
        let stderr = self.collect_stderr();
        if status.success() {
            return Ok(());
        }
        Err(LoadError::Video(format!(
            "ffmpeg exited with {status}: {}",
            stderr.trim()
        )))
    }

    fn collect_stderr(&mut self) -> String {
        self.stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    }
}

impl FrameReader for FfmpegReader {
    fn next_frame(&mut self) -> Result<Option<Frame>, LoadError> {
        if !self.read_raw()? {
            return Ok(None);
        }
        let frame = Frame::from_shape_vec((self.height, self.width, 3), self.buf.clone())
            .map_err(|e| LoadError::Video(e.to_string()))?;
        Ok(Some(frame))
    }

    fn skip_frame(&mut self) -> Result<bool, LoadError> {
        self.read_raw()
    }
}

impl Drop for FfmpegReader {
    fn drop(&mut self) {
        if !self.finished {
            self.child.kill().ok();
            self.child.wait().ok();
            self.collect_stderr();
        }
    }
}

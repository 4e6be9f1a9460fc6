//! Movie backend that shells out to the system `ffprobe` and `ffmpeg` executables.
//!
//! Probing reads ffprobe's JSON stream report; decoding pipes one `rgba` rawvideo frame per
//! request out of ffmpeg; encoding pipes rawvideo frames into an ffmpeg child's stdin.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use anyhow::Context as _;
use kurbo::Rect;
use serde::Deserialize;

use crate::foundation::core::{Affine, FrameRGBA, Size};
use crate::foundation::error::{MovingImagesError, MovingImagesResult};
use crate::foundation::math::div_round_i128;
use crate::foundation::time::{MediaTime, TimeRange};
use crate::media::backend::{
    MediaBackend, MetadataItem, MovieFileType, MovieInfo, MovieSinkSpec, MovieSource, TrackInfo,
};
use crate::media::sink::{FrameSink, SinkConfig, VideoCodec};

/// Timescale reported for whole-movie durations.
const MOVIE_TIMESCALE: i32 = 600;

/// ffmpeg/ffprobe process backend.
#[derive(Clone, Debug)]
pub struct FfmpegBackend {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegBackend {
    /// Backend running the given executables.
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Whether both executables can be started.
    pub fn is_available(&self) -> bool {
        [&self.ffmpeg, &self.ffprobe].into_iter().all(|bin| {
            Command::new(bin)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|s| s.success())
                .unwrap_or(false)
        })
    }
}

impl MediaBackend for FfmpegBackend {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    #[tracing::instrument(level = "debug", skip(self))]
    fn open_movie(&self, path: &Path) -> MovingImagesResult<Box<dyn MovieSource>> {
        if !path.is_file() {
            return Err(MovingImagesError::operation_failed(format!(
                "movie file '{}' does not exist",
                path.display()
            )));
        }
        let out = Command::new(&self.ffprobe)
            .args(["-v", "error", "-print_format", "json", "-show_streams", "-show_format"])
            .arg(path)
            .output()
            .with_context(|| format!("run {}", self.ffprobe.display()))?;
        if !out.status.success() {
            return Err(MovingImagesError::operation_failed(format!(
                "ffprobe failed for '{}': {}",
                path.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        let (info, streams) = parse_probe(&out.stdout)?;
        Ok(Box::new(FfmpegSource {
            ffmpeg: self.ffmpeg.clone(),
            path: path.to_path_buf(),
            info,
            streams,
        }))
    }

    fn create_sink(&self, spec: &MovieSinkSpec) -> MovingImagesResult<Box<dyn FrameSink>> {
        Ok(Box::new(FfmpegSink {
            ffmpeg: self.ffmpeg.clone(),
            spec: spec.clone(),
            config: None,
            child: None,
            stdin: None,
            first: None,
            written: 0,
            last: Vec::new(),
        }))
    }
}

#[derive(Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Deserialize)]
struct ProbeStream {
    index: usize,
    id: Option<String>,
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    time_base: Option<String>,
    start_pts: Option<i64>,
    duration_ts: Option<i64>,
    duration: Option<String>,
    has_b_frames: Option<u32>,
    #[serde(default)]
    tags: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    #[serde(default)]
    tags: serde_json::Map<String, serde_json::Value>,
}

/// Turn ffprobe's JSON into a [`MovieInfo`], plus the ffmpeg stream index of every track.
fn parse_probe(bytes: &[u8]) -> MovingImagesResult<(MovieInfo, Vec<usize>)> {
    let parsed: ProbeOut = serde_json::from_slice(bytes)
        .context("parse ffprobe output")
        .map_err(|e| MovingImagesError::operation_failed(format!("{e:#}")))?;

    let mut tracks = Vec::new();
    let mut streams = Vec::new();
    for s in &parsed.streams {
        let media_type = match s.codec_type.as_deref() {
            Some("video") => "vide",
            Some("audio") => "soun",
            Some("subtitle") => "sbtl",
            Some("data") => "meta",
            _ => continue,
        };
        let timescale = s
            .time_base
            .as_deref()
            .and_then(parse_ratio)
            .filter(|(n, _)| *n == 1)
            .map_or(MOVIE_TIMESCALE, |(_, d)| i32::try_from(d).unwrap_or(MOVIE_TIMESCALE));
        let start = MediaTime::new(s.start_pts.unwrap_or(0).max(0), timescale);
        let duration = match (s.duration_ts, s.duration.as_deref()) {
            (Some(ts), _) => MediaTime::new(ts, timescale),
            (None, Some(secs)) => secs
                .parse::<f64>()
                .map_or(MediaTime::zero(), |d| MediaTime::from_seconds(d, timescale)),
            (None, None) => MediaTime::zero(),
        };
        let visual = media_type == "vide";
        let natural_size = match (s.width, s.height) {
            (Some(w), Some(h)) if visual => Size::new(f64::from(w), f64::from(h)),
            _ => Size::ZERO,
        };
        let rate = s.r_frame_rate.as_deref().and_then(parse_ratio).filter(|(n, _)| *n > 0);
        let min_frame_duration = match rate {
            Some((num, den)) if visual => {
                let v = div_round_i128(i128::from(timescale) * i128::from(den), i128::from(num));
                MediaTime::new(i64::try_from(v).unwrap_or(0), timescale)
            }
            _ => MediaTime::invalid(),
        };
        let frame_rate = s
            .avg_frame_rate
            .as_deref()
            .and_then(parse_ratio)
            .or(rate)
            .filter(|_| visual)
            .map_or(0.0, |(n, d)| n as f64 / d as f64);
        let rotation = s.side_data_list.iter().find_map(|d| d.rotation).unwrap_or(0.0);
        let language = s
            .tags
            .get("language")
            .and_then(|v| v.as_str())
            .unwrap_or("und")
            .to_owned();
        tracks.push(TrackInfo {
            track_id: s
                .id
                .as_deref()
                .and_then(|id| u32::from_str_radix(id.trim_start_matches("0x"), 16).ok())
                .unwrap_or(s.index as u32 + 1),
            media_type: media_type.to_owned(),
            enabled: true,
            time_range: TimeRange::new(start, duration),
            natural_size,
            transform: rotation_transform(rotation, natural_size),
            frame_rate,
            min_frame_duration,
            requires_frame_reordering: s.has_b_frames.unwrap_or(0) > 0,
            language_code: language,
            language_tag: String::new(),
            preferred_volume: if media_type == "soun" { 1.0 } else { 0.0 },
        });
        streams.push(s.index);
    }

    let format = parsed.format.as_ref();
    let duration = format
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .map_or(MediaTime::zero(), |d| MediaTime::from_seconds(d, MOVIE_TIMESCALE));
    let metadata = format
        .map(|f| {
            f.tags
                .iter()
                .filter(|(k, _)| !matches!(k.as_str(), "major_brand" | "minor_version" | "compatible_brands"))
                .map(|(k, v)| metadata_item(k, v))
                .collect()
        })
        .unwrap_or_default();

    Ok((
        MovieInfo {
            duration,
            tracks,
            metadata,
        },
        streams,
    ))
}

fn metadata_item(key: &str, value: &serde_json::Value) -> MetadataItem {
    let (format, keyspace) = if key.starts_with("com.apple.quicktime.") {
        ("com.apple.quicktime.mdta", "mdta")
    } else {
        ("com.apple.quicktime.udta", "udta")
    };
    MetadataItem {
        format: format.to_owned(),
        key: key.to_owned(),
        keyspace: keyspace.to_owned(),
        value: value.as_str().map_or_else(|| value.to_string(), str::to_owned),
    }
}

fn parse_ratio(s: &str) -> Option<(i64, i64)> {
    let (a, b) = s.split_once('/')?;
    let a = a.parse::<i64>().ok()?;
    let b = b.parse::<i64>().ok()?;
    (b > 0).then_some((a, b))
}

/// Display-matrix rotation as a preferred transform that keeps the picture in the positive quadrant.
fn rotation_transform(degrees: f64, size: Size) -> Affine {
    if degrees == 0.0 {
        return Affine::IDENTITY;
    }
    let rotate = Affine::rotate(-degrees.to_radians());
    let bbox = rotate.transform_rect_bbox(Rect::from_origin_size((0.0, 0.0), size));
    Affine::translate((-bbox.x0, -bbox.y0)) * rotate
}

struct FfmpegSource {
    ffmpeg: PathBuf,
    path: PathBuf,
    info: MovieInfo,
    streams: Vec<usize>,
}

impl MovieSource for FfmpegSource {
    fn info(&self) -> &MovieInfo {
        &self.info
    }

    #[tracing::instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    fn frame_at(&mut self, track_id: u32, time: MediaTime) -> MovingImagesResult<FrameRGBA> {
        let pos = self
            .info
            .tracks
            .iter()
            .position(|t| t.track_id == track_id)
            .ok_or_else(|| MovingImagesError::invalid_parameter(format!("no track {track_id}")))?;
        let track = &self.info.tracks[pos];
        let (width, height) = (track.natural_size.width as u32, track.natural_size.height as u32);
        if width == 0 || height == 0 {
            return Err(MovingImagesError::invalid_property(format!(
                "track {track_id} has no pictures"
            )));
        }
        let out = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-noautorotate", "-ss", &format!("{:.6}", time.seconds().max(0.0))])
            .arg("-i")
            .arg(&self.path)
            .args([
                "-map",
                &format!("0:{}", self.streams[pos]),
                "-frames:v",
                "1",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "pipe:1",
            ])
            .output()
            .with_context(|| format!("run {}", self.ffmpeg.display()))?;
        if !out.status.success() {
            return Err(MovingImagesError::operation_failed(format!(
                "ffmpeg decode failed for '{}': {}",
                self.path.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        let expected = width as usize * height as usize * 4;
        if out.stdout.len() < expected {
            return Err(MovingImagesError::operation_failed(format!(
                "no frame at {}s in '{}'",
                time.seconds(),
                self.path.display()
            )));
        }
        let mut data = out.stdout;
        data.truncate(expected);
        FrameRGBA::from_straight(width, height, data)
    }
}

struct FfmpegSink {
    ffmpeg: PathBuf,
    spec: MovieSinkSpec,
    config: Option<SinkConfig>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    first: Option<MediaTime>,
    written: i64,
    last: Vec<u8>,
}

fn codec_args(config: &SinkConfig) -> Vec<String> {
    let mut args: Vec<String> = match config.codec {
        VideoCodec::H264 => ["-c:v", "libx264", "-pix_fmt", "yuv420p"].map(String::from).to_vec(),
        VideoCodec::ProRes4444 => ["-c:v", "prores_ks", "-profile:v", "4444", "-pix_fmt", "yuva444p10le"]
            .map(String::from)
            .to_vec(),
        VideoCodec::ProRes422 => ["-c:v", "prores_ks", "-profile:v", "2", "-pix_fmt", "yuv422p10le"]
            .map(String::from)
            .to_vec(),
        VideoCodec::Jpeg => ["-c:v", "mjpeg", "-pix_fmt", "yuvj420p", "-q:v", "3"]
            .map(String::from)
            .to_vec(),
    };
    if let Some(rate) = config.bit_rate {
        args.extend(["-b:v".to_owned(), rate.to_string()]);
    }
    args
}

fn container(file_type: MovieFileType) -> &'static str {
    match file_type {
        MovieFileType::Mpeg4 => "mp4",
        MovieFileType::QuickTime => "mov",
        MovieFileType::M4v => "ipod",
    }
}

fn ensure_parent_dir(path: &Path) -> MovingImagesResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

impl FfmpegSink {
    fn write_raw(&mut self, bytes: &[u8]) -> MovingImagesResult<()> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(MovingImagesError::operation_failed("ffmpeg encoder is already finalized"));
        };
        stdin
            .write_all(bytes)
            .context("write frame to ffmpeg stdin")
            .map_err(|e| MovingImagesError::operation_failed(format!("{e:#}")))
    }
}

impl FrameSink for FfmpegSink {
    #[tracing::instrument(level = "debug", skip(self, config), fields(path = %self.spec.path.display()))]
    fn begin(&mut self, config: &SinkConfig) -> MovingImagesResult<()> {
        config.validate()?;
        if self.config.is_some() {
            return Err(MovingImagesError::operation_failed("encoder already started"));
        }
        if !config.codec.keeps_alpha() && (config.width % 2 != 0 || config.height % 2 != 0) {
            return Err(MovingImagesError::invalid_parameter(format!(
                "{} output needs even width/height, got {}x{}",
                config.codec.fourcc(),
                config.width,
                config.height
            )));
        }
        ensure_parent_dir(&self.spec.path)?;
        let (num, den) = config.rate();
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .args(["-y", "-loglevel", "error", "-f", "rawvideo", "-pix_fmt", "rgba"])
            .args(["-s", &format!("{}x{}", config.width, config.height)])
            .args(["-framerate", &format!("{num}/{den}")])
            .args(["-i", "pipe:0", "-an"])
            .args(codec_args(config))
            .args(["-f", container(self.spec.file_type)])
            .arg(&self.spec.path);
        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawn {} (is it installed?)", self.ffmpeg.display()))?;
        self.stdin = child.stdin.take();
        if self.stdin.is_none() {
            return Err(MovingImagesError::operation_failed("failed to open ffmpeg stdin"));
        }
        self.child = Some(child);
        self.config = Some(config.clone());
        Ok(())
    }

    /// Constant frame rate output: gaps before `time` repeat the previous frame.
    fn push_frame(&mut self, time: MediaTime, frame: &FrameRGBA) -> MovingImagesResult<()> {
        let Some(cfg) = self.config.clone() else {
            return Err(MovingImagesError::operation_failed("encoder not started"));
        };
        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(MovingImagesError::invalid_parameter(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }
        let first = *self.first.get_or_insert(time);
        let elapsed = time.sub(&first).convert_scale(cfg.frame_duration.timescale);
        let index = div_round_i128(i128::from(elapsed.value), i128::from(cfg.frame_duration.value));
        let index = i64::try_from(index).unwrap_or(0);
        while self.written < index && !self.last.is_empty() {
            let last = std::mem::take(&mut self.last);
            self.write_raw(&last)?;
            self.last = last;
            self.written += 1;
        }
        let bytes = if cfg.codec.keeps_alpha() {
            frame.to_straight()
        } else {
            // Premultiplied colour over black is the colour itself.
            let mut opaque = frame.data.clone();
            opaque.chunks_exact_mut(4).for_each(|px| px[3] = 255);
            opaque
        };
        self.write_raw(&bytes)?;
        self.last = bytes;
        self.written += 1;
        Ok(())
    }

    fn end(&mut self) -> MovingImagesResult<()> {
        drop(self.stdin.take());
        let Some(child) = self.child.take() else {
            return Err(MovingImagesError::operation_failed("encoder not started"));
        };
        let output = child.wait_with_output().context("wait for ffmpeg to finish")?;
        if !output.status.success() {
            return Err(MovingImagesError::operation_failed(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    fn cancel(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        let _ = std::fs::remove_file(&self.spec.path);
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if self.child.is_some() {
            self.cancel();
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/ffmpeg.rs"]
mod tests;

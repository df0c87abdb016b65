//! FFmpeg-backed frame source.
//!
//! [`VideoSource`] opens a container, picks its best video stream and
//! implements [`Iterator`] over decoded [`Frame`]s. Each call to
//! [`next()`](Iterator::next) reads and decodes just enough packets to
//! produce one frame; nothing is decoded ahead of demand.
//!
//! All FFmpeg state (demuxer, decoder, colour converter) is owned by the
//! source and freed when it is dropped, so a consumer that stops early
//! releases the file immediately.
//!
//! # Example
//!
//! ```no_run
//! use chaptermark::{ChaptermarkError, VideoSource};
//!
//! let source = VideoSource::open("lecture.mp4")?;
//! println!("{}x{}", source.metadata().width, source.metadata().height);
//! for frame in source.take(10) {
//!     let frame = frame?;
//!     println!("frame at {:.0} ms", frame.timestamp_ms());
//! }
//! # Ok::<(), ChaptermarkError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    util::error::EAGAIN,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::RgbImage;

use crate::{error::ChaptermarkError, frame::Frame, metadata::VideoMetadata};

/// A lazy, forward-only sequence of decoded frames from one video file.
pub struct VideoSource {
    input_context: Input,
    decoder: VideoDecoder,
    /// Built on the first decoded frame and rebuilt if the decoder changes
    /// pixel format or size mid-stream.
    scaler: Option<ScalingContext>,
    video_stream_index: usize,
    time_base: Rational,
    start_timestamp: i64,
    metadata: VideoMetadata,
    decode_timeout: Option<Duration>,
    decoded_frame: VideoFrame,
    rgb_frame: VideoFrame,
    frames_decoded: u64,
    last_timestamp_ms: f64,
    eof_sent: bool,
    done: bool,
    path: PathBuf,
}

impl Debug for VideoSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoSource")
            .field("path", &self.path)
            .field("metadata", &self.metadata)
            .field("decode_timeout", &self.decode_timeout)
            .field("frames_decoded", &self.frames_decoded)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl VideoSource {
    /// Open a video file.
    ///
    /// Initialises FFmpeg, opens the container, selects the best video
    /// stream and creates its decoder. No frame is decoded yet.
    ///
    /// # Errors
    ///
    /// Returns [`ChaptermarkError::SourceUnavailable`] if the file is
    /// missing or unreadable, has no video stream, or uses a codec FFmpeg
    /// cannot decode.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ChaptermarkError> {
        let path = path.as_ref().to_path_buf();
        let unavailable = |reason: String| ChaptermarkError::SourceUnavailable {
            path: path.clone(),
            reason,
        };

        log::debug!("Opening video source: {}", path.display());

        crate::ffmpeg::initialize()
            .map_err(|error| unavailable(format!("FFmpeg initialisation failed: {error}")))?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| unavailable(error.to_string()))?;

        let (video_stream_index, time_base, start_timestamp, frames_per_second, decoder) = {
            let stream = input_context
                .streams()
                .best(Type::Video)
                .ok_or_else(|| unavailable("no video stream found".to_string()))?;

            let decoder_context = CodecContext::from_parameters(stream.parameters())
                .map_err(|error| unavailable(format!("unreadable codec parameters: {error}")))?;
            let decoder = decoder_context
                .decoder()
                .video()
                .map_err(|error| unavailable(format!("unsupported video codec: {error}")))?;

            let start_time = stream.start_time();
            let start_timestamp = if start_time == ffmpeg_sys_next::AV_NOPTS_VALUE {
                0
            } else {
                start_time
            };

            (
                stream.index(),
                stream.time_base(),
                start_timestamp,
                crate::utilities::frames_per_second(stream.avg_frame_rate(), stream.rate()),
                decoder,
            )
        };

        let duration_microseconds = input_context.duration();
        let duration = if duration_microseconds > 0 {
            Duration::from_micros(duration_microseconds as u64)
        } else {
            Duration::ZERO
        };

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            frames_per_second,
            frame_count: (duration.as_secs_f64() * frames_per_second) as u64,
            duration,
            codec: decoder
                .codec()
                .map(|codec| codec.name().to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            format: input_context.format().name().to_string(),
            stream_index: video_stream_index,
        };

        log::debug!(
            "Selected video stream {} ({}, {}x{}, {:.3} fps, ~{} frames)",
            video_stream_index,
            metadata.codec,
            metadata.width,
            metadata.height,
            metadata.frames_per_second,
            metadata.frame_count,
        );

        Ok(Self {
            input_context,
            decoder,
            scaler: None,
            video_stream_index,
            time_base,
            start_timestamp,
            metadata,
            decode_timeout: None,
            decoded_frame: VideoFrame::empty(),
            rgb_frame: VideoFrame::empty(),
            frames_decoded: 0,
            last_timestamp_ms: 0.0,
            eof_sent: false,
            done: false,
            path,
        })
    }

    /// Bound the wall-clock time spent producing one frame.
    ///
    /// The bound is checked between packets; when it is exceeded the source
    /// yields [`ChaptermarkError::DecodeTimeout`] and ends.
    #[must_use]
    pub fn with_decode_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.decode_timeout = timeout;
        self
    }

    /// Metadata of the decoded stream.
    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// Path the source was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of frames produced so far.
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// Position of the frame in `decoded_frame`, made monotonic.
    fn current_timestamp_ms(&mut self) -> f64 {
        let raw = self
            .decoded_frame
            .timestamp()
            .or_else(|| self.decoded_frame.pts())
            .map(|timestamp| {
                crate::utilities::stream_timestamp_to_milliseconds(
                    timestamp,
                    self.start_timestamp,
                    self.time_base,
                )
            })
            .unwrap_or(self.last_timestamp_ms)
            .max(0.0);

        if raw < self.last_timestamp_ms {
            log::warn!(
                "Frame {} reports {:.3} ms, before the previous {:.3} ms; keeping the previous position",
                self.frames_decoded,
                raw,
                self.last_timestamp_ms,
            );
        }

        self.last_timestamp_ms = raw.max(self.last_timestamp_ms);
        self.last_timestamp_ms
    }

    /// Convert the frame in `decoded_frame` to an RGB [`Frame`].
    fn convert_current_frame(&mut self) -> Result<Frame, ChaptermarkError> {
        let format = self.decoded_frame.format();
        let width = self.decoded_frame.width();
        let height = self.decoded_frame.height();

        if width == 0 || height == 0 {
            return Err(ChaptermarkError::InvalidFrame {
                width,
                height,
                reason: "decoder produced an empty picture".to_string(),
            });
        }

        let mut scaler = match self.scaler.take() {
            Some(scaler)
                if scaler.input().format == format
                    && scaler.input().width == width
                    && scaler.input().height == height =>
            {
                scaler
            }
            previous => {
                if previous.is_some() {
                    log::debug!("Decoder output changed to {format:?} {width}x{height}");
                }
                ScalingContext::get(
                    format,
                    width,
                    height,
                    Pixel::RGB24,
                    width,
                    height,
                    ScalingFlags::BILINEAR,
                )?
            }
        };
        scaler.run(&self.decoded_frame, &mut self.rgb_frame)?;
        self.scaler = Some(scaler);

        let buffer = crate::utilities::rgb_plane_to_buffer(&self.rgb_frame, width, height);
        let image = RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
            ChaptermarkError::VideoDecodeError(
                "Failed to construct RGB image from decoded frame data".to_string(),
            )
        })?;

        let timestamp_ms = self.current_timestamp_ms();
        Ok(Frame::new(timestamp_ms, image))
    }

    fn fail(&mut self, error: ChaptermarkError) -> Option<Result<Frame, ChaptermarkError>> {
        self.done = true;
        Some(Err(error))
    }
}

/// What one `receive_frame` call produced.
#[derive(Debug, PartialEq)]
enum Received {
    Frame,
    /// The decoder wants another packet.
    NeedsInput,
    /// End of stream after `send_eof`.
    Drained,
    Failed(FfmpegError),
}

fn classify_receive(result: Result<(), FfmpegError>) -> Received {
    match result {
        Ok(()) => Received::Frame,
        Err(FfmpegError::Other { errno }) if errno == EAGAIN => Received::NeedsInput,
        Err(FfmpegError::Eof) => Received::Drained,
        Err(error) => Received::Failed(error),
    }
}

impl Iterator for VideoSource {
    type Item = Result<Frame, ChaptermarkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let started = Instant::now();

        loop {
            match classify_receive(self.decoder.receive_frame(&mut self.decoded_frame)) {
                Received::Frame => {
                    return match self.convert_current_frame() {
                        Ok(frame) => {
                            self.frames_decoded += 1;
                            Some(Ok(frame))
                        }
                        Err(error) => self.fail(error),
                    };
                }
                Received::Failed(error) => {
                    return self.fail(ChaptermarkError::VideoDecodeError(error.to_string()));
                }
                Received::Drained | Received::NeedsInput => {}
            }

            if self.eof_sent {
                log::debug!(
                    "Video source {} exhausted after {} frames",
                    self.path.display(),
                    self.frames_decoded
                );
                self.done = true;
                return None;
            }

            if let Some(timeout) = self.decode_timeout.filter(|&t| started.elapsed() > t) {
                return self.fail(ChaptermarkError::DecodeTimeout {
                    frame_index: self.frames_decoded,
                    timeout,
                });
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input_context) {
                Ok(()) => {
                    if packet.stream() != self.video_stream_index {
                        continue;
                    }
                    if let Err(error) = self.decoder.send_packet(&packet) {
                        return self.fail(ChaptermarkError::VideoDecodeError(error.to_string()));
                    }
                }
                Err(FfmpegError::Eof) => {
                    if let Err(error) = self.decoder.send_eof() {
                        return self.fail(ChaptermarkError::from(error));
                    }
                    self.eof_sent = true;
                }
                Err(error) => {
                    return self.fail(ChaptermarkError::VideoDecodeError(error.to_string()));
                }
            }
        }
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        log::debug!(
            "Releasing video source {} after {} frames",
            self.path.display(),
            self.frames_decoded
        );
    }
}

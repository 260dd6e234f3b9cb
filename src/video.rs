use ffmpeg_next as ffmpeg;
use ffmpeg_next::sys::AVSEEK_FLAG_FRAME;
use ffmpeg_next::{format, format::Pixel, media, software::scaling, util::frame::video::Video};
use image::ImageBuffer;
use tracing::{debug, warn};

use crate::error::{MarkpipeError, MarkpipeResult};
use crate::playback::{Decoder, Frame};

const FALLBACK_FPS: f64 = 25.0;

/// Frame-index decoder over a video file. Seeks land on the nearest keyframe
/// the container gives us; playback position is tracked in decoded frames.
pub struct FfmpegDecoder {
    ictx: format::context::Input,
    decoder: ffmpeg::decoder::Video,
    scaler: scaling::Context,
    stream_index: usize,
    position: i64,
    frame_count: i64,
    fps: f64,
    eof: bool,
}

impl FfmpegDecoder {
    pub fn open(path: &str) -> MarkpipeResult<FfmpegDecoder> {
        ffmpeg::init().map_err(|source| MarkpipeError::VideoOpen {
            path: path.to_string(),
            source,
        })?;

        let ictx = format::input(&path).map_err(|source| MarkpipeError::VideoOpen {
            path: path.to_string(),
            source,
        })?;

        let (stream_index, parameters, raw_fps, nb_frames, stream_duration, time_base) = {
            let stream = ictx
                .streams()
                .best(media::Type::Video)
                .ok_or(MarkpipeError::VideoOpen {
                    path: path.to_string(),
                    source: ffmpeg::Error::StreamNotFound,
                })?;
            (
                stream.index(),
                stream.parameters(),
                f64::from(stream.avg_frame_rate()),
                stream.frames(),
                stream.duration(),
                f64::from(stream.time_base()),
            )
        };

        let fps = if raw_fps.is_finite() && raw_fps > 0.0 {
            raw_fps
        } else {
            warn!("invalid fps {} reported, using {}", raw_fps, FALLBACK_FPS);
            FALLBACK_FPS
        };

        // containers without nb_frames fall back to a duration-derived count
        let mut frame_count = if nb_frames > 0 {
            nb_frames
        } else if stream_duration > 0 {
            (stream_duration as f64 * time_base * fps).round() as i64
        } else {
            0
        };
        if frame_count == 0 && ictx.duration() > 0 {
            // container-level duration is in AV_TIME_BASE (microseconds)
            frame_count = (ictx.duration() as f64 / 1_000_000.0 * fps).round() as i64;
        }

        let context_decoder = ffmpeg::codec::context::Context::from_parameters(parameters)?;
        let decoder = context_decoder.decoder().video()?;

        let scaler = scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            scaling::Flags::BILINEAR,
        )?;

        debug!(
            "opened {}: {}x{}, {} frames at {} fps",
            path,
            decoder.width(),
            decoder.height(),
            frame_count,
            fps
        );

        Ok(FfmpegDecoder {
            ictx,
            decoder,
            scaler,
            stream_index,
            position: 0,
            frame_count,
            fps,
            eof: false,
        })
    }

    fn to_rgb(&mut self, decoded: &Video) -> MarkpipeResult<Frame> {
        let mut rgb_frame = Video::empty();
        self.scaler.run(decoded, &mut rgb_frame)?;

        let width = self.decoder.width();
        let height = self.decoder.height();
        let stride = rgb_frame.stride(0);
        let row_len = width as usize * 3;

        // scaler rows can be padded past width * 3
        let data = rgb_frame.data(0);
        let mut buffer = Vec::with_capacity(row_len * height as usize);
        for row in data.chunks(stride).take(height as usize) {
            buffer.extend_from_slice(&row[..row_len]);
        }

        ImageBuffer::from_raw(width, height, buffer)
            .ok_or(MarkpipeError::Decode(ffmpeg::Error::InvalidData))
    }
}

impl Decoder for FfmpegDecoder {
    fn position(&self) -> i64 {
        self.position
    }

    fn seek(&mut self, frame: i64) -> MarkpipeResult<()> {
        seek_to_frame(&mut self.ictx, frame)?;
        self.decoder.flush();
        self.eof = false;
        self.position = frame;
        Ok(())
    }

    fn next_frame(&mut self) -> MarkpipeResult<Option<Frame>> {
        loop {
            let mut decoded = Video::empty();
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                self.position += 1;
                return Ok(Some(self.to_rgb(&decoded)?));
            }

            if self.eof {
                return Ok(None);
            }

            let stream_index = self.stream_index;
            match self
                .ictx
                .packets()
                .find(|(stream, _)| stream.index() == stream_index)
            {
                Some((_, packet)) => {
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        // a broken packet mid-stream ends the interval, it is
                        // not a fatal condition
                        warn!("decode failed at frame {}: {}", self.position, e);
                        return Ok(None);
                    }
                }
                None => {
                    self.eof = true;
                    let _ = self.decoder.send_eof();
                }
            }
        }
    }

    fn frame_count(&self) -> i64 {
        self.frame_count
    }

    fn fps(&self) -> f64 {
        self.fps
    }
}

fn seek_to_frame(ictx: &mut format::context::Input, frame_number: i64) -> Result<(), ffmpeg::Error> {
    // SAFETY: ictx owns a valid AVFormatContext for its whole lifetime and
    // avformat_seek_file does not retain the pointer past the call.
    unsafe {
        let ret = ffmpeg::sys::avformat_seek_file(
            ictx.as_mut_ptr(),
            -1,
            i64::MIN,
            frame_number,
            i64::MAX,
            AVSEEK_FLAG_FRAME,
        );

        if ret < 0 {
            Err(ffmpeg::Error::from(ret))
        } else {
            Ok(())
        }
    }
}

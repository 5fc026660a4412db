//! Uploaded video source.
//!
//! The upload is written to a temporary file named with the upload's
//! extension, and that file is decoded frame by frame in container order.
//! The source is responsible for:
//! - Decoding every frame exactly once, in order (no seeking, no skipping)
//! - Producing frames as fast as they decode (no real-time pacing)
//! - Removing the temporary file on release, on every exit path
//!
//! GIF is decoded with the `image` crate; MP4/AVI/MOV go through FFmpeg and
//! need the `ingest-file-ffmpeg` feature.

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

use anyhow::{Context, Result};
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage};
use tempfile::NamedTempFile;

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::{FrameSource, Upload, VIDEO_EXTENSIONS};
use crate::error::PipelineError;
use crate::frame::Frame;

/// Frame-by-frame decoder over an uploaded video.
pub struct VideoSource {
    name: String,
    temp: Option<NamedTempFile>,
    decoder: Option<VideoDecoder>,
    frames_decoded: u64,
}

enum VideoDecoder {
    Gif(GifFrames),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

struct GifFrames {
    frames: image::Frames<'static>,
}

impl VideoSource {
    /// Validate the upload, spill it to a temp file and open a decoder on it.
    pub fn from_upload(upload: &Upload) -> Result<Self, PipelineError> {
        let ext = upload.accepted_extension(VIDEO_EXTENSIONS)?;
        let what = || format!("video '{}'", upload.name());

        let temp = write_temp(upload, &ext).map_err(|e| PipelineError::decode(what(), &e))?;
        let decoder =
            open_decoder(temp.path(), &ext).map_err(|e| PipelineError::decode(what(), &e))?;
        log::info!(
            "VideoSource: opened {} via {}",
            upload.name(),
            temp.path().display()
        );

        Ok(Self {
            name: upload.name().to_string(),
            temp: Some(temp),
            decoder: Some(decoder),
            frames_decoded: 0,
        })
    }

    /// Location of the temp file while the source holds it.
    pub fn temp_path(&self) -> Option<&Path> {
        self.temp.as_ref().map(|t| t.path())
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }
}

impl FrameSource for VideoSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(None);
        };
        let index = self.frames_decoded;
        let image = match decoder {
            VideoDecoder::Gif(gif) => gif.next_image(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            VideoDecoder::Ffmpeg(ffmpeg) => ffmpeg.next_image(),
        }
        .with_context(|| format!("decode frame {} of {}", index, self.name))?;

        Ok(image.map(|image| {
            self.frames_decoded += 1;
            Frame::new(image, index)
        }))
    }

    fn release(&mut self) {
        self.decoder = None;
        if let Some(temp) = self.temp.take() {
            let path = temp.path().to_path_buf();
            if let Err(e) = temp.close() {
                log::warn!(
                    "VideoSource: failed to remove temp file {}: {}",
                    path.display(),
                    e
                );
            }
            log::info!(
                "VideoSource: released {} after {} frames",
                self.name,
                self.frames_decoded
            );
        }
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        self.release();
    }
}

impl GifFrames {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let decoder = GifDecoder::new(BufReader::new(file)).context("read GIF header")?;
        Ok(Self {
            frames: decoder.into_frames(),
        })
    }

    fn next_image(&mut self) -> Result<Option<image::RgbImage>> {
        match self.frames.next() {
            Some(frame) => {
                let frame = frame.context("decode GIF frame")?;
                Ok(Some(DynamicImage::ImageRgba8(frame.into_buffer()).into_rgb8()))
            }
            None => Ok(None),
        }
    }
}

/// Prefix of the temp file an upload is spilled to: `road-damage-<stem>-`.
pub fn temp_prefix(upload: &Upload) -> String {
    let stem: String = Path::new(upload.name())
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(32)
        .collect();
    format!("road-damage-{stem}-")
}

fn write_temp(upload: &Upload, ext: &str) -> Result<NamedTempFile> {
    let mut temp = tempfile::Builder::new()
        .prefix(&temp_prefix(upload))
        .suffix(&format!(".{ext}"))
        .tempfile()
        .context("create temp file for video upload")?;
    temp.write_all(upload.bytes()).context("write video upload")?;
    temp.flush().context("flush video upload")?;
    Ok(temp)
}

fn open_decoder(path: &Path, ext: &str) -> Result<VideoDecoder> {
    if ext == "gif" {
        return Ok(VideoDecoder::Gif(GifFrames::open(path)?));
    }
    #[cfg(feature = "ingest-file-ffmpeg")]
    {
        Ok(VideoDecoder::Ffmpeg(FfmpegFileSource::open(path)?))
    }
    // VIDEO_EXTENSIONS holds only gif without FFmpeg.
    #[cfg(not(feature = "ingest-file-ffmpeg"))]
    {
        anyhow::bail!("no decoder for .{} video", ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifEncoder;
    use image::{Rgba, RgbaImage};

    fn gif_bytes(levels: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut bytes);
            for &level in levels {
                let img = RgbaImage::from_pixel(8, 6, Rgba([level, level, level, 255]));
                encoder.encode_frame(image::Frame::new(img)).unwrap();
            }
        }
        bytes
    }

    #[test]
    fn gif_frames_come_out_in_order_then_end() -> Result<()> {
        let upload = Upload::new("clip.gif", gif_bytes(&[0, 80, 160, 240]));
        let mut source = VideoSource::from_upload(&upload)?;

        let mut levels = Vec::new();
        while let Some(frame) = source.next_frame()? {
            assert_eq!(frame.dimensions(), (8, 6));
            assert_eq!(frame.index(), levels.len() as u64);
            levels.push(frame.image().get_pixel(0, 0).0[0]);
        }
        assert_eq!(levels.len(), 4);
        assert!(levels.windows(2).all(|w| w[0] < w[1]), "{levels:?}");
        assert_eq!(source.frames_decoded(), 4);
        Ok(())
    }

    #[test]
    fn release_removes_the_temp_file_once() -> Result<()> {
        let upload = Upload::new("clip.gif", gif_bytes(&[10, 20]));
        let mut source = VideoSource::from_upload(&upload)?;
        let path = source.temp_path().unwrap().to_path_buf();
        assert!(path.exists());
        assert_eq!(path.extension().unwrap(), "gif");
        let file_name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(file_name.starts_with("road-damage-clip-"), "{file_name}");

        source.release();
        assert!(!path.exists());
        assert!(source.temp_path().is_none());
        assert!(source.next_frame()?.is_none());
        source.release();
        Ok(())
    }

    #[test]
    fn corrupt_video_is_a_decode_failure() {
        let upload = Upload::new("clip.gif", b"definitely not a gif".to_vec());
        let err = VideoSource::from_upload(&upload).err().unwrap();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }

    #[cfg(not(feature = "ingest-file-ffmpeg"))]
    #[test]
    fn ffmpeg_containers_are_unsupported_without_ffmpeg() {
        for name in ["drive.mp4", "drive.avi", "drive.MOV"] {
            let err = VideoSource::from_upload(&Upload::new(name, vec![0; 16]))
                .err()
                .unwrap();
            assert!(
                matches!(err, PipelineError::UnsupportedUpload { .. }),
                "{name}: {err}"
            );
        }
    }

    #[test]
    fn unsupported_container_is_rejected() {
        let err = VideoSource::from_upload(&Upload::new("clip.webm", vec![1, 2, 3]))
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::UnsupportedUpload { .. }));
    }
}

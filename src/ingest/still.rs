//! Still image source: one upload, one frame.

use anyhow::Result;

use super::{FrameSource, Upload, IMAGE_EXTENSIONS};
use crate::error::PipelineError;
use crate::frame::Frame;

/// Yields a single decoded image, then end-of-stream.
pub struct StillImageSource {
    frame: Option<Frame>,
}

impl StillImageSource {
    /// Validate the upload's extension and decode it.
    pub fn from_upload(upload: &Upload) -> Result<Self, PipelineError> {
        Ok(Self::from_frame(decode_upload(upload)?))
    }

    pub fn from_frame(frame: Frame) -> Self {
        Self { frame: Some(frame) }
    }
}

/// Decode an image upload into frame 0.
pub fn decode_upload(upload: &Upload) -> Result<Frame, PipelineError> {
    upload.accepted_extension(IMAGE_EXTENSIONS)?;
    let image = image::load_from_memory(upload.bytes()).map_err(|e| PipelineError::Decode {
        what: format!("image '{}'", upload.name()),
        reason: e.to_string(),
    })?;
    log::debug!(
        "StillImageSource: decoded {} ({}x{})",
        upload.name(),
        image.width(),
        image.height()
    );
    Ok(Frame::from_dynamic(image, 0))
}

impl FrameSource for StillImageSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.frame.take())
    }

    fn release(&mut self) {
        self.frame = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_upload(name: &str, w: u32, h: u32) -> Upload {
        let img = image::RgbImage::from_pixel(w, h, image::Rgb([90, 90, 90]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        Upload::new(name, bytes)
    }

    #[test]
    fn yields_exactly_one_frame() {
        let mut source = StillImageSource::from_upload(&png_upload("road.png", 31, 17)).unwrap();
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!(frame.dimensions(), (31, 17));
        assert_eq!(frame.index(), 0);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn rejects_wrong_extension_before_decoding() {
        let err = StillImageSource::from_upload(&png_upload("road.bmp", 4, 4))
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::UnsupportedUpload { .. }));
    }

    #[test]
    fn corrupt_bytes_are_a_decode_failure() {
        let err = StillImageSource::from_upload(&Upload::new("road.jpg", b"nope".to_vec()))
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }
}

//! Live camera source.
//!
//! `WebcamSource` pulls frames from a local capture device. Real devices go
//! through V4L2 (feature `ingest-v4l2`); a `stub://` device path produces
//! synthetic frames so the webcam loop can be exercised without hardware.
//!
//! A source is opened fresh for every streaming session and released when
//! the session ends. A camera never reports end-of-stream: `next_frame`
//! either yields a frame or fails.

use anyhow::{Context, Result};
#[cfg(feature = "ingest-v4l2")]
use ouroboros::self_referencing;

use super::FrameSource;
#[cfg(feature = "ingest-v4l2")]
use super::normalize::{normalize_to_rgb, PixelFormat};
use crate::config::CameraSettings;
use crate::frame::{rgb_len, Frame};

const STUB_DEVICE_PREFIX: &str = "stub://";

pub struct WebcamSource {
    device: String,
    backend: Option<WebcamBackend>,
    frames_captured: u64,
}

enum WebcamBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "ingest-v4l2")]
    Device(DeviceCamera),
}

impl WebcamSource {
    /// Open the configured device and start capturing.
    pub fn open(settings: &CameraSettings) -> Result<Self> {
        let backend = if settings.device.starts_with(STUB_DEVICE_PREFIX) {
            WebcamBackend::Synthetic(SyntheticCamera::new(settings.width, settings.height)?)
        } else {
            open_device(settings)?
        };
        log::info!("WebcamSource: opened {}", settings.device);
        Ok(Self {
            device: settings.device.clone(),
            backend: Some(backend),
            frames_captured: 0,
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames_captured
    }

    pub fn is_open(&self) -> bool {
        self.backend.is_some()
    }
}

#[cfg(feature = "ingest-v4l2")]
fn open_device(settings: &CameraSettings) -> Result<WebcamBackend> {
    Ok(WebcamBackend::Device(DeviceCamera::open(settings)?))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_device(settings: &CameraSettings) -> Result<WebcamBackend> {
    anyhow::bail!(
        "camera {} requires the ingest-v4l2 feature (use stub:// for synthetic frames)",
        settings.device
    )
}

impl FrameSource for WebcamSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let backend = self.backend.as_mut().context("camera is not open")?;
        let image = match backend {
            WebcamBackend::Synthetic(camera) => camera.capture()?,
            #[cfg(feature = "ingest-v4l2")]
            WebcamBackend::Device(camera) => camera.capture()?,
        };
        let frame = Frame::new(image, self.frames_captured);
        self.frames_captured += 1;
        Ok(Some(frame))
    }

    fn release(&mut self) {
        if self.backend.take().is_some() {
            log::info!(
                "WebcamSource: released {} after {} frames",
                self.device,
                self.frames_captured
            );
        }
    }
}

impl Drop for WebcamSource {
    fn drop(&mut self) {
        self.release();
    }
}

// ----------------------------------------------------------------------------
// Synthetic camera (stub://)
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    width: u32,
    height: u32,
    tick: u64,
}

impl SyntheticCamera {
    fn new(width: u32, height: u32) -> Result<Self> {
        rgb_len(width, height)?;
        Ok(Self {
            width,
            height,
            tick: 0,
        })
    }

    /// Asphalt-grey gradient that drifts a little every frame.
    fn capture(&mut self) -> Result<image::RgbImage> {
        self.tick += 1;
        let tick = self.tick;
        Ok(image::RgbImage::from_fn(self.width, self.height, |x, y| {
            let v = (90 + ((x as u64 + y as u64 + tick) % 40)) as u8;
            image::Rgb([v, v, v.saturating_add(4)])
        }))
    }
}

// ----------------------------------------------------------------------------
// V4L2 device
// ----------------------------------------------------------------------------

#[cfg(feature = "ingest-v4l2")]
struct DeviceCamera {
    state: DeviceV4l2State,
    width: u32,
    height: u32,
    format: PixelFormat,
}

#[cfg(feature = "ingest-v4l2")]
#[self_referencing]
struct DeviceV4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

#[cfg(feature = "ingest-v4l2")]
impl DeviceCamera {
    fn open(settings: &CameraSettings) -> Result<Self> {
        use anyhow::anyhow;
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&settings.device)
            .with_context(|| format!("open v4l2 device {}", settings.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = settings.width;
        format.height = settings.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "WebcamSource: failed to set format on {}: {}",
                    settings.device,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };
        let pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            anyhow!(
                "camera {} delivers unsupported pixel format {}",
                settings.device,
                format.fourcc
            )
        })?;

        if settings.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(settings.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "WebcamSource: failed to set fps on {}: {}",
                    settings.device,
                    err
                );
            }
        }

        let state = DeviceV4l2StateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        log::debug!(
            "WebcamSource: {} negotiated {}x{} {:?}",
            settings.device,
            format.width,
            format.height,
            pixel_format
        );

        Ok(Self {
            state,
            width: format.width,
            height: format.height,
            format: pixel_format,
        })
    }

    fn capture(&mut self) -> Result<image::RgbImage> {
        use v4l::io::traits::CaptureStream;

        let (width, height, format) = (self.width, self.height, self.format);
        self.state.with_mut(|fields| {
            let (buf, meta) = fields.stream.next().context("capture v4l2 frame")?;
            let used = (meta.bytesused as usize).min(buf.len());
            let used = if used == 0 { buf.len() } else { used };
            normalize_to_rgb(&buf[..used], width, height, format)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_settings() -> CameraSettings {
        CameraSettings {
            device: "stub://test".to_string(),
            width: 64,
            height: 48,
            target_fps: 30,
        }
    }

    #[test]
    fn stub_camera_produces_sequential_frames() -> Result<()> {
        let mut source = WebcamSource::open(&stub_settings())?;
        let first = source.next_frame()?.unwrap();
        let second = source.next_frame()?.unwrap();
        assert_eq!(first.dimensions(), (64, 48));
        assert_eq!((first.index(), second.index()), (0, 1));
        assert_ne!(first.image().as_raw(), second.image().as_raw());
        assert_eq!(source.frames_captured(), 2);
        Ok(())
    }

    #[test]
    fn capture_after_release_fails() -> Result<()> {
        let mut source = WebcamSource::open(&stub_settings())?;
        source.release();
        assert!(!source.is_open());
        assert!(source.next_frame().is_err());
        source.release();
        Ok(())
    }

    #[cfg(not(feature = "ingest-v4l2"))]
    #[test]
    fn real_device_needs_v4l2_feature() {
        let settings = CameraSettings::default();
        let err = WebcamSource::open(&settings).err().unwrap();
        assert!(err.to_string().contains("ingest-v4l2"));
    }
}

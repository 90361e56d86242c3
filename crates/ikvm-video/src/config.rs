//! Configuration for the capture engine.

/// Subsampling ratio applied to JPEG capture via `S_CTRL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Subsampling {
    #[default]
    Yuv420,
    Yuv444,
}

impl Subsampling {
    pub(crate) fn as_ctrl_value(self) -> i32 {
        match self {
            Self::Yuv420 => 2,
            Self::Yuv444 => 1,
        }
    }
}

/// Frame encoding mode, mirrors `CaptureState::frameFormat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameFormat {
    #[default]
    StandardJpeg = 0,
    Reserved = 1,
    PartialJpeg = 2,
}

/// Configuration for [`crate::CaptureEngine::start`].
///
/// # Examples
///
/// ```no_run
/// # use ikvm_video::CaptureConfig;
/// let config = CaptureConfig::builder()
///     .video_path("/dev/video0")
///     .frame_rate(30)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub video_path: String,
    pub frame_rate: u32,
    pub subsampling: Subsampling,
    pub frame_format: FrameFormat,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            video_path: "/dev/video0".to_string(),
            frame_rate: 30,
            subsampling: Subsampling::default(),
            frame_format: FrameFormat::default(),
        }
    }
}

impl CaptureConfig {
    pub fn builder() -> CaptureConfigBuilder {
        CaptureConfigBuilder::default()
    }
}

/// Builder for [`CaptureConfig`].
#[derive(Debug, Default)]
pub struct CaptureConfigBuilder {
    inner: CaptureConfigPartial,
}

#[derive(Debug, Default)]
struct CaptureConfigPartial {
    video_path: Option<String>,
    frame_rate: Option<u32>,
    subsampling: Option<Subsampling>,
    frame_format: Option<FrameFormat>,
}

impl CaptureConfigBuilder {
    pub fn video_path(mut self, path: impl Into<String>) -> Self {
        self.inner.video_path = Some(path.into());
        self
    }

    pub fn frame_rate(mut self, rate: u32) -> Self {
        self.inner.frame_rate = Some(rate);
        self
    }

    pub fn subsampling(mut self, subsampling: Subsampling) -> Self {
        self.inner.subsampling = Some(subsampling);
        self
    }

    pub fn frame_format(mut self, format: FrameFormat) -> Self {
        self.inner.frame_format = Some(format);
        self
    }

    pub fn build(self) -> CaptureConfig {
        let defaults = CaptureConfig::default();
        CaptureConfig {
            video_path: self.inner.video_path.unwrap_or(defaults.video_path),
            frame_rate: self.inner.frame_rate.unwrap_or(defaults.frame_rate),
            subsampling: self.inner.subsampling.unwrap_or(defaults.subsampling),
            frame_format: self.inner.frame_format.unwrap_or(defaults.frame_format),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CaptureConfig::default();
        assert_eq!(config.frame_rate, 30);
        assert_eq!(config.subsampling, Subsampling::Yuv420);
    }

    #[test]
    fn test_builder_overrides() {
        let config = CaptureConfig::builder().video_path("/dev/video2").frame_rate(15).build();
        assert_eq!(config.video_path, "/dev/video2");
        assert_eq!(config.frame_rate, 15);
    }
}

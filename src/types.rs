//! Frame record types and small value types shared across the pipeline.

use bytes::Bytes;

/// Logical camera slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Left,
    Right,
}

impl Role {
    pub fn suffix(self) -> &'static str {
        match self {
            Role::Left => "left",
            Role::Right => "right",
        }
    }

    pub fn other(self) -> Role {
        match self {
            Role::Left => Role::Right,
            Role::Right => Role::Left,
        }
    }

    pub fn idx(self) -> usize {
        match self {
            Role::Left => 0,
            Role::Right => 1,
        }
    }
}

/// Desired capture parameters; zero means "use platform default".
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl CaptureConfig {
    pub const DEFAULT_WIDTH: u32 = 640;
    pub const DEFAULT_HEIGHT: u32 = 480;
    pub const DEFAULT_FPS: u32 = 30;

    /// Resolves zero fields to the platform default.
    pub fn resolved(self) -> CaptureConfig {
        CaptureConfig {
            width: if self.width == 0 { Self::DEFAULT_WIDTH } else { self.width },
            height: if self.height == 0 { Self::DEFAULT_HEIGHT } else { self.height },
            fps: if self.fps == 0 { Self::DEFAULT_FPS } else { self.fps },
        }
    }
}

/// JPEG encode settings. `width`/`height` are reserved: recorded but never
/// consulted to resample a frame.
#[derive(Debug, Clone, Copy)]
pub struct JpegConfig {
    pub width: u32,
    pub height: u32,
    pub quality: u8,
}

impl JpegConfig {
    pub const DEFAULT_QUALITY: u8 = 70;

    /// Clamps `quality` into `[1, 100]`; `0` or below maps to the default.
    pub fn clamp_quality(quality: i32) -> u8 {
        if quality <= 0 {
            Self::DEFAULT_QUALITY
        } else if quality > 100 {
            100
        } else {
            quality as u8
        }
    }
}

impl Default for JpegConfig {
    fn default() -> Self {
        JpegConfig { width: 0, height: 0, quality: Self::DEFAULT_QUALITY }
    }
}

/// Returns `ceil(n / 2)`, the chroma-plane dimension for 4:2:0 subsampling.
pub fn chroma_dim(n: u32) -> u32 {
    (n + 1) / 2
}

/// Raw planar 4:2:0 frame produced by a camera session.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub role: Role,
    pub width: u32,
    pub height: u32,
    pub frame_index: u64,
    pub timestamp_ns: u64,
    pub y: Vec<u8>,
    pub u: Vec<u8>,
    pub v: Vec<u8>,
}

impl RawFrame {
    /// Strides of the Y, U, V planes: `{W, ceil(W/2), ceil(W/2)}`.
    pub fn strides(&self) -> [u32; 3] {
        [self.width, chroma_dim(self.width), chroma_dim(self.width)]
    }

    /// Total byte length implied by the invariant `W*H + 2*ceil(W/2)*ceil(H/2)`.
    pub fn expected_len(&self) -> usize {
        let cw = chroma_dim(self.width) as usize;
        let ch = chroma_dim(self.height) as usize;
        (self.width as usize) * (self.height as usize) + 2 * cw * ch
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.y.len() == (self.width as usize) * (self.height as usize)
            && self.u.len() == chroma_dim(self.width) as usize * chroma_dim(self.height) as usize
            && self.v.len() == self.u.len()
    }
}

/// Compressed JPEG packet produced by an encoder worker.
#[derive(Debug, Clone)]
pub struct EncodedPacket {
    pub role: Role,
    pub width: u32,
    pub height: u32,
    pub frame_index: u64,
    pub timestamp_ns: u64,
    pub jpeg: Bytes,
    pub camera_id: String,
    pub stream_id: String,
}

/// Camera lens calibration, read from device metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct Intrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    pub skew: f32,
}

/// Camera pose relative to the device body, read from device metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct Extrinsics {
    pub tx: f32,
    pub ty: f32,
    pub tz: f32,
    pub qx: f32,
    pub qy: f32,
    pub qz: f32,
    pub qw: f32,
}

/// Active pixel array rectangle; not every device metadata source reports
/// one, so it's optional.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CameraParams {
    pub intrinsics: Intrinsics,
    pub extrinsics: Extrinsics,
    pub active_array: Option<Rect>,
}

/// One enumerated camera and its vendor-tagged stereo position, if any.
#[derive(Debug, Clone)]
pub struct CameraListing {
    pub id: String,
    /// Canonical values: 0 = LEFT, 1 = RIGHT, -1 = tag absent.
    pub position: i32,
}

/// A single detection as delivered to `on_result`.
#[derive(Debug, Clone, Copy)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub class_id: i32,
    pub score: f32,
}

/// Detection result for one frame, assembled by the receive worker.
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub image_id: String,
    pub frame_index: u64,
    pub timestamp_sec: f64,
    pub detections: Vec<Detection>,
}

// SPDX-License-Identifier: GPL-3.0-only
// Shared types for the device abstraction

//! Shared types for streams, surfaces and sketch status reporting

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stream resolution in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether both dimensions are non-zero
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Width divided by height, `None` for a degenerate size
    pub fn aspect_ratio(&self) -> Option<f32> {
        if self.is_valid() {
            Some(self.width as f32 / self.height as f32)
        } else {
            None
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel format of an output stream
///
/// Discriminants are the codes used in the supported-size capability block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    #[default]
    Yuv420Sp = 1003,
    YCbCr420_888 = 2,
    Rgba8888 = 3,
    Jpeg = 2000,
}

impl PixelFormat {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1003 => Some(PixelFormat::Yuv420Sp),
            2 => Some(PixelFormat::YCbCr420_888),
            3 => Some(PixelFormat::Rgba8888),
            2000 => Some(PixelFormat::Jpeg),
            _ => None,
        }
    }

    /// Formats a sketch stream can be forked from
    pub fn supports_sketch(self) -> bool {
        matches!(self, PixelFormat::Yuv420Sp | PixelFormat::YCbCr420_888)
    }
}

/// Format and size an output was created with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Profile {
    pub format: PixelFormat,
    pub size: Size,
}

impl Profile {
    pub fn new(format: PixelFormat, size: Size) -> Self {
        Self { format, size }
    }
}

/// Opaque consumer surface handed to a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Surface {
    pub name: String,
    pub size: Size,
}

impl Surface {
    pub fn new(name: impl Into<String>, size: Size) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// Lifecycle status of a sketch sub-stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SketchStatus {
    #[default]
    Stopped,
    Starting,
    Started,
    Stopping,
}

impl SketchStatus {
    /// Running or on the way there
    pub fn is_running(self) -> bool {
        matches!(self, SketchStatus::Starting | SketchStatus::Started)
    }
}

impl fmt::Display for SketchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SketchStatus::Stopped => write!(f, "stopped"),
            SketchStatus::Starting => write!(f, "starting"),
            SketchStatus::Started => write!(f, "started"),
            SketchStatus::Stopping => write!(f, "stopping"),
        }
    }
}

/// Sketch frame offset reported by the device in dynamic notify mode
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Offset {
    pub x: f32,
    pub y: f32,
}

/// Payload delivered to sketch listeners
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SketchStatusData {
    pub status: SketchStatus,
    /// Reference fov ratio for the current zoom, negative when unknown
    pub sketch_ratio: f32,
    pub offset: Offset,
}

impl Default for SketchStatusData {
    fn default() -> Self {
        Self {
            status: SketchStatus::Stopped,
            sketch_ratio: crate::constants::INVALID_RATIO,
            offset: Offset::default(),
        }
    }
}

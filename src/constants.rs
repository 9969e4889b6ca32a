// SPDX-License-Identifier: GPL-3.0-only

//! Crate-wide constants shared by the session and sketch modules

/// Sentinel returned by ratio lookups when no value is known
///
/// Callers must treat any negative ratio as "unknown".
pub const INVALID_RATIO: f32 = -1.0;

/// Comparison tolerance for zoom ratios
pub const RATIO_EPSILON: f32 = f32::EPSILON;

/// Fixed-point divisor used by the moon-capture-boost ability block
pub const SKETCH_FIXED_POINT_DIV: f32 = 100.0;

/// Fixed-point divisor used by the scene zoom capability block
pub const ZOOM_CAP_FIXED_POINT_DIV: f32 = 100.0;

/// Number of floats in a dynamic sketch info push
/// `[support_flag, reference_ratio, offset_x, offset_y]`
pub const DYNAMIC_SKETCH_INFO_LEN: usize = 4;

/// Smallest width accepted for a sketch stream
pub const SKETCH_MIN_WIDTH: u32 = 600;

/// Relative aspect-ratio tolerance when matching a sketch size to the preview
pub const SKETCH_ASPECT_TOLERANCE: f32 = 0.05;

/// Stable numeric error codes surfaced by [`crate::errors::SessionError::code`]
pub mod error_codes {
    pub const INVALID_ARGUMENT: i32 = 7_400_101;
    pub const OPERATION_NOT_ALLOWED: i32 = 7_400_102;
    pub const SESSION_NOT_CONFIG: i32 = 7_400_103;
    pub const SERVICE_FATAL_ERROR: i32 = 7_400_201;
}

/// Compare two ratios with [`RATIO_EPSILON`] tolerance, `a >= b`
#[inline]
pub fn ratio_at_least(a: f32, b: f32) -> bool {
    a - b >= -RATIO_EPSILON
}

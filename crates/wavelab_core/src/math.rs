//! Fixed-point math and field coordinate helpers.
//!
//! Unit movement uses fixed-point arithmetic so that a given Op list
//! produces identical trajectories on every platform. Floating point only
//! appears at the configuration boundary (projectile target columns).

use fixed::types::I32F32;

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Width of one field column in pixels.
pub const COLUMN_WIDTH: i32 = 80;

/// Right edge of the field where attacker units enter.
pub const FIELD_RIGHT_X: i32 = 800;

/// Horizontal pixel of a fractional column (projectile targets).
#[must_use]
pub fn column_to_pixel(column: f32) -> i32 {
    (f64::from(column) * f64::from(COLUMN_WIDTH)).round() as i32
}

/// Horizontal pixel of the centre of a 1-based grid column.
#[must_use]
pub const fn cell_center_x(column: u8) -> i32 {
    (column as i32 - 1) * COLUMN_WIDTH + COLUMN_WIDTH / 2
}

/// Convert a pixel coordinate to fixed-point.
#[must_use]
pub fn fixed_px(x: i32) -> Fixed {
    Fixed::from_num(x)
}

/// Truncate a fixed-point coordinate to the integer pixel grid.
#[must_use]
pub fn to_px(x: Fixed) -> i32 {
    x.to_num::<i32>()
}

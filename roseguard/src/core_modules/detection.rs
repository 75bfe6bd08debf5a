// THEORY:
// A `Detection` is the spatial summary of the dominant moving region in one frame:
// its bounding box, its integer center, and the area enclosed by its outer border.
// It is a plain data container with no memory of earlier frames; giving it a
// history is the job of the `TargetTracker`.

/// The largest qualifying motion region found in a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Left edge of the bounding box.
    pub x: u32,
    /// Top edge of the bounding box.
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// `x + width / 2`, integer division.
    pub center_x: u32,
    /// `y + height / 2`, integer division.
    pub center_y: u32,
    /// Area enclosed by the region's outer contour, holes included.
    pub area: f64,
}

impl Detection {
    pub fn from_bounds(x: u32, y: u32, width: u32, height: u32, area: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            center_x: x + width / 2,
            center_y: y + height / 2,
            area,
        }
    }

    /// Manhattan distance from this detection's center to a point.
    pub fn manhattan_distance_to(&self, x: i64, y: i64) -> u64 {
        (x - self.center_x as i64).unsigned_abs() + (y - self.center_y as i64).unsigned_abs()
    }
}

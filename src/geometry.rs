//! Surface orientation and edge/corner zones.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("unsupported rotation {0}, expected 0, 90, 180 or 270")]
pub struct InvalidRotation(pub u16);

/// Orientation of the touch surface relative to the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    Deg0,
    Deg90,
    Deg180,
    #[default]
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// True when the surface's width and height trade places.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }

    /// Maps a point already clamped to `[0,width]×[0,height]` into the rotated frame.
    pub fn apply(self, x: i32, y: i32, width: i32, height: i32) -> (i32, i32) {
        match self {
            Rotation::Deg0 => (x, y),
            Rotation::Deg90 => (height - y, x),
            Rotation::Deg180 => (width - x, height - y),
            Rotation::Deg270 => (y, width - x),
        }
    }

    /// Surface extent as seen after rotation.
    pub fn extent(self, width: i32, height: i32) -> (i32, i32) {
        if self.swaps_axes() {
            (height, width)
        } else {
            (width, height)
        }
    }
}

impl TryFrom<u16> for Rotation {
    type Error = InvalidRotation;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(InvalidRotation(other)),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(r: Rotation) -> u16 {
        r.degrees()
    }
}

impl std::str::FromStr for Rotation {
    type Err = InvalidRotation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let degrees: u16 = s.trim().parse().map_err(|_| InvalidRotation(u16::MAX))?;
        Rotation::try_from(degrees)
    }
}

/// Where a point sits relative to the surface boundary.
///
/// Corners are named by their horizontal side first and vertical side
/// second, with Y growing towards the top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    #[default]
    None,
    Left,
    Right,
    Top,
    Bottom,
    CornerLeftBottom,
    CornerLeftTop,
    CornerRightBottom,
    CornerRightTop,
}

impl Zone {
    pub fn is_none(self) -> bool {
        self == Zone::None
    }

    pub fn is_corner(self) -> bool {
        matches!(
            self,
            Zone::CornerLeftBottom
                | Zone::CornerLeftTop
                | Zone::CornerRightBottom
                | Zone::CornerRightTop
        )
    }
}

/// Plain edge test; a point in two bands resolves left, right, top, bottom
/// in that order.
pub fn classify_edge(
    rotation: Rotation,
    edge_width: i32,
    width: i32,
    height: i32,
    x: i32,
    y: i32,
) -> Zone {
    let (w, h) = rotation.extent(width, height);
    if x <= edge_width {
        Zone::Left
    } else if x >= w - edge_width {
        Zone::Right
    } else if y >= h - edge_width {
        Zone::Top
    } else if y <= edge_width {
        Zone::Bottom
    } else {
        Zone::None
    }
}

/// Edge test refined into corners. When the margins overlap on a small
/// surface the later corner in LB, LT, RB, RT order wins.
pub fn classify(
    rotation: Rotation,
    edge_width: i32,
    width: i32,
    height: i32,
    x: i32,
    y: i32,
) -> Zone {
    let edge = classify_edge(rotation, edge_width, width, height, x, y);
    if edge.is_none() {
        return edge;
    }

    let (w, h) = rotation.extent(width, height);
    let left = x <= edge_width;
    let right = x >= w - edge_width;
    let bottom = y <= edge_width;
    let top = y >= h - edge_width;

    let mut zone = edge;
    if left && bottom {
        zone = Zone::CornerLeftBottom;
    }
    if left && top {
        zone = Zone::CornerLeftTop;
    }
    if right && bottom {
        zone = Zone::CornerRightBottom;
    }
    if right && top {
        zone = Zone::CornerRightTop;
    }
    zone
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: i32 = 1024;
    const H: i32 = 640;

    #[test]
    fn rotation_round_trips_through_degrees() {
        for r in [Rotation::Deg0, Rotation::Deg90, Rotation::Deg180, Rotation::Deg270] {
            assert_eq!(Rotation::try_from(r.degrees()), Ok(r));
        }
        assert_eq!(Rotation::try_from(45), Err(InvalidRotation(45)));
        assert_eq!("90".parse::<Rotation>(), Ok(Rotation::Deg90));
        assert!("sideways".parse::<Rotation>().is_err());
    }

    #[test]
    fn rotation_transforms() {
        assert_eq!(Rotation::Deg0.apply(100, 50, W, H), (100, 50));
        assert_eq!(Rotation::Deg90.apply(100, 50, W, H), (590, 100));
        assert_eq!(Rotation::Deg180.apply(100, 50, W, H), (924, 590));
        assert_eq!(Rotation::Deg270.apply(100, 50, W, H), (50, 924));
    }

    #[test]
    fn centre_is_no_zone() {
        assert_eq!(classify(Rotation::Deg0, 120, W, H, 512, 320), Zone::None);
    }

    #[test]
    fn edges_unrotated() {
        assert_eq!(classify(Rotation::Deg0, 120, W, H, 50, 320), Zone::Left);
        assert_eq!(classify(Rotation::Deg0, 120, W, H, 1000, 320), Zone::Right);
        assert_eq!(classify(Rotation::Deg0, 120, W, H, 512, 600), Zone::Top);
        assert_eq!(classify(Rotation::Deg0, 120, W, H, 512, 20), Zone::Bottom);
    }

    #[test]
    fn corners_supersede_edges() {
        assert_eq!(classify(Rotation::Deg0, 120, W, H, 10, 10), Zone::CornerLeftBottom);
        assert_eq!(classify(Rotation::Deg0, 120, W, H, 10, 630), Zone::CornerLeftTop);
        assert_eq!(classify(Rotation::Deg0, 120, W, H, 1010, 10), Zone::CornerRightBottom);
        assert_eq!(classify(Rotation::Deg0, 120, W, H, 1010, 630), Zone::CornerRightTop);
        // the plain edge test never reports corners
        assert_eq!(classify_edge(Rotation::Deg0, 120, W, H, 10, 10), Zone::Left);
    }

    #[test]
    fn rotated_surface_swaps_extent() {
        // at 270 degrees the surface is 640 wide and 1024 tall
        assert_eq!(classify(Rotation::Deg270, 120, W, H, 600, 512), Zone::Right);
        assert_eq!(classify(Rotation::Deg0, 120, W, H, 600, 512), Zone::None);
        assert_eq!(classify(Rotation::Deg90, 120, W, H, 320, 950), Zone::Top);
    }

    #[test]
    fn overlapping_margins_prefer_right_top() {
        // a band wider than half the surface puts every point in all four margins
        assert_eq!(classify(Rotation::Deg0, 700, W, H, 512, 320), Zone::CornerRightTop);
    }
}

//! Region coordinate type definitions

use std::fmt;
use std::str::FromStr;

/// Position of one region (chunk) in the host's 2D region grid.
///
/// Regions are addressed by their integer grid position, not by block or
/// world position. The text form is `x,z` (for example `-3,12`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId {
    /// X coordinate (east-west)
    pub x: i32,
    /// Z coordinate (north-south)
    pub z: i32,
}

impl RegionId {
    /// Creates a region id from its grid position.
    #[inline]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Returns an iterator over every region in the inclusive rectangle
    /// spanned by `a` and `b`.
    ///
    /// The corners may be given in any order. Regions are yielded in
    /// row-major order (all of the lowest `z` row first, `x` ascending).
    pub fn area(a: RegionId, b: RegionId) -> RegionArea {
        RegionArea::new(a, b)
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.z)
    }
}

impl From<(i32, i32)> for RegionId {
    fn from((x, z): (i32, i32)) -> Self {
        Self { x, z }
    }
}

impl FromStr for RegionId {
    type Err = RegionIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, z) = s
            .split_once(',')
            .ok_or_else(|| RegionIdParseError::MissingSeparator(s.to_string()))?;

        let parse = |part: &str| {
            part.trim()
                .parse::<i32>()
                .map_err(|_| RegionIdParseError::InvalidComponent(part.trim().to_string()))
        };

        Ok(Self {
            x: parse(x)?,
            z: parse(z)?,
        })
    }
}

/// Inclusive rectangle of regions.
///
/// Iterates in row-major order. The iterator is exact-sized so callers can
/// pre-allocate.
#[derive(Debug, Clone)]
pub struct RegionArea {
    min: RegionId,
    max: RegionId,
    next: Option<RegionId>,
}

impl RegionArea {
    fn new(a: RegionId, b: RegionId) -> Self {
        let min = RegionId::new(a.x.min(b.x), a.z.min(b.z));
        let max = RegionId::new(a.x.max(b.x), a.z.max(b.z));
        Self {
            min,
            max,
            next: Some(min),
        }
    }

    /// Returns the smallest corner of the rectangle.
    pub fn min(&self) -> RegionId {
        self.min
    }

    /// Returns the largest corner of the rectangle.
    pub fn max(&self) -> RegionId {
        self.max
    }

    /// Returns true if `region` lies inside the rectangle.
    pub fn contains(&self, region: RegionId) -> bool {
        (self.min.x..=self.max.x).contains(&region.x)
            && (self.min.z..=self.max.z).contains(&region.z)
    }
}

impl Iterator for RegionArea {
    type Item = RegionId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;

        self.next = if current.x < self.max.x {
            Some(RegionId::new(current.x + 1, current.z))
        } else if current.z < self.max.z {
            Some(RegionId::new(self.min.x, current.z + 1))
        } else {
            None
        };

        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match self.next {
            None => 0,
            Some(next) => {
                let width = (self.max.x as i64 - self.min.x as i64 + 1) as usize;
                let full_rows = (self.max.z as i64 - next.z as i64) as usize;
                let in_row = (self.max.x as i64 - next.x as i64 + 1) as usize;
                full_rows * width + in_row
            }
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RegionArea {}

/// Errors from parsing the `x,z` text form of a [`RegionId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionIdParseError {
    /// No comma between the two components
    MissingSeparator(String),
    /// A component is not a valid 32-bit integer
    InvalidComponent(String),
}

impl fmt::Display for RegionIdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionIdParseError::MissingSeparator(input) => {
                write!(f, "Invalid region '{}' (expected format x,z)", input)
            }
            RegionIdParseError::InvalidComponent(part) => {
                write!(f, "Invalid region component '{}' (expected integer)", part)
            }
        }
    }
}

impl std::error::Error for RegionIdParseError {}

use geo::Rect;
use serde::{Deserialize, Serialize};

/// A 2D axis-aligned bounding box.
///
/// Used both as the query rectangle handed to a bbox search and as the
/// bounds of index nodes and decoded geometries. This is a wrapper around
/// `geo::Rect`, which keeps its corners normalised.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox2D {
    /// The underlying geometric rectangle
    pub rect: Rect,
}

impl BoundingBox2D {
    /// Create a new bounding box from minimum and maximum coordinates.
    ///
    /// # Examples
    ///
    /// ```
    /// use fgbstream_types::bbox::BoundingBox2D;
    ///
    /// let bbox = BoundingBox2D::new(-74.0, 40.7, -73.9, 40.8);
    /// assert_eq!(bbox.min_x(), -74.0);
    /// ```
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            rect: Rect::new(
                geo::coord! { x: min_x, y: min_y },
                geo::coord! { x: max_x, y: max_y },
            ),
        }
    }

    /// Create a bounding box from a `geo::Rect`.
    pub fn from_rect(rect: Rect) -> Self {
        Self { rect }
    }

    /// Build a bounding box from a header envelope (`[min_x, min_y, max_x, max_y, ...]`).
    ///
    /// Returns `None` when the envelope carries fewer than four values.
    pub fn from_envelope(envelope: &[f64]) -> Option<Self> {
        match envelope {
            [min_x, min_y, max_x, max_y, ..] => Some(Self::new(*min_x, *min_y, *max_x, *max_y)),
            _ => None,
        }
    }

    pub fn min_x(&self) -> f64 {
        self.rect.min().x
    }

    pub fn min_y(&self) -> f64 {
        self.rect.min().y
    }

    pub fn max_x(&self) -> f64 {
        self.rect.max().x
    }

    pub fn max_y(&self) -> f64 {
        self.rect.max().y
    }

    pub fn width(&self) -> f64 {
        self.max_x() - self.min_x()
    }

    pub fn height(&self) -> f64 {
        self.max_y() - self.min_y()
    }

    /// Check if a coordinate lies within this bounding box (edges inclusive).
    pub fn contains_xy(&self, x: f64, y: f64) -> bool {
        x >= self.min_x() && x <= self.max_x() && y >= self.min_y() && y <= self.max_y()
    }

    /// Check if this bounding box intersects with another.
    pub fn intersects(&self, other: &BoundingBox2D) -> bool {
        self.intersects_bounds(other.min_x(), other.min_y(), other.max_x(), other.max_y())
    }

    /// Intersection test against raw bounds, as stored in index nodes.
    ///
    /// Touching edges count as intersecting.
    #[inline]
    pub fn intersects_bounds(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> bool {
        !(self.max_x() < min_x
            || self.max_y() < min_y
            || self.min_x() > max_x
            || self.min_y() > max_y)
    }

    /// Grow this bounding box so it also covers `other`.
    pub fn union(&self, other: &BoundingBox2D) -> Self {
        Self::new(
            self.min_x().min(other.min_x()),
            self.min_y().min(other.min_y()),
            self.max_x().max(other.max_x()),
            self.max_y().max(other.max_y()),
        )
    }

    /// Expand the bounding box by a given amount in all directions.
    pub fn expand(&self, amount: f64) -> Self {
        Self::new(
            self.min_x() - amount,
            self.min_y() - amount,
            self.max_x() + amount,
            self.max_y() + amount,
        )
    }

    /// True when every bound is a finite number.
    pub fn is_finite(&self) -> bool {
        self.min_x().is_finite()
            && self.min_y().is_finite()
            && self.max_x().is_finite()
            && self.max_y().is_finite()
    }
}

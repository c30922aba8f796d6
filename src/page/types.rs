use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle for one element of a page snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub usize);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Bounding rectangle in page coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.right() && y >= self.y && y <= self.bottom()
    }

    pub fn intersection_area(&self, other: &Rect) -> f64 {
        let x_overlap = self.right().min(other.right()) - self.x.max(other.x);
        let y_overlap = self.bottom().min(other.bottom()) - self.y.max(other.y);
        if x_overlap > 0.0 && y_overlap > 0.0 {
            x_overlap * y_overlap
        } else {
            0.0
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Intersection over union
    pub fn iou(&self, other: &Rect) -> f64 {
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    pub fn aspect_ratio(&self) -> f64 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            0.0
        }
    }

    /// Edge-to-edge distance, zero when the rectangles touch or overlap
    pub fn gap_distance(&self, other: &Rect) -> f64 {
        let dx = (other.x - self.right()).max(self.x - other.right()).max(0.0);
        let dy = (other.y - self.bottom()).max(self.y - other.bottom()).max(0.0);
        (dx * dx + dy * dy).sqrt()
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

/// Box edge lengths in pixels (margins, padding)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Edges {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Edges {
    pub fn new(top: f64, right: f64, bottom: f64, left: f64) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    pub fn uniform(value: f64) -> Self {
        Self::new(value, value, value, value)
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.top, self.right, self.bottom, self.left]
    }
}

/// Computed style subset read from the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputedStyle {
    pub display: String,
    pub position: String,
    pub visibility: String,
    pub margin: Edges,
    pub padding: Edges,
    pub background_color: String,
    pub border_radius: String,
    pub has_shadow: bool,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: "block".to_string(),
            position: "static".to_string(),
            visibility: "visible".to_string(),
            margin: Edges::default(),
            padding: Edges::default(),
            background_color: "rgba(0, 0, 0, 0)".to_string(),
            border_radius: "0px".to_string(),
            has_shadow: false,
        }
    }
}

impl ComputedStyle {
    pub fn is_rendered(&self) -> bool {
        self.display != "none" && self.visibility != "hidden"
    }
}

/// Output of the optical-text collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrText {
    pub text: String,
    /// Recognizer confidence in [0, 1]
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iou_identical_and_disjoint() {
        let a = Rect::new(0.0, 0.0, 100.0, 50.0);
        assert!((a.iou(&a) - 1.0).abs() < f64::EPSILON);

        let b = Rect::new(200.0, 0.0, 100.0, 50.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_half_overlap() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(50.0, 0.0, 100.0, 100.0);
        // 5000 / 15000
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_gap_distance() {
        let anchor = Rect::new(0.0, 100.0, 200.0, 20.0);
        let above = Rect::new(0.0, 40.0, 200.0, 20.0);
        assert_eq!(anchor.gap_distance(&above), 40.0);
        assert_eq!(above.gap_distance(&anchor), 40.0);

        let overlapping = Rect::new(50.0, 110.0, 10.0, 10.0);
        assert_eq!(anchor.gap_distance(&overlapping), 0.0);
    }

    #[test]
    fn test_aspect_ratio_zero_height() {
        assert_eq!(Rect::new(0.0, 0.0, 10.0, 0.0).aspect_ratio(), 0.0);
        assert_eq!(Rect::new(0.0, 0.0, 300.0, 150.0).aspect_ratio(), 2.0);
    }
}

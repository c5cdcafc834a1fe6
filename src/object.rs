use crate::error::{Error, Result};
use geo::Rect;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// An axis-aligned box in the detector's pixel space, anchored at its
/// top-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One detector report for one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_label: String,
    pub bbox: BBox,
    /// Detector score in `[0, 100]`.
    pub confidence: f64,
    /// Numeric class as reported by the detector, if any.
    #[serde(default)]
    pub class_id: Option<u32>,
}

impl BBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new((self.x, self.y), (self.x + self.width, self.y + self.height))
    }

    pub fn center(&self) -> Point2<f64> {
        let center = self.to_rect().center();
        Point2::new(center.x, center.y)
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

impl Detection {
    pub fn new(class_label: impl Into<String>, bbox: BBox, confidence: f64) -> Self {
        Self {
            class_label: class_label.into(),
            bbox,
            confidence,
            class_id: None,
        }
    }

    pub fn center(&self) -> Point2<f64> {
        self.bbox.center()
    }

    /// Check that the detection can be fed to the tracker. `index` is the
    /// position of the detection in its batch and is reported on failure.
    pub fn validate(&self, index: usize) -> Result<()> {
        let invalid = |reason: String| Err(Error::InvalidDetection { index, reason });

        if self.class_label.is_empty() {
            return invalid("class label is empty".into());
        }

        let BBox {
            x,
            y,
            width,
            height,
        } = self.bbox;
        if ![x, y, width, height].iter().all(|v| v.is_finite()) {
            return invalid(format!(
                "bounding box has non-finite values ({x}, {y}, {width}, {height})"
            ));
        }
        if width < 0.0 || height < 0.0 {
            return invalid(format!("bounding box has negative size {width}x{height}"));
        }

        let confidence = self.confidence;
        if !confidence.is_finite() || !(0.0..=100.0).contains(&confidence) {
            return invalid(format!("confidence {confidence} is outside [0, 100]"));
        }

        Ok(())
    }
}

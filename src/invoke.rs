//! Detector "invoke" messages.
//!
//! The detector publishes one message per inference:
//!
//! ```json
//! {
//!     "name": "invoke",
//!     "code": 0,
//!     "data": {
//!         "labels": ["person", "cup"],
//!         "boxes": [[320, 240, 80, 200, 87, 0], [100, 400, 30, 30, 55, 41]]
//!     }
//! }
//! ```
//!
//! Each box is `[x, y, width, height, confidence, class_id]`, with the class
//! id optional. Labels and boxes are parallel arrays.

use crate::{
    error::{Error, Result},
    object::{BBox, Detection},
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvokeMessage {
    pub name: String,
    #[serde(default)]
    pub data: Option<InvokeData>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvokeData {
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub boxes: Vec<Vec<f64>>,
}

impl InvokeMessage {
    /// Convert the message into a detection batch. Messages that are not
    /// inference results yield `None`.
    pub fn into_detections(self) -> Result<Option<Vec<Detection>>> {
        if self.name != "invoke" {
            return Ok(None);
        }
        match self.data {
            Some(data) => data.into_detections().map(Some),
            None => Ok(None),
        }
    }
}

impl InvokeData {
    pub fn into_detections(self) -> Result<Vec<Detection>> {
        let InvokeData { labels, boxes } = self;

        if labels.len() != boxes.len() {
            let index = labels.len().min(boxes.len());
            return Err(Error::InvalidDetection {
                index,
                reason: format!("{} labels but {} boxes", labels.len(), boxes.len()),
            });
        }

        labels
            .into_iter()
            .zip(boxes)
            .enumerate()
            .map(|(index, (label, values))| {
                let &[x, y, width, height, confidence, ref rest @ ..] = values.as_slice() else {
                    return Err(Error::InvalidDetection {
                        index,
                        reason: format!("box has {} values, expected at least 5", values.len()),
                    });
                };
                let class_id = rest
                    .first()
                    .filter(|id| id.is_finite() && **id >= 0.0 && id.fract() == 0.0)
                    .map(|&id| id as u32);

                Ok(Detection {
                    class_id,
                    ..Detection::new(label, BBox::new(x, y, width, height), confidence)
                })
            })
            .collect()
    }
}

/// Parse one JSON message from the detector.
pub fn parse_invoke_message(text: &str) -> Result<Option<Vec<Detection>>> {
    let message: InvokeMessage = serde_json::from_str(text)?;
    message.into_detections()
}

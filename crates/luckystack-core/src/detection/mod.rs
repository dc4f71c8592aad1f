pub mod components;
pub mod morphology;
pub mod roi;
pub mod threshold;

pub use roi::{detect_roi, RoiDetectionConfig};
pub use threshold::ThresholdMethod;

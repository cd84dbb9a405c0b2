use anyhow::Result;
use image::GrayImage;

use crate::detect::result::DetectionResult;

/// Detector backend trait.
///
/// Backends turn a grayscale frame into candidate subject boxes. The control
/// loop only consumes the primary box's center and the candidate count, so a
/// backend is free to return boxes in any order.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a grayscale frame.
    fn detect(&mut self, image: &GrayImage) -> Result<DetectionResult>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

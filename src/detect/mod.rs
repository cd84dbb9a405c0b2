//! Subject detection seam.
//!
//! The detection algorithm itself is pluggable; the tracker only needs the
//! primary candidate's center and the total candidate count.

mod backend;
mod backends;
mod result;

use anyhow::{anyhow, Result};

pub use backend::DetectorBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use backends::{LumaBlobBackend, ScriptedBackend};
pub use result::{BoundingBox, DetectionResult};

/// Build a backend from its configured name.
///
/// Names: `luma` and `tract:<model.onnx>` (feature
/// `backend-tract`). The frame size is the detector input size.
pub fn backend_from_name(
    name: &str,
    #[allow(unused_variables)] width: u32,
    #[allow(unused_variables)] height: u32,
) -> Result<Box<dyn DetectorBackend>> {
    let name = name.trim();
    match name {
        "luma" => Ok(Box::new(LumaBlobBackend::new())),
        _ => {
            if let Some(model_path) = name.strip_prefix("tract:") {
                #[cfg(feature = "backend-tract")]
                {
                    return Ok(Box::new(TractBackend::new(model_path, width, height)?));
                }
                #[cfg(not(feature = "backend-tract"))]
                {
                    return Err(anyhow!(
                        "detector '{}' requires the backend-tract feature",
                        model_path
                    ));
                }
            }
            Err(anyhow!("unknown detector backend '{}'", name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_known_backends() {
        assert_eq!(backend_from_name(" luma ", 640, 480).unwrap().name(), "luma");
    }

    #[test]
    fn rejects_unknown_backend() {
        assert!(backend_from_name("haar", 640, 480).is_err());
        // replaying a fixed script is for tests, not for a running daemon
        assert!(backend_from_name("scripted", 640, 480).is_err());
    }
}

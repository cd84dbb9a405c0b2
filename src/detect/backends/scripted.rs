use std::collections::VecDeque;

use anyhow::Result;
use image::GrayImage;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::DetectionResult;

/// Backend that replays a fixed sequence of results, one per frame.
///
/// Once the script runs out every further frame yields an empty result.
#[derive(Default)]
pub struct ScriptedBackend {
    script: VecDeque<DetectionResult>,
}

impl ScriptedBackend {
    pub fn new<I>(script: I) -> Self
    where
        I: IntoIterator<Item = DetectionResult>,
    {
        Self {
            script: script.into_iter().collect(),
        }
    }

    pub fn push(&mut self, result: DetectionResult) {
        self.script.push_back(result);
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _image: &GrayImage) -> Result<DetectionResult> {
        Ok(self.script.pop_front().unwrap_or_default())
    }
}

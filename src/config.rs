use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::camera::visca::{ViscaConfig, DEFAULT_PORT};
use crate::director::{DirectorConfig, DEFAULT_MOTION_SPEED};
use crate::ingest::CaptureConfig;
use crate::interval::secs_to_duration;
use crate::tracker::TrackerSettings;

const DEFAULT_CAMERA_HOST: &str = "192.168.100.88";
const DEFAULT_STREAM: &str = "stub://camera";
const DEFAULT_ACK_TIMEOUT_MS: u64 = 500;
const DEFAULT_CAPTURE_FPS: u32 = 15;
const DEFAULT_RECENT_THRESHOLD_SECS: f64 = 2.0;
const DEFAULT_CENTERED_PERCENT_VARIANCE: f64 = 10.0;
const DEFAULT_OFF_CENTER_PERCENT_VARIANCE: f64 = 50.0;
const DEFAULT_IMAGE_WIDTH: u32 = 640;
const DEFAULT_IMAGE_HEIGHT: u32 = 480;
const DEFAULT_MIN_CONFIDENCE: f64 = 50.0;
const DEFAULT_HOME_PAUSE_SECS: f64 = 5.0;
const DEFAULT_RETURN_HOME_SPEED: u8 = 10;
const DEFAULT_ZOOM_MAX_SECS_SAFETY: f64 = 30.0;
const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 5;
const DEFAULT_RETRY_SECS: f64 = 5.0;
const DEFAULT_STATS_INTERVAL_SECS: f64 = 10.0;
const DEFAULT_DETECTOR: &str = "luma";

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CambotConfigFile {
    face: Option<FaceConfigFile>,
    subject: Option<SubjectConfigFile>,
    scene: Option<SceneConfigFile>,
    stage: Option<StageConfigFile>,
    camera: Option<CameraConfigFile>,
    tracker: Option<TrackerConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct FaceConfigFile {
    recent_threshold_seconds: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SubjectConfigFile {
    centered_percent_variance: Option<f64>,
    off_center_percent_variance: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SceneConfigFile {
    image_width: Option<u32>,
    image_height: Option<u32>,
    min_confidence: Option<f64>,
    home_pause_seconds: Option<f64>,
    return_home_speed: Option<u8>,
    zoom_max_seconds_safety: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct StageConfigFile {
    home_pan: Option<i32>,
    home_tilt: Option<i32>,
    home_zoom: Option<u16>,
    max_left_pan: Option<i32>,
    max_right_pan: Option<i32>,
    tracking_zoom: Option<u16>,
    tracking_tilt_adjustment: Option<i32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CameraConfigFile {
    #[serde(alias = "socket")]
    host: Option<String>,
    port: Option<u16>,
    stream: Option<String>,
    usb_device: Option<u32>,
    ack_timeout_ms: Option<u64>,
    await_ack: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct TrackerConfigFile {
    motion_speed: Option<u8>,
    max_consecutive_failures: Option<u32>,
    retry_seconds: Option<f64>,
    stats_interval_seconds: Option<f64>,
    detector: Option<String>,
    home_on_start: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CambotConfig {
    pub face: FaceSettings,
    pub subject: SubjectSettings,
    pub scene: SceneSettings,
    pub stage: StageSettings,
    pub camera: CameraSettings,
    pub tracker: LoopSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FaceSettings {
    pub recent_threshold: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectSettings {
    pub centered_percent_variance: f64,
    pub off_center_percent_variance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneSettings {
    pub image_width: u32,
    pub image_height: u32,
    pub min_confidence: f64,
    pub home_pause: Duration,
    /// Carried for camera presets; tracking motion uses `LoopSettings::motion_speed`.
    pub return_home_speed: u8,
    pub zoom_max_safety: Duration,
}

/// Camera preset geometry. Only `home_zoom` drives behavior; the rest is
/// carried for operators since no position feedback is read back.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSettings {
    pub home_pan: i32,
    pub home_tilt: i32,
    pub home_zoom: u16,
    pub max_left_pan: i32,
    pub max_right_pan: i32,
    pub tracking_zoom: u16,
    pub tracking_tilt_adjustment: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CameraSettings {
    pub host: String,
    pub port: u16,
    pub stream: String,
    pub usb_device: Option<u32>,
    pub ack_timeout: Duration,
    pub await_ack: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopSettings {
    pub motion_speed: u8,
    pub max_consecutive_failures: u32,
    pub retry_interval: Duration,
    pub stats_interval: Duration,
    pub detector: String,
    pub home_on_start: bool,
}

impl CambotConfig {
    /// Load from `path`, or from `CAMBOT_CONFIG` when no path is given, then
    /// apply environment overrides. With neither, defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => std::env::var("CAMBOT_CONFIG")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from),
        };
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: CambotConfigFile) -> Self {
        let face = file.face.unwrap_or_default();
        let subject = file.subject.unwrap_or_default();
        let scene = file.scene.unwrap_or_default();
        let stage = file.stage.unwrap_or_default();
        let camera = file.camera.unwrap_or_default();
        let tracker = file.tracker.unwrap_or_default();

        Self {
            face: FaceSettings {
                recent_threshold: secs_to_duration(
                    face.recent_threshold_seconds
                        .unwrap_or(DEFAULT_RECENT_THRESHOLD_SECS),
                ),
            },
            subject: SubjectSettings {
                centered_percent_variance: subject
                    .centered_percent_variance
                    .unwrap_or(DEFAULT_CENTERED_PERCENT_VARIANCE),
                off_center_percent_variance: subject
                    .off_center_percent_variance
                    .unwrap_or(DEFAULT_OFF_CENTER_PERCENT_VARIANCE),
            },
            scene: SceneSettings {
                image_width: scene.image_width.unwrap_or(DEFAULT_IMAGE_WIDTH),
                image_height: scene.image_height.unwrap_or(DEFAULT_IMAGE_HEIGHT),
                min_confidence: scene.min_confidence.unwrap_or(DEFAULT_MIN_CONFIDENCE),
                home_pause: secs_to_duration(
                    scene.home_pause_seconds.unwrap_or(DEFAULT_HOME_PAUSE_SECS),
                ),
                return_home_speed: scene
                    .return_home_speed
                    .unwrap_or(DEFAULT_RETURN_HOME_SPEED),
                zoom_max_safety: secs_to_duration(
                    scene
                        .zoom_max_seconds_safety
                        .unwrap_or(DEFAULT_ZOOM_MAX_SECS_SAFETY),
                ),
            },
            stage: StageSettings {
                home_pan: stage.home_pan.unwrap_or(0),
                home_tilt: stage.home_tilt.unwrap_or(0),
                home_zoom: stage.home_zoom.unwrap_or(0),
                max_left_pan: stage.max_left_pan.unwrap_or(0),
                max_right_pan: stage.max_right_pan.unwrap_or(0),
                tracking_zoom: stage.tracking_zoom.unwrap_or(0),
                tracking_tilt_adjustment: stage.tracking_tilt_adjustment.unwrap_or(0),
            },
            camera: CameraSettings {
                host: camera
                    .host
                    .unwrap_or_else(|| DEFAULT_CAMERA_HOST.to_string()),
                port: camera.port.unwrap_or(DEFAULT_PORT),
                stream: camera.stream.unwrap_or_else(|| DEFAULT_STREAM.to_string()),
                usb_device: camera.usb_device,
                ack_timeout: Duration::from_millis(
                    camera.ack_timeout_ms.unwrap_or(DEFAULT_ACK_TIMEOUT_MS),
                ),
                await_ack: camera.await_ack.unwrap_or(false),
            },
            tracker: LoopSettings {
                motion_speed: tracker.motion_speed.unwrap_or(DEFAULT_MOTION_SPEED),
                max_consecutive_failures: tracker
                    .max_consecutive_failures
                    .unwrap_or(DEFAULT_MAX_CONSECUTIVE_FAILURES),
                retry_interval: secs_to_duration(
                    tracker.retry_seconds.unwrap_or(DEFAULT_RETRY_SECS),
                ),
                stats_interval: secs_to_duration(
                    tracker
                        .stats_interval_seconds
                        .unwrap_or(DEFAULT_STATS_INTERVAL_SECS),
                ),
                detector: tracker
                    .detector
                    .unwrap_or_else(|| DEFAULT_DETECTOR.to_string()),
                home_on_start: tracker.home_on_start.unwrap_or(true),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("CAMBOT_CAMERA_HOST") {
            if !host.trim().is_empty() {
                self.camera.host = host.trim().to_string();
            }
        }
        if let Ok(port) = std::env::var("CAMBOT_CAMERA_PORT") {
            self.camera.port = port
                .trim()
                .parse()
                .map_err(|_| anyhow!("CAMBOT_CAMERA_PORT must be a TCP port number"))?;
        }
        if let Ok(stream) = std::env::var("CAMBOT_STREAM") {
            if !stream.trim().is_empty() {
                self.camera.stream = stream;
            }
        }
        if let Ok(detector) = std::env::var("CAMBOT_DETECTOR") {
            if !detector.trim().is_empty() {
                self.tracker.detector = detector.trim().to_string();
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.scene.image_width == 0 || self.scene.image_height == 0 {
            return Err(anyhow!(
                "scene image size must be positive (got {}x{})",
                self.scene.image_width,
                self.scene.image_height
            ));
        }
        if self.camera.port == 0 {
            return Err(anyhow!("camera port must be non-zero"));
        }
        if self.camera.host.trim().is_empty() {
            return Err(anyhow!("camera host must not be empty"));
        }
        if self.subject.centered_percent_variance > self.subject.off_center_percent_variance {
            log::warn!(
                "centeredPercentVariance {} exceeds offCenterPercentVariance {}; far zones take precedence",
                self.subject.centered_percent_variance,
                self.subject.off_center_percent_variance
            );
        }
        Ok(())
    }

    pub fn tracker_settings(&self) -> TrackerSettings {
        TrackerSettings {
            image_width: self.scene.image_width,
            image_height: self.scene.image_height,
            recent_threshold: self.face.recent_threshold,
            centered_percent_variance: self.subject.centered_percent_variance,
            off_center_percent_variance: self.subject.off_center_percent_variance,
            director: DirectorConfig {
                min_confidence: self.scene.min_confidence,
                home_pause: self.scene.home_pause,
                zoom_max_safety: self.scene.zoom_max_safety,
                home_zoom: self.stage.home_zoom,
                motion_speed: self.tracker.motion_speed,
            },
            stats_interval: self.tracker.stats_interval,
        }
    }

    pub fn visca_config(&self) -> ViscaConfig {
        ViscaConfig {
            host: self.camera.host.clone(),
            port: self.camera.port,
            timeout: self.camera.ack_timeout,
            await_ack: self.camera.await_ack,
            ..ViscaConfig::default()
        }
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            stream: self.camera.stream.clone(),
            usb_device: self.camera.usb_device,
            target_fps: DEFAULT_CAPTURE_FPS,
            width: self.scene.image_width,
            height: self.scene.image_height,
        }
    }
}

fn read_config_file(path: &Path) -> Result<CambotConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

//! Subject position relative to the frame center.
//!
//! Offsets are expressed as "percent variance": the pixel offset from the
//! frame center, doubled and scaled by the half-frame size. Each axis is
//! classified into one of three bands:
//!
//! - centered: `|variance| <= centered_percent_variance`
//! - off-center: between the two thresholds (dead zone, no correction)
//! - far: `|variance| > off_center_percent_variance`
//!
//! The last ten horizontal and vertical samples are kept to judge whether the
//! subject is settling or jittering.

use std::collections::VecDeque;

use crate::presence::PresenceState;

/// Samples kept per axis.
pub const HISTORY_LEN: usize = 10;

/// Mean consecutive delta (in percent variance) above which a subject is volatile.
pub const VOLATILITY_THRESHOLD: f64 = 9.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// Classification of one axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Zone {
    /// No current position (subject absent).
    #[default]
    Unknown,
    Centered,
    OffCenter,
    /// Far toward the low coordinate side: left or top.
    FarLow,
    /// Far toward the high coordinate side: right or bottom.
    FarHigh,
}

impl Zone {
    fn classify(
        variance: f64,
        raw_center: f64,
        frame_center: f64,
        centered_percent_variance: f64,
        off_center_percent_variance: f64,
    ) -> Self {
        let magnitude = variance.abs();
        if magnitude > off_center_percent_variance {
            if raw_center < frame_center {
                Zone::FarLow
            } else {
                Zone::FarHigh
            }
        } else if magnitude <= centered_percent_variance {
            Zone::Centered
        } else {
            Zone::OffCenter
        }
    }
}

/// Bounded, insertion-ordered sample history. The oldest sample is evicted
/// when a push would exceed `HISTORY_LEN`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OffsetHistory {
    samples: VecDeque<f64>,
}

impl OffsetHistory {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(HISTORY_LEN),
        }
    }

    pub fn push(&mut self, sample: f64) {
        if self.samples.len() == HISTORY_LEN {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    /// Mean of `|s[i+1] - s[i]|`, or `None` with fewer than two samples.
    pub fn mean_abs_delta(&self) -> Option<f64> {
        if self.samples.len() < 2 {
            return None;
        }
        let total: f64 = self
            .samples
            .iter()
            .zip(self.samples.iter().skip(1))
            .map(|(prior, current)| (current - prior).abs())
            .sum();
        Some(total / (self.samples.len() - 1) as f64)
    }

    /// Mean step above `VOLATILITY_THRESHOLD`, or fewer than two samples.
    pub fn is_volatile(&self) -> bool {
        match self.mean_abs_delta() {
            Some(mean) => mean > VOLATILITY_THRESHOLD,
            None => true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PositionState {
    /// Current subject center; `None` when the subject is absent.
    pub center: Option<(f64, f64)>,
    /// Pixel offset of the frame center from the subject (`frame - subject`).
    pub offset: f64,
    pub voffset: f64,
    pub percent_variance: f64,
    pub percent_v_variance: f64,
    pub horizontal: Zone,
    pub vertical: Zone,
    pub is_present: bool,
}

impl PositionState {
    pub fn zone(&self, axis: Axis) -> Zone {
        match axis {
            Axis::Horizontal => self.horizontal,
            Axis::Vertical => self.vertical,
        }
    }

    pub fn is_centered(&self, axis: Axis) -> bool {
        self.zone(axis) == Zone::Centered
    }

    pub fn is_far_left(&self) -> bool {
        self.horizontal == Zone::FarLow
    }

    pub fn is_far_right(&self) -> bool {
        self.horizontal == Zone::FarHigh
    }

    pub fn is_far_top(&self) -> bool {
        self.vertical == Zone::FarLow
    }

    pub fn is_far_bottom(&self) -> bool {
        self.vertical == Zone::FarHigh
    }
}

#[derive(Clone, Debug)]
pub struct PositionEstimator {
    centered_percent_variance: f64,
    off_center_percent_variance: f64,
    state: PositionState,
    offset_history: OffsetHistory,
    offset_v_history: OffsetHistory,
}

impl PositionEstimator {
    pub fn new(centered_percent_variance: f64, off_center_percent_variance: f64) -> Self {
        Self {
            centered_percent_variance,
            off_center_percent_variance,
            state: PositionState::default(),
            offset_history: OffsetHistory::new(),
            offset_v_history: OffsetHistory::new(),
        }
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    pub fn offset_history(&self) -> &OffsetHistory {
        &self.offset_history
    }

    pub fn offset_v_history(&self) -> &OffsetHistory {
        &self.offset_v_history
    }

    /// Update position from this frame's presence.
    ///
    /// A subject that is neither visible nor recently visible resets the
    /// state to absent; the histories are left alone and age out as new
    /// samples arrive. A recently visible subject keeps its last position.
    pub fn evaluate(&mut self, presence: &PresenceState, frame_width: u32, frame_height: u32) {
        if !presence.visible {
            if !presence.recently_visible {
                self.state = PositionState::default();
            } else {
                self.state.is_present = true;
            }
            return;
        }

        let Some((hcenter, vcenter)) = presence.center else {
            return;
        };

        let frame_hcenter = frame_width as f64 / 2.0;
        let frame_vcenter = frame_height as f64 / 2.0;
        let offset = frame_hcenter - hcenter;
        let voffset = frame_vcenter - vcenter;
        let percent_variance = offset * 2.0 / frame_hcenter * 100.0;
        let percent_v_variance = voffset * 2.0 / frame_vcenter * 100.0;

        self.offset_history.push(percent_variance);
        self.offset_v_history.push(percent_v_variance);

        self.state = PositionState {
            center: Some((hcenter, vcenter)),
            offset,
            voffset,
            percent_variance,
            percent_v_variance,
            horizontal: Zone::classify(
                percent_variance,
                hcenter,
                frame_hcenter,
                self.centered_percent_variance,
                self.off_center_percent_variance,
            ),
            vertical: Zone::classify(
                percent_v_variance,
                vcenter,
                frame_vcenter,
                self.centered_percent_variance,
                self.off_center_percent_variance,
            ),
            is_present: true,
        };
    }

    /// Whether the horizontal position is jittering rather than settling.
    ///
    /// Fewer than two samples counts as volatile.
    pub fn is_volatile(&self) -> bool {
        self.offset_history.is_volatile()
    }

    pub fn is_centered(&self, axis: Axis) -> bool {
        self.state.is_centered(axis)
    }

    /// Short summary for the debug log, e.g. `Subj: - .|.`.
    pub fn status_text(&self) -> String {
        let mut msg = String::from("Subj: ");
        msg.push_str(if self.is_volatile() { "! " } else { "- " });
        if !self.state.is_present {
            msg.push_str("...");
            return msg;
        }
        msg.push_str(match self.state.horizontal {
            Zone::Centered => ".|.",
            Zone::OffCenter => "oOo",
            Zone::FarLow => "<..",
            Zone::FarHigh => "..>",
            Zone::Unknown => "???",
        });
        msg
    }
}

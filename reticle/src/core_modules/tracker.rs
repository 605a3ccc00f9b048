// THEORY:
// The `tracker` module adds memory to the otherwise stateless vision layer. It
// holds exactly one slot, the position of the target currently being followed,
// and moves it from frame to frame by nearest-neighbor association.
//
// The state machine:
// 1.  **NoTarget -> Tracking (acquire)**: `choose_target` keeps only boxes whose
//     centroid lies inside the acquisition bounds, ranks them by area (larger is
//     assumed closer), and picks one of the three largest at random. The random
//     pick keeps selection from being a fixed, predictable rule. If nothing
//     survives the bounds the tracker stays idle.
// 2.  **Tracking -> Tracking (update)**: `update_current_target` replaces the slot
//     with the centroid closest to it. The acquisition bounds do not apply here.
//     There is no identity: if another target passes closer, the slot follows it.
// 3.  **Tracking -> NoTarget (drop)**: an empty detection list or an explicit
//     reset clears the slot and zeroes both axis controllers so no integral or
//     derivative history leaks into the next target.
//
// The tracker owns the yaw and pitch controllers because their lifecycle is tied
// to the target's: every drop must reset them.

use crate::core_modules::geometry::{AcquisitionBounds, BoundingBox, Centroid};
use crate::core_modules::pid::{PidController, PidParams};
use crate::error::{Error, Result};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

/// How many of the largest candidates the random pick chooses from.
pub const TOP_CANDIDATES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    NoTarget,
    Tracking(Centroid),
}

/// Per-axis controller output for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    pub yaw: f64,
    pub pitch: f64,
}

impl Correction {
    /// Truncated toward zero, as sent to the actuator.
    pub fn as_move(&self) -> (i32, i32) {
        (self.yaw as i32, self.pitch as i32)
    }
}

pub struct TargetTracker<R> {
    state: TrackerState,
    bounds: AcquisitionBounds,
    yaw: PidController,
    pitch: PidController,
    rng: R,
}

impl<R: Rng> TargetTracker<R> {
    pub fn new(bounds: AcquisitionBounds, yaw: PidParams, pitch: PidParams, rng: R) -> Result<Self> {
        Ok(Self {
            state: TrackerState::NoTarget,
            bounds,
            yaw: PidController::new(yaw)?,
            pitch: PidController::new(pitch)?,
            rng,
        })
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn target(&self) -> Option<Centroid> {
        match self.state {
            TrackerState::Tracking(c) => Some(c),
            TrackerState::NoTarget => None,
        }
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self.state, TrackerState::Tracking(_))
    }

    pub fn yaw(&self) -> &PidController {
        &self.yaw
    }

    pub fn pitch(&self) -> &PidController {
        &self.pitch
    }

    pub fn bounds(&self) -> &AcquisitionBounds {
        &self.bounds
    }

    /// The boxes a random pick would choose from: at most [`TOP_CANDIDATES`] of
    /// the largest boxes admitted by the acquisition bounds.
    pub fn candidates(&self, bboxes: &[BoundingBox]) -> Vec<BoundingBox> {
        let mut valid: Vec<BoundingBox> = bboxes.iter().copied().filter(|b| self.bounds.admits(b)).collect();
        valid.sort_by(|a, b| b.area().cmp(&a.area()));
        valid.truncate(TOP_CANDIDATES);
        valid
    }

    /// Acquires a target if none is tracked. Does nothing while tracking.
    pub fn choose_target(&mut self, bboxes: &[BoundingBox]) {
        if bboxes.is_empty() {
            self.reset_target();
            return;
        }
        if self.is_tracking() {
            return;
        }

        let candidates = self.candidates(bboxes);
        match candidates.choose(&mut self.rng) {
            Some(bbox) => {
                let c = bbox.centroid();
                info!(x = c.x, y = c.y, candidates = candidates.len(), "target acquired");
                self.state = TrackerState::Tracking(c);
            }
            None => {
                debug!(boxes = bboxes.len(), "no box inside acquisition bounds");
                self.reset_target();
            }
        }
    }

    /// Moves the tracked position to the nearest detected centroid.
    pub fn update_current_target(&mut self, bboxes: &[BoundingBox]) {
        let TrackerState::Tracking(prev) = self.state else {
            return;
        };

        let nearest = bboxes
            .iter()
            .map(BoundingBox::centroid)
            .min_by(|a, b| prev.distance_to(a).total_cmp(&prev.distance_to(b)));

        if let Some(c) = nearest {
            if c != prev {
                debug!(from_x = prev.x, from_y = prev.y, to_x = c.x, to_y = c.y, "target moved");
            }
            self.state = TrackerState::Tracking(c);
        }
    }

    /// Drops the target and zeroes both controllers.
    pub fn reset_target(&mut self) {
        if self.is_tracking() {
            info!("target dropped");
        }
        self.yaw.reset();
        self.pitch.reset();
        self.state = TrackerState::NoTarget;
    }

    /// Identity-preserving target locking is not implemented.
    pub fn lock_target(&mut self) -> Result<()> {
        Err(Error::Unsupported("target locking"))
    }

    /// Runs both controllers on the offset between the target and `aim_point`.
    ///
    /// Returns `None` when no target is tracked.
    pub fn correction(&mut self, dt: f64, aim_point: Centroid) -> Result<Option<Correction>> {
        let Some(target) = self.target() else {
            return Ok(None);
        };
        let (dx, dy) = target.offset_from(&aim_point);
        let yaw = self.yaw.step(dt, 0.0, dx as f64)?;
        let pitch = self.pitch.step(dt, 0.0, dy as f64)?;
        Ok(Some(Correction { yaw, pitch }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn tracker(seed: u64) -> TargetTracker<StdRng> {
        tracker_with(AcquisitionBounds::default(), seed)
    }

    fn tracker_with(bounds: AcquisitionBounds, seed: u64) -> TargetTracker<StdRng> {
        TargetTracker::new(
            bounds,
            PidParams::default(),
            PidParams::default(),
            StdRng::seed_from_u64(seed),
        )
        .unwrap()
    }

    fn centered(cx: u32, cy: u32, half: u32) -> BoundingBox {
        BoundingBox::new(cx - half, cy - half, half * 2, half * 2)
    }

    #[test]
    fn acquisition_picks_among_three_largest() {
        let boxes = vec![
            centered(50, 50, 2),
            centered(200, 50, 20),
            centered(400, 50, 5),
            centered(600, 50, 15),
            centered(800, 50, 10),
        ];
        let allowed = [Centroid::new(200, 50), Centroid::new(600, 50), Centroid::new(800, 50)];
        for seed in 0..64 {
            let mut t = tracker(seed);
            t.choose_target(&boxes);
            let c = t.target().expect("should acquire");
            assert!(allowed.contains(&c), "picked {c:?}");
        }
    }

    #[test]
    fn random_pick_reaches_every_candidate() {
        let boxes = vec![centered(100, 100, 10), centered(300, 100, 10), centered(500, 100, 10)];
        let mut seen = std::collections::HashSet::new();
        for seed in 0..200 {
            let mut t = tracker(seed);
            t.choose_target(&boxes);
            seen.insert(t.target().unwrap());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn acquisition_respects_bounds() {
        let bounds = AcquisitionBounds {
            x_center_min: 300,
            ..Default::default()
        };
        let mut t = tracker_with(bounds, 1);
        t.choose_target(&[centered(100, 100, 40), centered(400, 100, 5)]);
        assert_eq!(t.target(), Some(Centroid::new(400, 100)));
    }

    #[test]
    fn nothing_in_bounds_stays_idle() {
        let bounds = AcquisitionBounds {
            x_center_min: 1000,
            ..Default::default()
        };
        let mut t = tracker_with(bounds, 1);
        t.choose_target(&[centered(100, 100, 40)]);
        assert_eq!(t.state(), TrackerState::NoTarget);
    }

    #[test]
    fn tracking_ignores_new_acquisition() {
        let mut t = tracker(3);
        t.choose_target(&[centered(100, 100, 10)]);
        t.choose_target(&[centered(500, 500, 50)]);
        assert_eq!(t.target(), Some(Centroid::new(100, 100)));
    }

    #[test]
    fn update_follows_nearest_centroid() {
        let mut t = tracker(0);
        t.choose_target(&[centered(100, 100, 10)]);
        t.update_current_target(&[centered(500, 500, 10), centered(102, 101, 10)]);
        assert_eq!(t.target(), Some(Centroid::new(102, 101)));
    }

    #[test]
    fn update_ignores_acquisition_bounds() {
        let bounds = AcquisitionBounds {
            x_center_max: 150,
            ..Default::default()
        };
        let mut t = tracker_with(bounds, 0);
        t.choose_target(&[centered(140, 100, 10)]);
        t.update_current_target(&[centered(160, 100, 10)]);
        assert_eq!(t.target(), Some(Centroid::new(160, 100)));
    }

    #[test]
    fn update_without_target_is_noop() {
        let mut t = tracker(0);
        t.update_current_target(&[centered(100, 100, 10)]);
        assert_eq!(t.state(), TrackerState::NoTarget);
    }

    #[test]
    fn empty_detections_drop_and_reset_controllers() {
        let mut t = tracker(0);
        t.choose_target(&[centered(300, 200, 10)]);
        t.correction(0.016, Centroid::new(320, 240)).unwrap();
        assert!(!t.yaw().is_at_rest());

        t.choose_target(&[]);
        assert_eq!(t.state(), TrackerState::NoTarget);
        assert!(t.yaw().is_at_rest());
        assert!(t.pitch().is_at_rest());
    }

    #[test]
    fn correction_points_toward_target() {
        let mut t = tracker(0);
        t.choose_target(&[centered(400, 100, 10)]);
        let c = t.correction(0.016, Centroid::new(320, 240)).unwrap().unwrap();
        assert!(c.yaw > 0.0);
        assert!(c.pitch < 0.0);
        let (dx, dy) = c.as_move();
        assert_eq!(dx, c.yaw.trunc() as i32);
        assert_eq!(dy, c.pitch.trunc() as i32);
    }

    #[test]
    fn correction_without_target_is_none() {
        let mut t = tracker(0);
        assert!(t.correction(0.016, Centroid::new(0, 0)).unwrap().is_none());
    }

    #[test]
    fn correction_rejects_zero_dt() {
        let mut t = tracker(0);
        t.choose_target(&[centered(400, 100, 10)]);
        assert!(t.correction(0.0, Centroid::new(320, 240)).is_err());
    }

    #[test]
    fn lock_target_is_unsupported() {
        let mut t = tracker(0);
        assert!(matches!(t.lock_target(), Err(Error::Unsupported(_))));
    }

    #[test]
    fn zero_area_boxes_rank_last() {
        let boxes = vec![
            BoundingBox::new(10, 10, 0, 0),
            centered(200, 50, 4),
            BoundingBox::new(30, 300, 0, 0),
            centered(400, 50, 6),
            centered(600, 50, 5),
            BoundingBox::new(700, 300, 0, 0),
        ];
        let singles = [Centroid::new(10, 10), Centroid::new(30, 300), Centroid::new(700, 300)];
        for seed in 0..64 {
            let mut t = tracker(seed);
            assert_eq!(t.candidates(&boxes).len(), TOP_CANDIDATES);
            t.choose_target(&boxes);
            let c = t.target().expect("should acquire");
            assert!(!singles.contains(&c), "picked zero-area box at {c:?}");
        }
    }

    #[test]
    fn lone_zero_area_box_is_acquired() {
        let mut t = tracker(9);
        t.choose_target(&[BoundingBox::new(42, 17, 0, 0)]);
        assert_eq!(t.target(), Some(Centroid::new(42, 17)));
    }

    proptest! {
        #[test]
        fn prop_acquisition_picks_a_largest_admitted_box(
            raw in prop::collection::vec((0..600u32, 0..400u32, 0..80u32, 0..80u32), 1..12),
            x_min in 0..300i32,
            y_min in 0..200i32,
            seed in any::<u64>(),
        ) {
            let boxes: Vec<BoundingBox> = raw.iter().map(|&(x, y, w, h)| BoundingBox::new(x, y, w, h)).collect();
            let bounds = AcquisitionBounds {
                x_center_min: x_min,
                y_center_min: y_min,
                ..Default::default()
            };
            let mut t = tracker_with(bounds, seed);
            t.choose_target(&boxes);

            let mut areas: Vec<u64> = boxes.iter().filter(|b| bounds.admits(b)).map(BoundingBox::area).collect();
            areas.sort_unstable_by(|a, b| b.cmp(a));
            match areas.get(TOP_CANDIDATES.min(areas.len()).saturating_sub(1)) {
                None => {
                    prop_assert_eq!(t.state(), TrackerState::NoTarget);
                }
                Some(&cutoff) => {
                    let c = t.target().expect("an admitted box exists");
                    prop_assert!(boxes
                        .iter()
                        .any(|b| bounds.admits(b) && b.area() >= cutoff && b.centroid() == c));
                }
            }
        }
    }
}

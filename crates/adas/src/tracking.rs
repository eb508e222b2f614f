//! Multi-object tracking
//!
//! Greedy nearest-center association between existing tracks and the
//! current frame's detections. Tracks are created, refreshed and retired
//! explicitly through an id-keyed table.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::config::TrackerConfig;
use crate::object::{BoundingBox, TrackedObject};
use crate::AdasError;
use data_validator::Validator;

/// Internal track record
#[derive(Debug, Clone)]
struct Track {
    bbox: BoundingBox,
    missed_count: u32,
}

/// Frame-to-frame object tracker
#[derive(Debug, Clone)]
pub struct Tracker {
    config: TrackerConfig,

    /// Ids are allocated in increasing order, so key order is creation order
    tracks: BTreeMap<u64, Track>,
    next_id: u64,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Result<Self, AdasError> {
        let v = Validator::default();
        v.validate_positive("association_threshold_px", config.association_threshold_px)?;
        v.validate_positive("focal_length_px", config.focal_length_px)?;
        v.validate_positive("min_box_height_px", config.min_box_height_px)?;
        v.validate_positive("max_distance_m", config.max_distance_m)?;

        Ok(Self {
            config,
            tracks: BTreeMap::new(),
            next_id: 1,
        })
    }

    /// Associate detections with tracks and return the live tracked objects
    ///
    /// Malformed detections are dropped. On error the track table is left
    /// as it was before the call.
    pub fn update(&mut self, detections: &[BoundingBox]) -> Result<Vec<TrackedObject>, AdasError> {
        let mut unassigned: Vec<Option<&BoundingBox>> = detections
            .iter()
            .filter(|det| match det.validate() {
                Ok(()) => true,
                Err(e) => {
                    warn!("Dropping malformed detection: {}", e);
                    false
                }
            })
            .map(Some)
            .collect();

        let mut staged = self.tracks.clone();
        let mut next_id = self.next_id;
        let mut retired = Vec::new();

        for (&id, track) in staged.iter_mut() {
            let (tx, ty) = track.bbox.center();

            let mut best: Option<(usize, f64)> = None;
            for (idx, det) in unassigned.iter().enumerate() {
                let Some(det) = det else { continue };
                let (dx, dy) = det.center();
                let dist = ((dx - tx).powi(2) + (dy - ty).powi(2)).sqrt();
                if best.map_or(true, |(_, d)| dist < d) {
                    best = Some((idx, dist));
                }
            }

            match best {
                Some((idx, dist)) if dist < self.config.association_threshold_px => {
                    if let Some(det) = unassigned[idx].take() {
                        debug!(track_id = id, dist, "Track associated");
                        track.bbox = det.clone();
                        track.missed_count = 0;
                    }
                }
                _ => {
                    track.missed_count += 1;
                    if track.missed_count > self.config.max_missed_frames {
                        retired.push(id);
                    }
                }
            }
        }

        for id in retired {
            debug!(track_id = id, "Track retired");
            staged.remove(&id);
        }

        for det in unassigned.into_iter().flatten() {
            let id = next_id;
            next_id = next_id
                .checked_add(1)
                .ok_or_else(|| AdasError::Tracking("Track id space exhausted".to_string()))?;
            debug!(track_id = id, "Track created");
            staged.insert(
                id,
                Track {
                    bbox: det.clone(),
                    missed_count: 0,
                },
            );
        }

        let mut objects = Vec::with_capacity(staged.len());
        for (&id, track) in &staged {
            let distance_m = self.estimate_distance(&track.bbox);
            if !distance_m.is_finite() {
                warn!(track_id = id, "Non-finite distance estimate, skipping track");
                continue;
            }
            objects.push(TrackedObject {
                track_id: id,
                bbox: track.bbox.clone(),
                velocity_mps: 0.0,
                distance_m,
            });
        }

        self.tracks = staged;
        self.next_id = next_id;
        Ok(objects)
    }

    /// Pinhole range estimate from box height, clamped to the configured maximum
    pub fn estimate_distance(&self, bbox: &BoundingBox) -> f64 {
        let height = bbox.height().max(self.config.min_box_height_px);
        (self.config.focal_length_px / height).min(self.config.max_distance_m)
    }

    /// Drop all tracks and start a new id session
    pub fn reset(&mut self) {
        self.tracks.clear();
        self.next_id = 1;
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Live track ids in creation order
    pub fn track_ids(&self) -> Vec<u64> {
        self.tracks.keys().copied().collect()
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    #[cfg(test)]
    fn set_next_id(&mut self, id: u64) {
        self.next_id = id;
    }
}

//! Composite collision detection.
//!
//! Tiers run in order and the first one producing a candidate wins:
//!
//! | Tier | Test | Applies to |
//! |------|------|------------|
//! | 1 | zone contains the pointer | pointer-driven frames |
//! | 2 | zone overlaps the dragged rect | all drags |
//! | 3 | nearest zone center, card-accepting zones only | card drags |
//! | 4 | nearest corners | all drags |
//!
//! Within tiers 1 and 2 the smallest zone wins, so a card beats the column
//! body around it. Every tier keeps the first supplied zone on a tie, which
//! makes the result a pure function of the frame.

use crate::config::CollisionConfig;
use crate::domain::{DropZone, DropZoneId, EntityKind, Point, Rect};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Geometry snapshot delivered with each input event
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DragFrame {
    /// Current pointer coordinate; `None` for keyboard-driven frames
    pub pointer: Option<Point>,
    /// Bounds of the dragged item (its overlay)
    pub active: Rect,
    /// Every drop zone currently mounted
    pub zones: Vec<DropZone>,
}

impl DragFrame {
    pub fn new(pointer: Option<Point>, active: Rect, zones: Vec<DropZone>) -> Self {
        Self {
            pointer,
            active,
            zones,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionTier {
    PointerWithin,
    RectIntersection,
    NearestCenter,
    NearestCorner,
}

/// The chosen zone and the tier that chose it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub zone: DropZoneId,
    pub tier: CollisionTier,
}

#[derive(Debug, Clone, Default)]
pub struct CollisionStrategy {
    config: CollisionConfig,
}

impl CollisionStrategy {
    pub fn new(config: CollisionConfig) -> Self {
        Self { config }
    }

    /// Picks the single best zone for the dragged item, if any.
    pub fn detect(&self, frame: &DragFrame, kind: EntityKind) -> Option<Collision> {
        if frame.zones.is_empty() {
            return None;
        }

        let hit = self
            .pointer_within(frame)
            .map(|zone| (zone, CollisionTier::PointerWithin))
            .or_else(|| {
                smallest(frame.zones.iter().filter(|z| z.rect.intersects(&frame.active)))
                    .map(|zone| (zone, CollisionTier::RectIntersection))
            })
            .or_else(|| {
                if kind == EntityKind::Card && self.config.card_nearest_center {
                    let center = frame.active.center();
                    nearest(
                        frame.zones.iter().filter(|z| z.id.accepts_cards()),
                        |z| z.rect.center().distance_to(center),
                    )
                    .map(|zone| (zone, CollisionTier::NearestCenter))
                } else {
                    None
                }
            })
            .or_else(|| {
                nearest(frame.zones.iter(), |z| z.rect.corner_distance(&frame.active))
                    .map(|zone| (zone, CollisionTier::NearestCorner))
            });

        hit.map(|(zone, tier)| {
            trace!(zone = %zone.id, ?tier, "collision resolved");
            Collision {
                zone: zone.id.clone(),
                tier,
            }
        })
    }

    fn pointer_within<'a>(&self, frame: &'a DragFrame) -> Option<&'a DropZone> {
        let pointer = frame.pointer?;
        smallest(frame.zones.iter().filter(|z| z.rect.contains(pointer)))
    }
}

/// Smallest-area zone; the earliest wins ties
fn smallest<'a>(zones: impl Iterator<Item = &'a DropZone>) -> Option<&'a DropZone> {
    nearest(zones, |z| z.rect.area())
}

/// Zone minimising `metric`; the earliest wins ties and NaN never wins
fn nearest<'a>(
    zones: impl Iterator<Item = &'a DropZone>,
    metric: impl Fn(&DropZone) -> f64,
) -> Option<&'a DropZone> {
    zones
        .map(|zone| (metric(zone), zone))
        .filter(|(score, _)| !score.is_nan())
        .fold(None, |best: Option<(f64, &'a DropZone)>, (score, zone)| match best {
            Some((best_score, _)) if best_score <= score => best,
            _ => Some((score, zone)),
        })
        .map(|(_, zone)| zone)
}

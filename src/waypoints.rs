//! Waypoint extraction, snapping and ordering
//!
//! Every waypoint sits exactly on a profile point: its distance, position and
//! elevation are copied from the point a target snaps to, never from the raw
//! target. Position snapping is a nearest-neighbour query on an R-tree of the
//! profile projected to local meters.

use std::collections::BTreeSet;

use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{CoursePaceError, Result};
use crate::models::{is_valid_coordinate, ProfilePoint, TrackMarker, Waypoint};

const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

pub const START_TAG: &str = "start";
pub const FINISH_TAG: &str = "finish";

/// Profile point index with projected coordinates for R-tree queries
#[derive(Debug, Clone, Copy)]
struct IndexedPoint {
    idx: usize,
    x: f64,
    y: f64,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.x, self.y])
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.x - point[0];
        let dy = self.y - point[1];
        dx * dx + dy * dy
    }
}

/// Where a waypoint should go
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementTarget {
    /// A map click
    Position { lat: f64, lng: f64 },
    /// A distance along the route in meters
    Distance(f64),
}

/// A profile point chosen by [`WaypointLocator::snap`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnappedPosition {
    pub index: usize,
    pub distance_meters: f64,
    pub lat: f64,
    pub lng: f64,
    pub elevation_meters: Option<f64>,
}

/// Snaps placement targets onto a course profile
pub struct WaypointLocator<'a, P: ProfilePoint> {
    profile: &'a [P],
    tree: RTree<IndexedPoint>,
    origin_lat: f64,
    origin_lng: f64,
    lng_scale: f64,
}

impl<'a, P: ProfilePoint> WaypointLocator<'a, P> {
    /// Index a profile. Fails with [`CoursePaceError::EmptyProfile`] when empty.
    pub fn new(profile: &'a [P]) -> Result<Self> {
        let first = profile
            .first()
            .ok_or(CoursePaceError::EmptyProfile { point_count: 0 })?;

        let mut locator = Self {
            profile,
            tree: RTree::new(),
            origin_lat: first.lat(),
            origin_lng: first.lng(),
            lng_scale: first.lat().to_radians().cos(),
        };

        let indexed: Vec<IndexedPoint> = profile
            .iter()
            .enumerate()
            .map(|(idx, p)| {
                let [x, y] = locator.project(p.lat(), p.lng());
                IndexedPoint { idx, x, y }
            })
            .collect();
        locator.tree = RTree::bulk_load(indexed);

        Ok(locator)
    }

    pub fn total_distance_meters(&self) -> f64 {
        self.profile.last().map(|p| p.distance_meters()).unwrap_or(0.0)
    }

    /// Equirectangular projection around the first profile point, in meters
    fn project(&self, lat: f64, lng: f64) -> [f64; 2] {
        [
            (lng - self.origin_lng).to_radians() * self.lng_scale * EARTH_RADIUS_METERS,
            (lat - self.origin_lat).to_radians() * EARTH_RADIUS_METERS,
        ]
    }

    /// Resolve a target to the nearest profile point.
    pub fn snap(&self, target: PlacementTarget) -> Result<SnappedPosition> {
        let index = match target {
            PlacementTarget::Position { lat, lng } => {
                if !is_valid_coordinate(lat, lng) {
                    return Err(CoursePaceError::InvalidCoordinates { lat, lng });
                }
                let query = self.project(lat, lng);
                self.tree
                    .nearest_neighbor(&query)
                    .map(|nearest| nearest.idx)
                    .ok_or(CoursePaceError::EmptyProfile { point_count: 0 })?
            }
            PlacementTarget::Distance(distance) => {
                let total = self.total_distance_meters();
                if !(0.0..=total).contains(&distance) {
                    return Err(CoursePaceError::WaypointOutOfBounds {
                        distance_meters: distance,
                        total_distance_meters: total,
                    });
                }
                self.nearest_by_distance(distance)
            }
        };

        let point = &self.profile[index];
        Ok(SnappedPosition {
            index,
            distance_meters: point.distance_meters(),
            lat: point.lat(),
            lng: point.lng(),
            elevation_meters: point.elevation_meters(),
        })
    }

    fn nearest_by_distance(&self, distance: f64) -> usize {
        let upper = self.profile.partition_point(|p| p.distance_meters() < distance);
        if upper == 0 {
            return 0;
        }
        if upper >= self.profile.len() {
            return self.profile.len() - 1;
        }
        let below = distance - self.profile[upper - 1].distance_meters();
        let above = self.profile[upper].distance_meters() - distance;
        if below <= above {
            upper - 1
        } else {
            upper
        }
    }
}

/// User-editable waypoint fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaypointDetails {
    pub name: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl WaypointDetails {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }
}

/// The waypoints of one course, kept in `order`
///
/// `order` is always a dense 0-based ranking consistent with ascending
/// distance. Among equal distances, the waypoint inserted or moved most
/// recently ranks last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointSet {
    course_id: String,
    waypoints: Vec<Waypoint>,
}

impl WaypointSet {
    pub fn new(course_id: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            waypoints: Vec::new(),
        }
    }

    /// Adopt stored waypoints, re-deriving `order` from distance.
    ///
    /// Existing `order` values break distance ties.
    pub fn from_waypoints(course_id: impl Into<String>, mut waypoints: Vec<Waypoint>) -> Self {
        waypoints.sort_by_key(|w| w.order);
        let mut set = Self {
            course_id: course_id.into(),
            waypoints,
        };
        set.waypoints
            .sort_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters));
        set.renumber();
        set
    }

    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn into_waypoints(self) -> Vec<Waypoint> {
        self.waypoints
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn get(&self, id: &str) -> Result<&Waypoint> {
        self.waypoints
            .iter()
            .find(|w| w.id == id)
            .ok_or_else(|| CoursePaceError::WaypointNotFound { id: id.to_string() })
    }

    /// Place a new waypoint and return its id.
    pub fn insert<P: ProfilePoint>(
        &mut self,
        locator: &WaypointLocator<'_, P>,
        target: PlacementTarget,
        details: WaypointDetails,
    ) -> Result<String> {
        let snapped = locator.snap(target)?;
        let waypoint = Waypoint {
            id: Uuid::new_v4().to_string(),
            course_id: self.course_id.clone(),
            name: details.name,
            distance_meters: snapped.distance_meters,
            elevation_meters: snapped.elevation_meters,
            lat: snapped.lat,
            lng: snapped.lng,
            tags: details.tags,
            order: 0,
            icon: details.icon,
            description: details.description,
        };
        let id = waypoint.id.clone();

        debug!(waypoint = %id, distance_meters = snapped.distance_meters, "Inserted waypoint");
        self.place(waypoint);
        Ok(id)
    }

    /// Move an existing waypoint to a new target.
    pub fn move_waypoint<P: ProfilePoint>(
        &mut self,
        locator: &WaypointLocator<'_, P>,
        id: &str,
        target: PlacementTarget,
    ) -> Result<&Waypoint> {
        let position = self.position_of(id)?;
        let snapped = locator.snap(target)?;

        let mut waypoint = self.waypoints.remove(position);
        waypoint.distance_meters = snapped.distance_meters;
        waypoint.elevation_meters = snapped.elevation_meters;
        waypoint.lat = snapped.lat;
        waypoint.lng = snapped.lng;

        debug!(waypoint = %id, distance_meters = snapped.distance_meters, "Moved waypoint");
        let index = self.place(waypoint);
        Ok(&self.waypoints[index])
    }

    /// Replace the editable fields of a waypoint without moving it.
    pub fn update_details(&mut self, id: &str, details: WaypointDetails) -> Result<&Waypoint> {
        let position = self.position_of(id)?;
        let waypoint = &mut self.waypoints[position];
        waypoint.name = details.name;
        waypoint.tags = details.tags;
        waypoint.icon = details.icon;
        waypoint.description = details.description;
        Ok(&*waypoint)
    }

    pub fn remove(&mut self, id: &str) -> Result<Waypoint> {
        let position = self.position_of(id)?;
        let removed = self.waypoints.remove(position);
        self.renumber();
        Ok(removed)
    }

    fn position_of(&self, id: &str) -> Result<usize> {
        self.waypoints
            .iter()
            .position(|w| w.id == id)
            .ok_or_else(|| CoursePaceError::WaypointNotFound { id: id.to_string() })
    }

    /// Insert after every waypoint at the same or smaller distance
    fn place(&mut self, waypoint: Waypoint) -> usize {
        let index = self
            .waypoints
            .partition_point(|w| w.distance_meters <= waypoint.distance_meters);
        self.waypoints.insert(index, waypoint);
        self.renumber();
        index
    }

    fn renumber(&mut self) {
        for (order, waypoint) in self.waypoints.iter_mut().enumerate() {
            waypoint.order = order as u32;
        }
    }
}

/// Initial waypoints for a new course: start, finish and any track markers.
///
/// Markers with a distance snap by distance, others by position. Markers
/// that cannot be placed are skipped with a warning.
pub fn extract_waypoints<P: ProfilePoint>(
    course_id: &str,
    locator: &WaypointLocator<'_, P>,
    markers: &[TrackMarker],
) -> Result<WaypointSet> {
    let mut set = WaypointSet::new(course_id);

    set.insert(
        locator,
        PlacementTarget::Distance(0.0),
        WaypointDetails::named("Start").with_tag(START_TAG),
    )?;

    for marker in markers {
        let target = match marker.distance_meters {
            Some(distance) => PlacementTarget::Distance(distance),
            None => PlacementTarget::Position {
                lat: marker.lat,
                lng: marker.lng,
            },
        };
        let details = WaypointDetails {
            name: marker.name.clone(),
            tags: marker.tags.clone(),
            icon: marker.icon.clone(),
            description: marker.description.clone(),
        };
        if let Err(e) = set.insert(locator, target, details) {
            warn!(marker = %marker.name, error = %e, "Skipping track marker");
        }
    }

    set.insert(
        locator,
        PlacementTarget::Distance(locator.total_distance_meters()),
        WaypointDetails::named("Finish").with_tag(FINISH_TAG),
    )?;

    debug!(course = course_id, count = set.len(), "Extracted waypoints");
    Ok(set)
}

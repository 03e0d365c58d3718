use crate::geo::Position;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;


/// Delivery precedence of an entity's updates.
///
/// The numeric values are part of the wire contract and double as dirty-set
/// slot indexes, lowest to highest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum Priority {
    Unspecified,
    Routine,
    Immediate,
    Flash,
}

impl Priority {
    pub const COUNT: usize = 4;

    pub fn slot(self) -> usize {
        self as usize
    }
}

impl From<u8> for Priority {
    fn from(v: u8) -> Self {
        match v {
            1 => Priority::Routine,
            2 => Priority::Immediate,
            3 => Priority::Flash,
            _ => Priority::Unspecified,
        }
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> u8 {
        p as u8
    }
}

/// Kind of change surfaced to subscribers.
///
/// Wire values: invalid=0, updated=1, expired=2, unobserved=3. `Invalid` is
/// only ever sent as the benign stream-opening sentinel; clients ignore it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum ChangeKind {
    Invalid,
    Updated,
    Expired,
    Unobserved,
}

impl From<u8> for ChangeKind {
    fn from(v: u8) -> Self {
        match v {
            1 => ChangeKind::Updated,
            2 => ChangeKind::Expired,
            3 => ChangeKind::Unobserved,
            _ => ChangeKind::Invalid,
        }
    }
}

impl From<ChangeKind> for u8 {
    fn from(k: ChangeKind) -> u8 {
        k as u8
    }
}

/// Temporal validity window. `until` is never synthesized by the server.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Lifetime {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,
}

/// Owning originator of an entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Controller {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bearing {
    pub degrees: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationUncertainty {
    #[serde(rename = "semiMajorM", skip_serializing_if = "Option::is_none")]
    pub semi_major_m: Option<f64>,
    #[serde(rename = "semiMinorM", skip_serializing_if = "Option::is_none")]
    pub semi_minor_m: Option<f64>,
    #[serde(rename = "orientationDeg", skip_serializing_if = "Option::is_none")]
    pub orientation_deg: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    #[serde(rename = "speedMps", skip_serializing_if = "Option::is_none")]
    pub speed_mps: Option<f64>,
    #[serde(rename = "courseDeg", skip_serializing_if = "Option::is_none")]
    pub course_deg: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Locator {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Reference to another entity by id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(rename = "entityId", skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

/// Tasking relationships: which contexts an entity belongs to and which
/// entities are assigned to it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Taskable {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<EntityRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assignee: Vec<EntityRef>,
}

/// Driver configuration carried by a configuration entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub controller: String,
    pub key: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub value: Value,
}

/// An entity is an id plus an open bag of optional components. There is no
/// type discriminator; meaning emerges from which components are present.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<Controller>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifetime: Option<Lifetime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo: Option<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera: Option<Camera>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection: Option<Detection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearing: Option<Bearing>,
    #[serde(
        rename = "locationUncertainty",
        skip_serializing_if = "Option::is_none"
    )]
    pub location_uncertainty: Option<LocationUncertainty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<Track>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locator: Option<Locator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taskable: Option<Taskable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Configuration>,
}

/// Stable component tags used by filters and CLI flags.
///
/// This table is part of the external contract and must not change:
/// label=2, controller=3, lifetime=4, priority=5, geo=11, symbol=12,
/// camera=15, detection=16, bearing=17, locationUncertainty=20, track=21,
/// locator=22, taskable=23, config=31.
pub mod tag {
    pub const LABEL: u32 = 2;
    pub const CONTROLLER: u32 = 3;
    pub const LIFETIME: u32 = 4;
    pub const PRIORITY: u32 = 5;
    pub const GEO: u32 = 11;
    pub const SYMBOL: u32 = 12;
    pub const CAMERA: u32 = 15;
    pub const DETECTION: u32 = 16;
    pub const BEARING: u32 = 17;
    pub const LOCATION_UNCERTAINTY: u32 = 20;
    pub const TRACK: u32 = 21;
    pub const LOCATOR: u32 = 22;
    pub const TASKABLE: u32 = 23;
    pub const CONFIG: u32 = 31;
}

impl Entity {
    /// Whether the component with the given stable tag is present.
    /// Unknown tags are never present.
    pub fn has_component(&self, field: u32) -> bool {
        match field {
            tag::LABEL => self.label.is_some(),
            tag::CONTROLLER => self.controller.is_some(),
            tag::LIFETIME => self.lifetime.is_some(),
            tag::PRIORITY => self.priority.is_some(),
            tag::GEO => self.geo.is_some(),
            tag::SYMBOL => self.symbol.is_some(),
            tag::CAMERA => self.camera.is_some(),
            tag::DETECTION => self.detection.is_some(),
            tag::BEARING => self.bearing.is_some(),
            tag::LOCATION_UNCERTAINTY => self.location_uncertainty.is_some(),
            tag::TRACK => self.track.is_some(),
            tag::LOCATOR => self.locator.is_some(),
            tag::TASKABLE => self.taskable.is_some(),
            tag::CONFIG => self.config.is_some(),
            _ => false,
        }
    }

    /// Apply the acceptance-time lifetime rules: a missing lifetime is
    /// created, a missing `from` is set to `now`, and `until` is left alone.
    pub fn normalize_lifetime(&mut self, now: DateTime<Utc>) {
        let lifetime = self.lifetime.get_or_insert_with(Lifetime::default);
        if lifetime.from.is_none() {
            lifetime.from = Some(now);
        }
    }

    /// An entity is expired at `now` iff `lifetime.until` is present and
    /// strictly before `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.lifetime.as_ref().and_then(|l| l.until) {
            Some(until) => until < now,
            None => false,
        }
    }

    /// Effective delivery priority: the priority component if present,
    /// `Routine` otherwise.
    pub fn effective_priority(&self) -> Priority {
        self.priority.unwrap_or(Priority::Routine)
    }
}

/// A single event on a watch stream: the entity (absent for the sentinel and
/// for expirations of already-removed entities) and the change kind.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChangeEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<Entity>,
    pub t: ChangeKind,
}

impl ChangeEvent {
    /// The benign stream-opening sentinel. Clients must tolerate it.
    pub fn sentinel() -> Self {
        Self {
            entity: None,
            t: ChangeKind::Invalid,
        }
    }
}

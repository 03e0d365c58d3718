use crate::entity::Entity;
use crate::geo::{Bound, Geometry};
use serde::{Deserialize, Serialize};
use tracing::warn;


/// Filter on the configuration component. Each stated field must match
/// exactly; the component itself must be present.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Filter on taskable membership: the entity's taskable component must
/// contain the given context and/or assignee entity id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskableFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
}

/// Geographic predicate: either an inline geometry or a reference to another
/// entity whose geo component defines the region.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
    #[serde(rename = "geoEntityId", skip_serializing_if = "Option::is_none")]
    pub geo_entity_id: Option<String>,
}

/// A recursive entity filter.
///
/// `or` short-circuits first; `not` negates its inner filter; then every
/// populated scalar is checked in turn. An absent filter matches everything;
/// `or: []` and a missing `not` constrain nothing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub or: Vec<EntityFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not: Option<Box<EntityFilter>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub component: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taskable: Option<TaskableFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo: Option<GeoFilter>,
}

impl EntityFilter {
    pub fn matches(&self, entity: &Entity) -> bool {
        // or short-circuits first, then not, then every populated scalar;
        // all present groups must pass
        if !self.or.is_empty() && !self.or.iter().any(|sub| sub.matches(entity)) {
            return false;
        }

        if let Some(not) = &self.not {
            if not.matches(entity) {
                return false;
            }
        }

        if let Some(id) = &self.id {
            if entity.id != *id {
                return false;
            }
        }

        if let Some(label) = &self.label {
            if entity.label.as_ref() != Some(label) {
                return false;
            }
        }

        // Entity must have ALL listed components
        if !self.component.iter().all(|&tag| entity.has_component(tag)) {
            return false;
        }

        if let Some(geo) = &self.geo {
            if !geo.matches(entity) {
                return false;
            }
        }

        if let Some(config) = &self.config {
            let Some(entity_config) = &entity.config else {
                return false;
            };
            if let Some(controller) = &config.controller {
                if entity_config.controller != *controller {
                    return false;
                }
            }
            if let Some(key) = &config.key {
                if entity_config.key != *key {
                    return false;
                }
            }
        }

        if let Some(taskable) = &self.taskable {
            if let Some(context) = &taskable.context {
                let contained = entity.taskable.as_ref().is_some_and(|t| {
                    t.context
                        .iter()
                        .any(|r| r.entity_id.as_ref() == Some(context))
                });
                if !contained {
                    return false;
                }
            }
            if let Some(assignee) = &taskable.assignee {
                let contained = entity.taskable.as_ref().is_some_and(|t| {
                    t.assignee
                        .iter()
                        .any(|r| r.entity_id.as_ref() == Some(assignee))
                });
                if !contained {
                    return false;
                }
            }
        }

        true
    }
}

impl GeoFilter {
    /// The entity must have a geo component whose point intersects the
    /// bounding box of the filter geometry. A filter with no resolvable
    /// geometry matches everything.
    fn matches(&self, entity: &Entity) -> bool {
        let Some(position) = &entity.geo else {
            return false;
        };

        if let Some(geometry) = &self.geometry {
            let shape = match geometry.resolve() {
                Ok(shape) => shape,
                Err(e) => {
                    warn!(error = %e, "undecodable filter geometry, treating as no geometry");
                    None
                }
            };
            if let Some(bound) = shape.as_ref().and_then(|s| s.bound()) {
                return bound.intersects(&Bound::of(position.lon_lat()));
            }
            return true;
        }

        if self.geo_entity_id.is_some() {
            // TODO: resolve the referenced entity's geo component and
            // intersect against its bounds
            return true;
        }

        true
    }
}

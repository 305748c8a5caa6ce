//! JSON predicate definitions.
//!
//! Datasets can ship their own queries alongside the built-in catalogue:
//!
//! ```json
//! {"name": "gate", "kind": "start_end",
//!  "start": {"rect": {"left": 0, "top": 0, "right": 10, "bottom": 10}},
//!  "end": [{"x": 20, "y": 0}, {"x": 30, "y": 0}, {"x": 25, "y": 10}]}
//! ```

use pathq_models::{Polygon, Rect};
use serde::{Deserialize, Serialize};

/// A named predicate as read from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredicateDef {
    pub name: String,
    #[serde(flatten)]
    pub body: PredicateBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PredicateBody {
    StartEnd { start: RegionDef, end: RegionDef },
    PointSet { regions: Vec<RegionDef> },
    Waypoint { regions: Vec<RegionDef> },
    /// Or over previously registered predicates
    AnyOf { members: Vec<String> },
}

/// A region given either as a rectangle shorthand or as a point list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegionDef {
    Rect { rect: Rect },
    Polygon(Polygon),
}

impl RegionDef {
    pub fn to_polygon(&self) -> Polygon {
        match self {
            RegionDef::Rect { rect } => rect.to_polygon(),
            RegionDef::Polygon(polygon) => polygon.clone(),
        }
    }
}

use serde::{Deserialize, Serialize};

/// Latest known state of one tracked entity
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Numeric tag of the reporting entity
    pub id: u64,

    /// Position on the field, in meters (x right, y up)
    pub position: (f64, f64),

    /// Free-form status text shown under the marker
    pub label: String,
}

/// A decoded position report, applied to the store as a whole-record replace
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityUpdate {
    pub id: u64,
    pub position: (f64, f64),
    pub label: String,
}

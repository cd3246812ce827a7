//! The GOOSE data-object value map (component E): written only by the
//! subscriber's receive loop, read under a shared lock by the trip-rule
//! evaluator (component F).

use std::collections::HashMap;
use std::sync::RwLock;

/// A typed GOOSE data primitive, per the `allData` variants named in the
/// data model.
#[derive(Debug, Clone, PartialEq)]
pub enum GooseValue {
    /// `bool` primitive.
    Bool(bool),
    /// `int` primitive (signed).
    Int(i64),
    /// `uint` primitive (unsigned).
    Uint(u64),
    /// `float` primitive.
    Float(f64),
    /// `utf8-string` primitive.
    Utf8(String),
    /// `bitstring` primitive, stored as raw octets.
    BitString(Vec<u8>),
}

/// One entry of the data-object map: the current typed value plus the
/// monotone counters named in the data model.
#[derive(Debug, Clone)]
pub struct GooseDataPoint {
    /// Current typed value.
    pub value: GooseValue,
    /// Number of times this key has ever been written.
    pub arrival_count: u64,
    /// The `arrival_count` at which the value last actually changed.
    pub last_change_count: u64,
}

/// Shared, read-biased map from `"<goCBRef>[index]"` (or any structural
/// path the caller chooses) to its current typed value.
#[derive(Debug, Default)]
pub struct GooseDataMap {
    points: RwLock<HashMap<String, GooseDataPoint>>,
}

impl GooseDataMap {
    /// Construct an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write (or create) one data point. Updates `arrival_count` always;
    /// `last_change_count` only advances when the value actually differs
    /// from the previous one.
    pub fn write(&self, path: &str, value: GooseValue) {
        let mut points = self.points.write().unwrap();
        match points.get_mut(path) {
            Some(point) => {
                point.arrival_count += 1;
                if point.value != value {
                    point.value = value;
                    point.last_change_count = point.arrival_count;
                }
            }
            None => {
                points.insert(
                    path.to_string(),
                    GooseDataPoint {
                        value,
                        arrival_count: 1,
                        last_change_count: 1,
                    },
                );
            }
        }
    }

    /// Read the current value at `path`, if any.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<GooseValue> {
        self.points.read().unwrap().get(path).map(|p| p.value.clone())
    }

    /// Read the full data point (value + counters) at `path`, if any.
    #[must_use]
    pub fn get_point(&self, path: &str) -> Option<GooseDataPoint> {
        self.points.read().unwrap().get(path).cloned()
    }

    /// Number of distinct paths currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.read().unwrap().len()
    }

    /// Whether the map holds no data points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Used only in unit tests and by external callers per the component
    /// API surface's `update_data_point`.
    pub fn update_data_point(&self, path: &str, value: GooseValue) {
        self.write(path, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_get() {
        let map = GooseDataMap::new();
        map.write("X/Ind.stVal", GooseValue::Bool(true));
        assert_eq!(map.get("X/Ind.stVal"), Some(GooseValue::Bool(true)));
    }

    #[test]
    fn test_missing_path_returns_none() {
        let map = GooseDataMap::new();
        assert_eq!(map.get("nope"), None);
    }

    #[test]
    fn test_arrival_count_increments_every_write() {
        let map = GooseDataMap::new();
        map.write("k", GooseValue::Int(1));
        map.write("k", GooseValue::Int(1));
        let point = map.get_point("k").unwrap();
        assert_eq!(point.arrival_count, 2);
        assert_eq!(point.last_change_count, 1);
    }

    #[test]
    fn test_last_change_count_advances_only_on_change() {
        let map = GooseDataMap::new();
        map.write("k", GooseValue::Int(1));
        map.write("k", GooseValue::Int(2));
        let point = map.get_point("k").unwrap();
        assert_eq!(point.arrival_count, 2);
        assert_eq!(point.last_change_count, 2);
    }
}

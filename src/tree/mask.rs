//! Interest masks and the overlap (mask intersection) algorithm.

use serde::de::Error as DeError;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A boolean tree marking which state paths a consumer cares about.
///
/// `Everything` is the terminal "include all below" marker (the literal
/// `true` in the JSON form); `Fields` narrows interest to the named keys.
/// Keys absent from a `Fields` node are of no interest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InterestMask {
    Everything,
    Fields(BTreeMap<String, InterestMask>),
}

impl InterestMask {
    /// A mask matching the named top-level fields, whole subtrees included.
    pub fn fields<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        InterestMask::Fields(
            keys.into_iter()
                .map(|key| (key.into(), InterestMask::Everything))
                .collect(),
        )
    }

    /// Build a mask from its JSON form: `true` marks a whole subtree,
    /// nested objects narrow further. `false` and non-mask leaves are
    /// dropped (absence and `false` mean the same thing).
    ///
    /// Returns `None` when the value is not a mask at all.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(true) => Some(InterestMask::Everything),
            Value::Object(fields) => Some(InterestMask::Fields(
                fields
                    .iter()
                    .filter_map(|(key, nested)| {
                        Self::from_value(nested).map(|mask| (key.clone(), mask))
                    })
                    .collect(),
            )),
            _ => None,
        }
    }
}

impl Serialize for InterestMask {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            InterestMask::Everything => serializer.serialize_bool(true),
            InterestMask::Fields(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (key, nested) in fields {
                    map.serialize_entry(key, nested)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for InterestMask {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        InterestMask::from_value(&value)
            .ok_or_else(|| D::Error::custom("expected `true` or an object of masks"))
    }
}

/// Project `primary` through `mask`, keeping only the paths of interest.
///
/// `None` means "interested in everything" and returns `primary` verbatim,
/// as does the terminal `Everything` marker. Under a `Fields` mask, a key
/// survives when the mask marks its whole subtree, or when both sides are
/// objects and the recursive overlap is non-empty. The result may be an
/// empty object; callers read emptiness as "no overlap".
pub fn overlap(primary: &Value, mask: Option<&InterestMask>) -> Value {
    let fields = match mask {
        None | Some(InterestMask::Everything) => return primary.clone(),
        Some(InterestMask::Fields(fields)) => fields,
    };

    let entries = match primary.as_object() {
        Some(entries) => entries,
        None => return Value::Object(Map::new()),
    };

    let mut result = Map::new();
    for (key, value) in entries {
        match fields.get(key) {
            Some(InterestMask::Everything) => {
                result.insert(key.clone(), value.clone());
            }
            Some(nested @ InterestMask::Fields(_)) if value.is_object() => {
                let inner = overlap(value, Some(nested));
                if inner.as_object().map_or(false, |m| !m.is_empty()) {
                    result.insert(key.clone(), inner);
                }
            }
            _ => {}
        }
    }
    Value::Object(result)
}

/// Whether a patch touches any path the mask cares about.
///
/// A listener with no mask (`None`) matches every change.
pub fn should_update(mask: Option<&InterestMask>, changes: &Value) -> bool {
    match mask {
        None => true,
        Some(mask) => match overlap(changes, Some(mask)) {
            Value::Object(fields) => !fields.is_empty(),
            _ => false,
        },
    }
}

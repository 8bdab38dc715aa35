//! Device categories

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::StateError;

/// The fixed set of device kinds.
///
/// On the wire a category is the string `"1"` to `"4"`; bare integers are
/// accepted on input because older clients send them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Display,
    Computer,
    Light,
    Projector,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Display,
        Category::Computer,
        Category::Light,
        Category::Projector,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Category::Display => "1",
            Category::Computer => "2",
            Category::Light => "3",
            Category::Projector => "4",
        }
    }

    /// Whether listings carry a live `state` for this category.
    pub fn has_live_state(&self) -> bool {
        matches!(self, Category::Display)
    }

    /// Whether power commands make a hardware round-trip over MDC.
    pub fn uses_mdc(&self) -> bool {
        matches!(self, Category::Display | Category::Projector)
    }
}

impl FromStr for Category {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(Category::Display),
            "2" => Ok(Category::Computer),
            "3" => Ok(Category::Light),
            "4" => Ok(Category::Projector),
            _ => Err(StateError::Validation(
                "Category needs to be 1, 2, 3 or 4".to_string(),
            )),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        let code = match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s,
            Raw::Number(n) => n.to_string(),
        };
        code.parse().map_err(serde::de::Error::custom)
    }
}

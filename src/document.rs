use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Fields every player document must carry.
const REQUIRED_FIELDS: [&str; 3] = ["name", "tag", "expLevel"];

/// Decoded body of the players endpoint, kept as the server sent it.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(transparent)]
pub struct PlayerDocument(Map<String, Value>);

impl PlayerDocument {
    /// Checks that `value` is an object carrying at least `name`, `tag` and
    /// `expLevel`.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(Error::shape("$", "JSON object"));
        };
        for field in REQUIRED_FIELDS {
            if !map.contains_key(field) {
                return Err(Error::shape(field, "required field"));
            }
        }
        Ok(Self(map))
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    fn require(&self, field: &str, expected: &'static str) -> Result<&Value> {
        self.0.get(field).ok_or_else(|| Error::shape(field, expected))
    }

    pub(crate) fn str_field(&self, field: &str) -> Result<&str> {
        self.require(field, "string")?
            .as_str()
            .ok_or_else(|| Error::shape(field, "string"))
    }

    pub(crate) fn u32_field(&self, field: &str) -> Result<u32> {
        self.require(field, "integer")?
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| Error::shape(field, "integer"))
    }

    pub(crate) fn array_field(&self, field: &str) -> Result<&[Value]> {
        self.require(field, "array")?
            .as_array()
            .map(Vec::as_slice)
            .ok_or_else(|| Error::shape(field, "array"))
    }

    /// Deserializes the object at `field` into `T`.
    pub(crate) fn typed_field<T: serde::de::DeserializeOwned>(
        &self,
        field: &str,
        expected: &'static str,
    ) -> Result<T> {
        let value = self.require(field, expected)?;
        serde_json::from_value(value.clone()).map_err(|_| Error::shape(field, expected))
    }
}

impl TryFrom<Value> for PlayerDocument {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

/// One entry of the `troops`, `spells` or `heroes` arrays.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnitEntry {
    pub(crate) name: String,
    pub(crate) level: u32,
    pub(crate) max_level: u32,
    /// API: "home" or "builderBase"
    pub(crate) village: String,
    /// Whatever else the server sent for this unit.
    #[serde(flatten)]
    pub(crate) extra: Map<String, Value>,
}

impl UnitEntry {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn level(&self) -> u32 {
        self.level
    }
    pub fn max_level(&self) -> u32 {
        self.max_level
    }
    pub fn village(&self) -> &str {
        &self.village
    }
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}

/// The clan a player belongs to.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Clan {
    pub(crate) tag: String,
    pub(crate) name: String,
    pub(crate) clan_level: u32,
    pub(crate) badge_urls: BadgeUrls,
}

impl Clan {
    pub fn tag(&self) -> &str {
        &self.tag
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn level(&self) -> u32 {
        self.clan_level
    }
    pub fn badge_urls(&self) -> &BadgeUrls {
        &self.badge_urls
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct BadgeUrls {
    pub small: String,
    pub medium: String,
    pub large: String,
}

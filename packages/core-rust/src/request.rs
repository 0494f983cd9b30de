//! The `request` payload of an inbound RMI message.

use std::collections::BTreeMap;
use std::fmt;

use rmpv::Value;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// Named call: which class to construct, which method to invoke, and with what.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub classname: String,
    pub method: String,
    pub args: Vec<Value>,
    #[serde(deserialize_with = "deserialize_unique_keywords")]
    pub kws: BTreeMap<String, Value>,
    /// Constructor arguments. Absent or null means no-argument construction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cntr: Option<Constructor>,
}

impl Request {
    #[must_use]
    pub fn new(classname: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            classname: classname.into(),
            method: method.into(),
            args: Vec::new(),
            kws: BTreeMap::new(),
            cntr: None,
        }
    }

    /// `Class.method`, for logs and traces.
    #[must_use]
    pub fn target(&self) -> String {
        format!("{}.{}", self.classname, self.method)
    }
}

/// `[[positional...], {keyword: value}]` constructor arguments.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Constructor(
    pub Vec<Value>,
    #[serde(deserialize_with = "deserialize_unique_keywords")] pub BTreeMap<String, Value>,
);

/// Keyword mappings must not repeat a key; a plain map decode would keep the last one.
fn deserialize_unique_keywords<'de, D>(deserializer: D) -> Result<BTreeMap<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    struct UniqueKeywords;

    impl<'de> Visitor<'de> for UniqueKeywords {
        type Value = BTreeMap<String, rmpv::Value>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a mapping with unique string keys")
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut keywords = BTreeMap::new();
            while let Some((key, value)) = access.next_entry::<String, rmpv::Value>()? {
                if keywords.contains_key(&key) {
                    return Err(de::Error::custom(format_args!("duplicate keyword {key:?}")));
                }
                keywords.insert(key, value);
            }
            Ok(keywords)
        }
    }

    deserializer.deserialize_map(UniqueKeywords)
}

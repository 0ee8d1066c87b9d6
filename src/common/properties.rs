use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// A domain discovered in a zone file plus four keyed maps of dynamically named
/// attributes. Attribute keys are disjoint across the type buckets by
/// convention; the serialized form is a flat JSON object with the single
/// reserved key `domainName` and every attribute hoisted to the top level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomainProperties {
    pub domain_name: String,
    pub string_properties: BTreeMap<String, String>,
    pub int_properties: BTreeMap<String, i64>,
    pub float_properties: BTreeMap<String, f64>,
    pub bool_properties: BTreeMap<String, bool>,
}

impl DomainProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_json_string(&self) -> anyhow::Result<String> {
        // A BTreeMap keeps the serialized key order stable across runs, which
        // the tests and any downstream diffing rely on.
        let mut object: BTreeMap<&str, Value> = BTreeMap::new();
        object.insert("domainName", Value::String(self.domain_name.clone()));

        for (key, value) in &self.string_properties {
            object.insert(key, Value::String(value.clone()));
        }
        for (key, value) in &self.int_properties {
            object.insert(key, Value::Number((*value).into()));
        }
        for (key, value) in &self.float_properties {
            if let Some(number) = Number::from_f64(*value) {
                object.insert(key, Value::Number(number));
            }
        }
        for (key, value) in &self.bool_properties {
            object.insert(key, Value::Bool(*value));
        }

        Ok(serde_json::to_string(&object)?)
    }

    /// Parses the flat JSON form. The bucket of each attribute is inferred from
    /// its JSON type; numbers that are exactly integral land in the int bucket.
    /// Attributes of unknown JSON types are silently dropped.
    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let object: Map<String, Value> = serde_json::from_str(raw)?;

        let domain_name = object
            .get("domainName")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("record is missing the domainName key"))?
            .to_string();

        let mut properties = Self {
            domain_name,
            ..Self::default()
        };

        for (key, value) in object {
            if key == "domainName" {
                continue;
            }

            match value {
                Value::String(text) => {
                    properties.string_properties.insert(key, text);
                }
                Value::Bool(flag) => {
                    properties.bool_properties.insert(key, flag);
                }
                Value::Number(number) => {
                    if let Some(int_value) = number.as_i64() {
                        properties.int_properties.insert(key, int_value);
                    } else if let Some(float_value) = number.as_f64() {
                        if float_value.fract() == 0.0
                            && float_value >= i64::MIN as f64
                            && float_value <= i64::MAX as f64
                        {
                            properties.int_properties.insert(key, float_value as i64);
                        } else {
                            properties.float_properties.insert(key, float_value);
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(properties)
    }
}

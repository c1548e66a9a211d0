//! Composable validation rules for untrusted JSON input.
//!
//! A [`RuleMap`] declares, per field, either a list of [`Rule`]s or a nested
//! map for sub-objects and arrays of sub-objects. Validation runs every rule,
//! collects every failure, and either hands the record back untouched or fails
//! with a [`ValidationError`] carrying the full per-field map.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::Result;

type Check = dyn Fn(&Value) -> std::result::Result<(), String> + Send + Sync;

/// Single check over a candidate value. Missing fields are checked as `null`.
#[derive(Clone)]
pub struct Rule(Arc<Check>);

impl Rule {
    /// Wraps a check function
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&Value) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        Self(Arc::new(check))
    }

    /// Runs the rule, returning the failure message if it does not hold
    ///
    /// # Errors
    /// Returns the rule's failure message.
    pub fn check(&self, value: &Value) -> std::result::Result<(), String> {
        (self.0)(value)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Rule")
    }
}

/// What a field is checked with
#[derive(Clone, Debug)]
pub enum FieldRules {
    /// Plain rules, run in declaration order
    Checks(Vec<Rule>),
    /// The field is an object validated by a nested map
    Object(RuleMap),
    /// The field is an array, every element validated by a nested map
    Array(RuleMap),
}

/// Errors of one field: either its failure messages or the errors of its children
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldErrors {
    /// Failure messages in rule declaration order
    Messages(Vec<String>),
    /// Errors of an object's fields, or of an array's elements keyed by index
    Nested(ErrorMap),
}

/// Failing field name to its errors. Fields without failures are absent.
pub type ErrorMap = BTreeMap<String, FieldErrors>;

/// Structured validation failure
#[derive(Clone, Debug, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
    map: ErrorMap,
}

impl ValidationError {
    /// Builds the error and its human readable summary from the field map
    #[must_use]
    pub fn new(map: ErrorMap) -> Self {
        let mut parts = Vec::new();
        summarize("", &map, &mut parts);
        Self {
            message: parts.join("; "),
            map,
        }
    }

    /// Full per-field error map
    #[must_use]
    pub fn map(&self) -> &ErrorMap {
        &self.map
    }

    /// Messages of a top level field, if it failed with plain rules
    #[must_use]
    pub fn messages(&self, field: &str) -> Option<&[String]> {
        match self.map.get(field) {
            Some(FieldErrors::Messages(messages)) => Some(messages),
            _ => None,
        }
    }
}

fn summarize(prefix: &str, map: &ErrorMap, parts: &mut Vec<String>) {
    for (field, errors) in map {
        let path = if prefix.is_empty() {
            field.clone()
        } else {
            format!("{prefix}.{field}")
        };
        match errors {
            FieldErrors::Messages(messages) => parts.push(format!("{path}: {}", messages.join(", "))),
            FieldErrors::Nested(nested) => summarize(&path, nested, parts),
        }
    }
}

/// Ordered field declarations for an object
#[derive(Clone, Debug, Default)]
pub struct RuleMap {
    fields: Vec<(String, FieldRules)>,
}

impl RuleMap {
    /// Empty map, accepts anything
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares plain rules for a field
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.fields
            .push((name.into(), FieldRules::Checks(rules.into_iter().collect())));
        self
    }

    /// Declares a nested object field
    #[must_use]
    pub fn object(mut self, name: impl Into<String>, rules: RuleMap) -> Self {
        self.fields.push((name.into(), FieldRules::Object(rules)));
        self
    }

    /// Declares an array field whose elements are objects
    #[must_use]
    pub fn array(mut self, name: impl Into<String>, rules: RuleMap) -> Self {
        self.fields.push((name.into(), FieldRules::Array(rules)));
        self
    }

    /// Collects every failure of `record`, empty when it is valid
    #[must_use]
    pub fn errors(&self, record: &Value) -> ErrorMap {
        self.fields
            .iter()
            .filter_map(|(name, rules)| {
                let value = record.get(name.as_str()).unwrap_or(&Value::Null);
                evaluate(rules, value).map(|errors| (name.clone(), errors))
            })
            .collect()
    }

    /// Returns `record` unchanged when every rule holds
    ///
    /// # Errors
    /// Returns a [`ValidationError`] listing every failing field.
    pub fn validate(&self, record: Value) -> Result<Value, ValidationError> {
        let map = self.errors(&record);
        if map.is_empty() {
            Ok(record)
        } else {
            Err(ValidationError::new(map))
        }
    }

    /// Validates `record`, then deserializes it into its typed form
    ///
    /// # Errors
    /// Returns [`crate::Error::Validation`] for rule failures, and
    /// [`crate::Error::SerializationError`] if the rules let through a shape
    /// `T` cannot represent.
    pub fn parse<T: DeserializeOwned>(&self, record: Value) -> Result<T> {
        let record = self.validate(record)?;
        Ok(serde_json::from_value(record)?)
    }
}

fn evaluate(rules: &FieldRules, value: &Value) -> Option<FieldErrors> {
    match rules {
        FieldRules::Checks(rules) => {
            let messages: Vec<String> = rules.iter().filter_map(|r| r.check(value).err()).collect();
            (!messages.is_empty()).then_some(FieldErrors::Messages(messages))
        }
        FieldRules::Object(map) => {
            let errors = map.errors(value);
            (!errors.is_empty()).then_some(FieldErrors::Nested(errors))
        }
        FieldRules::Array(map) => {
            let Some(items) = value.as_array() else {
                return Some(FieldErrors::Messages(vec!["is not an array".into()]));
            };
            let errors: ErrorMap = items
                .iter()
                .enumerate()
                .filter_map(|(index, item)| {
                    let errors = map.errors(item);
                    (!errors.is_empty()).then(|| (index.to_string(), FieldErrors::Nested(errors)))
                })
                .collect();
            (!errors.is_empty()).then_some(FieldErrors::Nested(errors))
        }
    }
}

/// Required string
#[must_use]
pub fn string() -> Rule {
    Rule::new(|v| match v {
        Value::String(_) => Ok(()),
        Value::Null => Err("is required".into()),
        _ => Err("is not a string".into()),
    })
}

/// Absent or a string
#[must_use]
pub fn optional_string() -> Rule {
    Rule::new(|v| match v {
        Value::String(_) | Value::Null => Ok(()),
        _ => Err("is not a string".into()),
    })
}

/// Strings of at least `min` characters, other values pass
#[must_use]
pub fn min_len(min: usize) -> Rule {
    Rule::new(move |v| match v.as_str() {
        Some(s) if s.chars().count() < min => Err("too short".into()),
        _ => Ok(()),
    })
}

/// Strings of at most `max` characters, other values pass
#[must_use]
pub fn max_len(max: usize) -> Rule {
    Rule::new(move |v| match v.as_str() {
        Some(s) if s.chars().count() > max => Err("too long".into()),
        _ => Ok(()),
    })
}

/// Strings matching `pattern`, other values pass
#[must_use]
pub fn matches(pattern: &'static LazyLock<Regex>, message: &'static str) -> Rule {
    Rule::new(move |v| match v.as_str() {
        Some(s) if !pattern.is_match(s) => Err(message.into()),
        _ => Ok(()),
    })
}

/// Required integer within `range`
#[must_use]
pub fn integer_in(range: RangeInclusive<i64>) -> Rule {
    Rule::new(move |v| match v {
        Value::Null => Err("is required".into()),
        Value::Number(n) => match n.as_i64() {
            Some(n) if range.contains(&n) => Ok(()),
            Some(_) => Err(format!(
                "must be between {} and {}",
                range.start(),
                range.end()
            )),
            None => Err("invalid type".into()),
        },
        _ => Err("invalid type".into()),
    })
}

/// Strings that compile as a regular expression
#[must_use]
pub fn is_regex() -> Rule {
    Rule::new(|v| match v {
        Value::String(s) => Regex::new(s).map(|_| ()).map_err(|e| e.to_string()),
        Value::Null => Err("is required".into()),
        _ => Err("is not a string".into()),
    })
}

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        #[allow(clippy::expect_used)]
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($re).expect("static pattern compiles"));
    };
}

pattern!(DNS_1035_LABEL, r"^[a-z]([-a-z0-9]*[a-z0-9])?$");
pattern!(
    DNS_NAME,
    r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$"
);
pattern!(USER, r"^[A-Za-z0-9_-]{3,}$");
pattern!(LABEL_VALUE, r"^[A-Za-z0-9]([A-Za-z0-9_-]*[A-Za-z0-9])?$");
pattern!(NO_WHITESPACE, r"^\S+$");

/// Rules for the App name. It names the service too, so it must be a
/// DNS-1035 label with room for the `-cert` suffix.
#[must_use]
pub fn name() -> Vec<Rule> {
    vec![
        string(),
        min_len(4),
        max_len(58),
        matches(
            &DNS_1035_LABEL,
            "must be a lowercase DNS label starting with a letter",
        ),
    ]
}

/// Rules for the owner identifier, shared by the request body and the `user` header
#[must_use]
pub fn user() -> Vec<Rule> {
    vec![
        string(),
        matches(&USER, "invalid"),
        matches(&LABEL_VALUE, "must start and end with a letter or digit"),
        max_len(63),
    ]
}

/// Rules for an App creation request. Everything that ends up in object
/// names or label values is constrained to what Kubernetes accepts.
#[must_use]
pub fn app_request() -> RuleMap {
    RuleMap::new()
        .field("name", name())
        .field(
            "image",
            [
                string(),
                min_len(4),
                matches(&NO_WHITESPACE, "must not contain whitespace"),
            ],
        )
        .field(
            "host",
            [
                string(),
                min_len(11),
                max_len(63),
                matches(&DNS_NAME, "must be a lowercase DNS name"),
            ],
        )
        .field("user", user())
        .field("port", [integer_in(1..=65535)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use deploycat_model::AppRequest;
    use serde_json::json;

    fn valid_request() -> Value {
        json!({
            "name": "whoami",
            "image": "traefik/whoami",
            "host": "whoami.example.com",
            "user": "alice",
            "port": 80,
        })
    }

    #[test]
    fn valid_record_is_returned_unchanged() {
        let record = json!({
            "name": "whoami",
            "image": "traefik/whoami",
            "host": "whoami.example.com",
            "user": "alice",
            "port": 80,
            "extra": {"kept": true},
        });

        let validated = app_request().validate(record.clone()).unwrap();

        assert_eq!(validated, record);
    }

    #[test]
    fn parse_yields_typed_request() {
        let request: AppRequest = app_request().parse(valid_request()).unwrap();

        assert_eq!(request.name, "whoami");
        assert_eq!(request.port, 80);
    }

    #[test]
    fn error_map_lists_exactly_the_failing_fields() {
        let mut record = valid_request();
        record["name"] = json!("Ab");
        record["port"] = json!("80");
        record.as_object_mut().unwrap().remove("user");

        let err = app_request().validate(record).unwrap_err();

        assert_eq!(
            err.map().keys().collect::<Vec<_>>(),
            vec!["name", "port", "user"]
        );
        assert_eq!(
            err.messages("name").unwrap(),
            ["too short", "must be a lowercase DNS label starting with a letter"]
        );
        assert_eq!(err.messages("port").unwrap(), ["invalid type"]);
        assert_eq!(err.messages("user").unwrap(), ["is required"]);
    }

    #[test]
    fn messages_keep_rule_declaration_order() {
        let rules = RuleMap::new().field(
            "value",
            [
                Rule::new(|_| Err("first".into())),
                Rule::new(|_| Ok(())),
                Rule::new(|_| Err("second".into())),
            ],
        );

        let err = rules.validate(json!({"value": 1})).unwrap_err();

        assert_eq!(err.messages("value").unwrap(), ["first", "second"]);
        assert_eq!(err.to_string(), "value: first, second");
    }

    #[test]
    fn name_must_start_with_a_letter() {
        let mut record = valid_request();
        record["name"] = json!("1234app");

        let err = app_request().validate(record).unwrap_err();

        assert_eq!(
            err.messages("name").unwrap(),
            ["must be a lowercase DNS label starting with a letter"]
        );
        assert!(err.messages("image").is_none());
    }

    #[test]
    fn user_rejects_unicode_and_label_unsafe_values() {
        let rules = RuleMap::new().field("user", user());

        assert!(rules.validate(json!({"user": "bob_smith"})).is_ok());
        assert!(rules.validate(json!({"user": "ab"})).is_err());
        assert!(rules.validate(json!({"user": "jürgen"})).is_err());
        assert!(rules.validate(json!({"user": "_alice"})).is_err());
    }

    #[test]
    fn port_range_is_enforced() {
        let mut record = valid_request();
        record["port"] = json!(70000);

        let err = app_request().validate(record).unwrap_err();

        assert_eq!(
            err.messages("port").unwrap(),
            ["must be between 1 and 65535"]
        );
    }

    #[test]
    fn array_rule_reports_per_index_nested_errors() {
        let rules = RuleMap::new().array(
            "items",
            RuleMap::new()
                .field("pattern", [is_regex()])
                .object("meta", RuleMap::new().field("label", [optional_string()])),
        );
        let record = json!({
            "items": [
                {"pattern": "ok.*"},
                {"pattern": "(", "meta": {"label": 3}},
            ]
        });

        let err = rules.validate(record).unwrap_err();

        let FieldErrors::Nested(items) = &err.map()["items"] else {
            panic!("expected nested errors");
        };
        assert_eq!(items.keys().collect::<Vec<_>>(), vec!["1"]);
        let FieldErrors::Nested(second) = &items["1"] else {
            panic!("expected nested errors");
        };
        assert!(matches!(&second["pattern"], FieldErrors::Messages(m) if m.len() == 1));
        assert_eq!(
            second["meta"],
            FieldErrors::Nested(ErrorMap::from([(
                "label".to_string(),
                FieldErrors::Messages(vec!["is not a string".into()])
            )]))
        );
        assert!(err.to_string().contains("items.1.meta.label: is not a string"));
    }

    #[test]
    fn array_rule_rejects_non_arrays() {
        let rules = RuleMap::new().array("items", RuleMap::new());

        let err = rules.validate(json!({"items": {}})).unwrap_err();

        assert_eq!(err.messages("items").unwrap(), ["is not an array"]);
    }

    #[test]
    fn error_map_serializes_as_plain_json() {
        let err = app_request()
            .validate(json!({"name": "whoami", "image": "traefik/whoami", "host": "whoami.example.com", "user": "alice"}))
            .unwrap_err();

        assert_eq!(
            serde_json::to_value(err.map()).unwrap(),
            json!({"port": ["is required"]})
        );
    }
}

//! Choices returned from autocomplete handlers

use serenity::builder::CreateAutocompleteResponse;

/// A single completion list entry
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Completion {
    /// The friendly name of this entry
    pub name: String,
    /// The value to be completed by this entry
    pub value: CompletionValue,
}

impl Completion {
    /// Construct a new completion entry
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<CompletionValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Construct a string completion whose name and value are the same
    #[inline]
    #[must_use]
    pub fn plain(s: impl Into<String>) -> Self {
        let s = s.into();
        Self {
            value: CompletionValue::String(s.clone()),
            name: s,
        }
    }
}

/// An enum of possible completion value types
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum CompletionValue {
    /// An integer value
    Int(i64),
    /// A string value
    String(String),
    /// A real (decimal) numeric value
    Real(f64),
}

impl From<i64> for CompletionValue {
    fn from(value: i64) -> Self { Self::Int(value) }
}

impl From<String> for CompletionValue {
    fn from(value: String) -> Self { Self::String(value) }
}

impl From<&str> for CompletionValue {
    fn from(value: &str) -> Self { Self::String(value.into()) }
}

impl From<f64> for CompletionValue {
    fn from(value: f64) -> Self { Self::Real(value) }
}

pub(crate) fn build(choices: Vec<Completion>) -> CreateAutocompleteResponse {
    choices
        .into_iter()
        .fold(CreateAutocompleteResponse::new(), |b, Completion { name, value }| {
            match value {
                CompletionValue::Int(i) => b.add_int_choice(name, i),
                CompletionValue::String(s) => b.add_string_choice(name, s),
                CompletionValue::Real(r) => b.add_number_choice(name, r),
            }
        })
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::Completion;

    #[test]
    fn serializes_untagged() {
        let choices = [
            Completion::plain("foo"),
            Completion::new("bar", 1_i64),
            Completion::new("baz", 1.5_f64),
        ];

        assert_eq!(
            serde_json::to_value(choices).unwrap(),
            json!([
                { "name": "foo", "value": "foo" },
                { "name": "bar", "value": 1 },
                { "name": "baz", "value": 1.5 },
            ])
        );
    }
}

use std::collections::BTreeMap;

use super::record::{Categorical, FeatureRecord, Island, NUMERIC_FIELDS, Sex};

/// Column name to value mapping for a single request.
///
/// Indicator columns for categories the record does not have are absent and
/// therefore implicitly zero. Each column remembers the record field it came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedVector {
    values: BTreeMap<String, Encoded>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Encoded {
    pub(crate) value: f32,
    pub(crate) field: &'static str,
    /// Set for indicator columns.
    pub(crate) category: Option<&'static str>,
}

impl EncodedVector {
    pub fn get(&self, column: &str) -> Option<f32> {
        self.values.get(column).map(|entry| entry.value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.values
            .iter()
            .map(|(name, entry)| (name.as_str(), entry.value))
    }

    /// Record field that produced `column`.
    pub fn field_of(&self, column: &str) -> Option<&'static str> {
        self.values.get(column).map(|entry| entry.field)
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&str, &Encoded)> {
        self.values.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    fn insert_numeric(&mut self, field: &'static str, value: f32) {
        let entry = Encoded {
            value,
            field,
            category: None,
        };
        self.values.insert(field.to_string(), entry);
    }

    fn insert_indicator<C: Categorical>(&mut self, value: C) {
        let entry = Encoded {
            value: 1.0,
            field: C::FIELD,
            category: Some(value.as_str()),
        };
        self.values.insert(value.indicator_column(), entry);
    }
}

/// One-hot encode a record.
pub fn encode(record: &FeatureRecord) -> EncodedVector {
    let mut encoded = EncodedVector::default();
    for (name, value) in record.numeric_values() {
        encoded.insert_numeric(name, value);
    }
    encoded.insert_indicator(record.sex);
    encoded.insert_indicator(record.island);
    encoded
}

/// Every indicator column a categorical field can produce, in vocabulary order.
pub fn indicator_columns<C: Categorical>() -> Vec<String> {
    C::VALUES.iter().map(|value| value.indicator_column()).collect()
}

/// Every column any valid record can produce: numeric fields, then indicators.
pub fn vocabulary_columns() -> Vec<String> {
    NUMERIC_FIELDS
        .iter()
        .map(|name| name.to_string())
        .chain(indicator_columns::<Sex>())
        .chain(indicator_columns::<Island>())
        .collect()
}

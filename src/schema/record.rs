use serde::{Deserialize, Serialize};

/// Names of the continuous and integer fields, in the order training emits them.
pub const NUMERIC_FIELDS: [&str; 5] = [
    "bill_length_mm",
    "bill_depth_mm",
    "flipper_length_mm",
    "body_mass_g",
    "year",
];

/// A categorical field with a closed vocabulary.
///
/// The indicator column for a value is `<FIELD>_<value>`, matching the column
/// names the training pipeline's one-hot expansion produces.
pub trait Categorical: Copy + Sized + 'static {
    /// Record field name, also the indicator column prefix.
    const FIELD: &'static str;
    /// Every member of the vocabulary.
    const VALUES: &'static [Self];

    /// Wire representation of the value.
    fn as_str(self) -> &'static str;

    /// Parse a wire value, returning `None` when it is outside the vocabulary.
    fn parse(value: &str) -> Option<Self> {
        Self::VALUES
            .iter()
            .copied()
            .find(|candidate| candidate.as_str() == value)
    }

    /// Indicator column name for this value.
    fn indicator_column(self) -> String {
        format!("{}_{}", Self::FIELD, self.as_str())
    }
}

/// Sex as recorded in the request body, lowercase on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "male")]
    Male,
    #[serde(rename = "female")]
    Female,
}

impl Categorical for Sex {
    const FIELD: &'static str = "sex";
    const VALUES: &'static [Self] = &[Sex::Male, Sex::Female];

    fn as_str(self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
        }
    }
}

/// Palmer Archipelago island where the penguin was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Island {
    Torgersen,
    Biscoe,
    Dream,
}

impl Categorical for Island {
    const FIELD: &'static str = "island";
    const VALUES: &'static [Self] = &[Island::Torgersen, Island::Biscoe, Island::Dream];

    fn as_str(self) -> &'static str {
        match self {
            Island::Torgersen => "Torgersen",
            Island::Biscoe => "Biscoe",
            Island::Dream => "Dream",
        }
    }
}

/// One validated observation.
///
/// Categorical fields are closed enums, so a record that exists is already
/// within the vocabulary. Presence and type checks happen in the request layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub bill_length_mm: f64,
    pub bill_depth_mm: f64,
    pub flipper_length_mm: f64,
    pub body_mass_g: f64,
    pub year: i64,
    pub sex: Sex,
    pub island: Island,
}

impl FeatureRecord {
    /// Numeric fields paired with their column names, in [`NUMERIC_FIELDS`] order.
    pub fn numeric_values(&self) -> [(&'static str, f32); 5] {
        [
            (NUMERIC_FIELDS[0], self.bill_length_mm as f32),
            (NUMERIC_FIELDS[1], self.bill_depth_mm as f32),
            (NUMERIC_FIELDS[2], self.flipper_length_mm as f32),
            (NUMERIC_FIELDS[3], self.body_mass_g as f32),
            (NUMERIC_FIELDS[4], self.year as f32),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_sensitive() {
        assert_eq!(Sex::parse("male"), Some(Sex::Male));
        assert_eq!(Sex::parse("Male"), None);
        assert_eq!(Island::parse("Dream"), Some(Island::Dream));
        assert_eq!(Island::parse("dream"), None);
        assert_eq!(Island::parse("Anvers"), None);
    }

    #[test]
    fn serde_names_match_wire_values() {
        for sex in Sex::VALUES {
            let json = serde_json::to_string(sex).unwrap();
            assert_eq!(json, format!("\"{}\"", sex.as_str()));
        }
        for island in Island::VALUES {
            let json = serde_json::to_string(island).unwrap();
            assert_eq!(json, format!("\"{}\"", island.as_str()));
        }
    }

    #[test]
    fn indicator_columns_use_field_prefix() {
        assert_eq!(Sex::Female.indicator_column(), "sex_female");
        assert_eq!(Island::Torgersen.indicator_column(), "island_Torgersen");
    }
}

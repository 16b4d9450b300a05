use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed set of fields read off a student ID card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    /// Student identification number (MSSV).
    Mssv,
    Name,
    /// Date of birth.
    Dob,
    Major,
    /// Enrollment period, e.g. `2020-2024`.
    Course,
}

impl FieldName {
    pub const ALL: [FieldName; 5] = [
        FieldName::Mssv,
        FieldName::Name,
        FieldName::Dob,
        FieldName::Major,
        FieldName::Course,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FieldName::Mssv => "mssv",
            FieldName::Name => "name",
            FieldName::Dob => "dob",
            FieldName::Major => "major",
            FieldName::Course => "course",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of field extraction. Every field is always present; `None` marks a
/// field the extractor could not find.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSet {
    pub mssv: Option<String>,
    pub name: Option<String>,
    pub dob: Option<String>,
    pub major: Option<String>,
    pub course: Option<String>,
}

impl FieldSet {
    pub fn get(&self, field: FieldName) -> Option<&str> {
        match field {
            FieldName::Mssv => self.mssv.as_deref(),
            FieldName::Name => self.name.as_deref(),
            FieldName::Dob => self.dob.as_deref(),
            FieldName::Major => self.major.as_deref(),
            FieldName::Course => self.course.as_deref(),
        }
    }

    /// Missing fields, in canonical field order.
    pub fn missing(&self) -> Vec<FieldName> {
        FieldName::ALL
            .into_iter()
            .filter(|f| self.get(*f).is_none())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        FieldName::ALL.iter().all(|f| self.get(*f).is_some())
    }

    /// Converts into a [`StudentCard`], or returns every missing field.
    pub fn into_card(self) -> Result<StudentCard, Vec<FieldName>> {
        match self {
            FieldSet {
                mssv: Some(mssv),
                name: Some(name),
                dob: Some(dob),
                major: Some(major),
                course: Some(course),
            } => Ok(StudentCard { mssv, name, dob, major, course }),
            incomplete => Err(incomplete.missing()),
        }
    }
}

/// A fully populated field set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentCard {
    pub mssv: String,
    pub name: String,
    pub dob: String,
    pub major: String,
    pub course: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> FieldSet {
        FieldSet {
            mssv: Some("1234567890".into()),
            name: Some("Nguyen Van A".into()),
            dob: Some("01-01-2000".into()),
            major: Some("Công nghệ thông tin".into()),
            course: Some("2020-2024".into()),
        }
    }

    #[test]
    fn field_names_display_as_wire_keys() {
        for f in FieldName::ALL {
            assert_eq!(f.to_string(), f.as_str());
            assert_eq!(serde_json::to_string(&f).unwrap(), format!("\"{}\"", f.as_str()));
        }
    }

    #[test]
    fn default_field_set_misses_everything() {
        let set = FieldSet::default();
        assert!(!set.is_complete());
        assert_eq!(set.missing(), FieldName::ALL.to_vec());
    }

    #[test]
    fn missing_keeps_canonical_order() {
        let set = FieldSet { name: None, course: None, ..full() };
        assert_eq!(set.missing(), vec![FieldName::Name, FieldName::Course]);
    }

    #[test]
    fn into_card_requires_all_fields() {
        let card = full().into_card().unwrap();
        assert_eq!(card.mssv, "1234567890");
        assert_eq!(card.major, "Công nghệ thông tin");

        let err = FieldSet { major: None, ..full() }.into_card().unwrap_err();
        assert_eq!(err, vec![FieldName::Major]);
    }

    #[test]
    fn card_serializes_with_wire_keys() {
        let json = serde_json::to_value(full().into_card().unwrap()).unwrap();
        for key in ["mssv", "name", "dob", "major", "course"] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
    }
}

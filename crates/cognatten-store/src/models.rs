use serde::{Deserialize, Serialize};

/// A roster entry. Free-text fields mirror the registration form; only
/// the id and name are required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub faculty: String,
    /// Date of birth, `yyyy-mm-dd` free text.
    #[serde(default)]
    pub dob: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: String,
}

/// An attendance row joined with the student's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: i64,
    pub student_id: String,
    pub name: String,
    pub date: String,
    pub time: String,
}

/// A freshly inserted attendance mark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewMark {
    pub student_id: String,
    pub name: String,
    pub date: String,
    pub time: String,
}

//! CSV import and export.
//!
//! Column headers are fixed (`ID,Name,Faculty,DOB,Email,Address` for the
//! roster, `ID,Date,Time` for attendance) so exported files round-trip
//! through spreadsheets and back through import unchanged.

use crate::models::{AttendanceRecord, Student};
use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::io;

/// Roster row as it appears on disk.
#[derive(Serialize, Deserialize)]
struct StudentRow {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Faculty", default)]
    faculty: String,
    #[serde(rename = "DOB", default)]
    dob: String,
    #[serde(rename = "Email", default)]
    email: String,
    #[serde(rename = "Address", default)]
    address: String,
}

/// Attendance row as it appears on disk. `ID` is the student id; the
/// database row id is not exported.
#[derive(Serialize, Deserialize)]
pub struct AttendanceRow {
    #[serde(rename = "ID")]
    pub student_id: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Time")]
    pub time: String,
}

pub fn write_students_csv<W: io::Write>(
    writer: W,
    students: &[Student],
) -> Result<(), StoreError> {
    let mut csv = csv::Writer::from_writer(writer);
    for student in students {
        csv.serialize(StudentRow {
            id: student.id.clone(),
            name: student.name.clone(),
            faculty: student.faculty.clone(),
            dob: student.dob.clone(),
            email: student.email.clone(),
            address: student.address.clone(),
        })?;
    }
    csv.flush()?;
    Ok(())
}

pub fn read_students_csv<R: io::Read>(reader: R) -> Result<Vec<Student>, StoreError> {
    let mut csv = csv::Reader::from_reader(reader);
    let mut students = Vec::new();
    for row in csv.deserialize::<StudentRow>() {
        let row = row?;
        students.push(Student {
            id: row.id,
            name: row.name,
            faculty: row.faculty,
            dob: row.dob,
            email: row.email,
            address: row.address,
        });
    }
    Ok(students)
}

pub fn write_attendance_csv<W: io::Write>(
    writer: W,
    records: &[AttendanceRecord],
) -> Result<(), StoreError> {
    let mut csv = csv::Writer::from_writer(writer);
    for record in records {
        csv.serialize(AttendanceRow {
            student_id: record.student_id.clone(),
            date: record.date.clone(),
            time: record.time.clone(),
        })?;
    }
    csv.flush()?;
    Ok(())
}

pub fn read_attendance_csv<R: io::Read>(reader: R) -> Result<Vec<AttendanceRow>, StoreError> {
    let mut csv = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();
    for row in csv.deserialize::<AttendanceRow>() {
        rows.push(row?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_student() -> Student {
        Student {
            id: "81754321".into(),
            name: "Dana Obrist".into(),
            faculty: "Engineering".into(),
            dob: "2001-04-17".into(),
            email: "dana@example.edu".into(),
            address: "12 Hill Rd".into(),
        }
    }

    #[test]
    fn test_students_csv_headers_and_roundtrip() {
        let mut buf = Vec::new();
        write_students_csv(&mut buf, &[sample_student()]).unwrap();

        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("ID,Name,Faculty,DOB,Email,Address\n"));

        let parsed = read_students_csv(buf.as_slice()).unwrap();
        assert_eq!(parsed, vec![sample_student()]);
    }

    #[test]
    fn test_students_csv_missing_optional_columns() {
        let input = "ID,Name\n81700001,Lee Ng\n";
        let parsed = read_students_csv(input.as_bytes()).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].name, "Lee Ng");
        assert_eq!(parsed[0].faculty, "");
    }

    #[test]
    fn test_attendance_csv_headers() {
        let record = AttendanceRecord {
            id: 7,
            student_id: "81754321".into(),
            name: "Dana Obrist".into(),
            date: "2026-02-03".into(),
            time: "09:15:00".into(),
        };
        let mut buf = Vec::new();
        write_attendance_csv(&mut buf, &[record]).unwrap();

        let text = String::from_utf8(buf.clone()).unwrap();
        assert_eq!(text, "ID,Date,Time\n81754321,2026-02-03,09:15:00\n");

        let rows = read_attendance_csv(buf.as_slice()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].student_id, "81754321");
    }
}

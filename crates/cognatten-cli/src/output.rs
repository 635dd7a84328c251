//! Table rendering for roster, attendance, and device listings.

use cognatten_camera::DeviceInfo;
use cognatten_store::{AttendanceRecord, Student};
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct StudentRow {
    id: String,
    name: String,
    faculty: String,
    dob: String,
    email: String,
}

#[derive(Tabled)]
struct AttendanceRow {
    id: i64,
    student: String,
    name: String,
    date: String,
    time: String,
}

#[derive(Tabled)]
struct DeviceRow {
    path: String,
    name: String,
    driver: String,
}

pub fn print_students(students: &[Student]) {
    let rows: Vec<StudentRow> = students
        .iter()
        .map(|s| StudentRow {
            id: s.id.clone(),
            name: s.name.clone(),
            faculty: s.faculty.clone(),
            dob: s.dob.clone(),
            email: s.email.clone(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{table}");
}

pub fn print_attendance(records: &[AttendanceRecord]) {
    let rows: Vec<AttendanceRow> = records
        .iter()
        .map(|r| AttendanceRow {
            id: r.id,
            student: r.student_id.clone(),
            name: r.name.clone(),
            date: r.date.clone(),
            time: r.time.clone(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{table}");
}

pub fn print_devices(devices: &[DeviceInfo]) {
    let rows: Vec<DeviceRow> = devices
        .iter()
        .map(|d| DeviceRow {
            path: d.path.clone(),
            name: d.name.clone(),
            driver: d.driver.clone(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{table}");
}

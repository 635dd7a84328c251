use std::collections::HashSet;
use std::fs::File;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use cognatten_camera::Camera;
use cognatten_core::{identify_frame, FaceDetector, FaceEncoder};
use cognatten_store::{export, PhotoStore, Store, Student};

mod output;
mod settings;

use settings::Settings;

#[derive(Parser)]
#[command(name = "cognatten", about = "Face-recognition attendance CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the student roster
    Student {
        #[command(subcommand)]
        command: StudentCommands,
    },
    /// Inspect and edit attendance records
    Attendance {
        #[command(subcommand)]
        command: AttendanceCommands,
    },
    /// Live attendance loop: recognize faces and mark until Ctrl-C
    Watch {
        /// Camera device path (overrides COGNATTEN_CAMERA_DEVICE)
        #[arg(long)]
        device: Option<String>,
        /// Match tolerance (overrides COGNATTEN_MATCH_TOLERANCE)
        #[arg(long)]
        tolerance: Option<f32>,
    },
    /// List available camera devices
    Devices,
}

#[derive(Subcommand)]
enum StudentCommands {
    /// List all students
    List,
    /// Show one student and their attendance
    Show { id: String },
    /// Register a new student (generates the id)
    Register {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        faculty: String,
        /// Date of birth, yyyy-mm-dd
        #[arg(long, default_value = "")]
        dob: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "")]
        address: String,
        /// Import the face photo from a JPEG file
        #[arg(long, conflicts_with = "capture")]
        photo: Option<PathBuf>,
        /// Take the face photo with the camera
        #[arg(long)]
        capture: bool,
    },
    /// Update a student's details
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        faculty: Option<String>,
        #[arg(long)]
        dob: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        address: Option<String>,
    },
    /// Remove a student, their attendance, and their photo
    Remove { id: String },
}

#[derive(Subcommand)]
enum AttendanceCommands {
    /// List attendance records, newest first
    List {
        /// Only this student's records
        #[arg(long)]
        student: Option<String>,
    },
    /// Delete one attendance record by id
    Remove { id: i64 },
    /// Export records to CSV
    Export {
        /// Attendance CSV output path
        #[arg(long)]
        attendance: Option<PathBuf>,
        /// Roster CSV output path
        #[arg(long)]
        students: Option<PathBuf>,
    },
    /// Import records from CSV (no 12-hour dedup applied)
    Import {
        /// Attendance CSV input path
        #[arg(long)]
        attendance: Option<PathBuf>,
        /// Roster CSV input path
        #[arg(long)]
        students: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env();

    match cli.command {
        Commands::Student { command } => run_student(command, &settings).await,
        Commands::Attendance { command } => run_attendance(command, &settings).await,
        Commands::Watch { device, tolerance } => run_watch(&settings, device, tolerance).await,
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No video capture devices found");
            } else {
                output::print_devices(&devices);
            }
            Ok(())
        }
    }
}

async fn open_store(settings: &Settings) -> Result<Store> {
    if let Some(parent) = settings.db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    Store::open(&settings.db_path)
        .await
        .with_context(|| format!("opening database {}", settings.db_path.display()))
}

async fn run_student(command: StudentCommands, settings: &Settings) -> Result<()> {
    let store = open_store(settings).await?;

    match command {
        StudentCommands::List => {
            let students = store.list_students().await?;
            if students.is_empty() {
                println!("No students registered");
            } else {
                output::print_students(&students);
            }
        }
        StudentCommands::Show { id } => {
            let Some(student) = store.get_student(&id).await? else {
                bail!("student not found: {id}");
            };
            output::print_students(std::slice::from_ref(&student));
            let records = store.attendance_for_student(&id).await?;
            if records.is_empty() {
                println!("No attendance recorded");
            } else {
                output::print_attendance(&records);
            }
        }
        StudentCommands::Register {
            name,
            faculty,
            dob,
            email,
            address,
            photo,
            capture,
        } => {
            if name.trim().is_empty() {
                bail!("student name must not be empty");
            }
            let photos = PhotoStore::open(&settings.photo_dir)?;

            let jpeg = if let Some(path) = photo {
                // Reject photos the gallery loader would skip later
                let mut detector = FaceDetector::load(&settings.detector_model_path())?;
                let mut encoder = FaceEncoder::load(&settings.encoder_model_path())?;
                cognatten_core::gallery::encode_photo(&mut detector, &mut encoder, &path)
                    .with_context(|| format!("no usable face in {}", path.display()))?;
                Some(std::fs::read(&path)?)
            } else if capture {
                Some(capture_photo_jpeg(settings)?)
            } else {
                None
            };

            let student = Student {
                id: store.next_student_id().await?,
                name,
                faculty,
                dob,
                email,
                address,
            };
            store.upsert_student(&student).await?;

            if let Some(jpeg) = jpeg {
                if let Err(err) = photos.save(&student.id, &jpeg) {
                    let _ = store.delete_student(&student.id).await;
                    return Err(err).context("saving face photo");
                }
            }

            println!("Registered {} with id {}", student.name, student.id);
        }
        StudentCommands::Update {
            id,
            name,
            faculty,
            dob,
            email,
            address,
        } => {
            let Some(current) = store.get_student(&id).await? else {
                bail!("student not found: {id}");
            };
            if name.as_deref().is_some_and(|n| n.trim().is_empty()) {
                bail!("student name must not be empty");
            }
            let student = Student {
                id,
                name: name.unwrap_or(current.name),
                faculty: faculty.unwrap_or(current.faculty),
                dob: dob.unwrap_or(current.dob),
                email: email.unwrap_or(current.email),
                address: address.unwrap_or(current.address),
            };
            store.update_student(&student).await?;
            println!("Updated {}", student.id);
        }
        StudentCommands::Remove { id } => {
            if !store.delete_student(&id).await? {
                bail!("student not found: {id}");
            }
            let photos = PhotoStore::open(&settings.photo_dir)?;
            photos.remove(&id)?;
            println!("Removed {id}");
        }
    }

    Ok(())
}

async fn run_attendance(command: AttendanceCommands, settings: &Settings) -> Result<()> {
    let store = open_store(settings).await?;

    match command {
        AttendanceCommands::List { student } => {
            let records = match student {
                Some(id) => store.attendance_for_student(&id).await?,
                None => store.list_attendance().await?,
            };
            if records.is_empty() {
                println!("No attendance recorded");
            } else {
                output::print_attendance(&records);
            }
        }
        AttendanceCommands::Remove { id } => {
            if !store.delete_attendance(id).await? {
                bail!("attendance record not found: {id}");
            }
            println!("Removed record {id}");
        }
        AttendanceCommands::Export {
            attendance,
            students,
        } => {
            if attendance.is_none() && students.is_none() {
                bail!("nothing to export; pass --attendance and/or --students");
            }
            if let Some(path) = attendance {
                let records = store.list_attendance().await?;
                export::write_attendance_csv(File::create(&path)?, &records)?;
                println!("Exported {} attendance records to {}", records.len(), path.display());
            }
            if let Some(path) = students {
                let roster = store.list_students().await?;
                export::write_students_csv(File::create(&path)?, &roster)?;
                println!("Exported {} students to {}", roster.len(), path.display());
            }
        }
        AttendanceCommands::Import {
            attendance,
            students,
        } => {
            if attendance.is_none() && students.is_none() {
                bail!("nothing to import; pass --attendance and/or --students");
            }
            // Roster first so imported attendance rows have their students
            if let Some(path) = students {
                let roster = export::read_students_csv(File::open(&path)?)?;
                for student in &roster {
                    store.upsert_student(student).await?;
                }
                println!("Imported {} students from {}", roster.len(), path.display());
            }
            if let Some(path) = attendance {
                let rows = export::read_attendance_csv(File::open(&path)?)?;
                for row in &rows {
                    store
                        .insert_attendance(&row.student_id, &row.date, &row.time)
                        .await?;
                }
                println!("Imported {} attendance records from {}", rows.len(), path.display());
            }
        }
    }

    Ok(())
}

/// Live loop: capture, identify, mark. Each student is announced once per
/// run; the 12-hour rule still decides whether a row is inserted.
async fn run_watch(
    settings: &Settings,
    device: Option<String>,
    tolerance: Option<f32>,
) -> Result<()> {
    let store = open_store(settings).await?;
    let photos = PhotoStore::open(&settings.photo_dir)?;
    let tolerance = tolerance.unwrap_or(settings.match_tolerance);
    let device = device.unwrap_or_else(|| settings.camera_device.clone());

    let mut detector = FaceDetector::load(&settings.detector_model_path())
        .context("loading face detector")?;
    let mut encoder =
        FaceEncoder::load(&settings.encoder_model_path()).context("loading face encoder")?;

    let (gallery, issues) =
        cognatten_core::load_gallery(&mut detector, &mut encoder, &photos.list()?);
    for issue in &issues {
        eprintln!("warning: {issue}");
    }
    if gallery.is_empty() {
        bail!("no enrolled faces; register a student with a photo first");
    }
    println!("Watching with {} enrolled face(s); Ctrl-C to stop", gallery.len());

    // --device accepts a bare index ("2") as well as a full path
    let camera = match device.parse::<u32>() {
        Ok(index) => Camera::open_index(index),
        Err(_) => Camera::open(&device),
    }
    .with_context(|| format!("opening camera {device}"))?;

    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        flag.store(false, Ordering::SeqCst);
    });

    let mut seen: HashSet<String> = HashSet::new();
    let mut last_unknown: Option<Instant> = None;

    while running.load(Ordering::SeqCst) {
        let frame = match camera.capture_frame() {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(error = %err, "capture failed");
                tokio::time::sleep(Duration::from_millis(500)).await;
                continue;
            }
        };
        if frame.is_dark {
            tokio::time::sleep(Duration::from_millis(300)).await;
            continue;
        }

        let ident = identify_frame(
            &mut detector,
            &mut encoder,
            &frame.data,
            frame.width,
            frame.height,
            &gallery,
            tolerance,
        )?;

        match ident {
            None => {}
            Some(ident) if !ident.result.matched => {
                let throttled = last_unknown
                    .map(|t| t.elapsed() < Duration::from_secs(3))
                    .unwrap_or(false);
                if !throttled {
                    println!("Unknown face (distance {:.2}); please register", ident.result.distance);
                    last_unknown = Some(Instant::now());
                }
            }
            Some(ident) => {
                let student_id = ident.result.student_id.unwrap_or_default();
                if !seen.insert(student_id.clone()) {
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    continue;
                }
                let now = chrono::Local::now().naive_local();
                match store.mark_attendance(&student_id, now).await? {
                    Some(mark) => {
                        println!("Marked {} ({}) at {} {}", mark.name, mark.student_id, mark.date, mark.time)
                    }
                    None => println!("{student_id} already marked within the last 12 hours"),
                }
            }
        }

        tokio::time::sleep(Duration::from_millis(300)).await;
    }

    println!("Stopped; {} student(s) seen this run", seen.len());
    Ok(())
}

/// Capture frames and return the one with the most confident face as JPEG.
fn capture_photo_jpeg(settings: &Settings) -> Result<Vec<u8>> {
    let camera = Camera::open(&settings.camera_device)
        .with_context(|| format!("opening camera {}", settings.camera_device))?;
    let mut detector =
        FaceDetector::load(&settings.detector_model_path()).context("loading face detector")?;

    let (frames, _dark_skipped) = camera.capture_frames(settings.frames_per_capture)?;

    let mut best: Option<(usize, f32)> = None;
    for (i, frame) in frames.iter().enumerate() {
        let faces = detector.detect(&frame.data, frame.width, frame.height)?;
        if let Some(face) = faces.first() {
            if best.map(|(_, c)| face.confidence > c).unwrap_or(true) {
                best = Some((i, face.confidence));
            }
        }
    }
    let Some((idx, confidence)) = best else {
        bail!("no face detected; adjust the camera and retry");
    };
    tracing::debug!(confidence, "selected capture frame");

    let frame = &frames[idx];
    let img = image::RgbImage::from_raw(frame.width, frame.height, frame.data.clone())
        .context("frame buffer size mismatch")?;
    let mut jpeg = Cursor::new(Vec::new());
    img.write_to(&mut jpeg, image::ImageFormat::Jpeg)?;
    Ok(jpeg.into_inner())
}

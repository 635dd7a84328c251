use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database task failed: {0}")]
    Task(String),
    #[error("unknown database backend `{0}` (expected sqlite, mysql, or postgres)")]
    UnknownBackend(String),
    #[error("{backend} backend selected but no {backend} driver is built into this binary; use sqlite or rebuild with a {backend} driver")]
    DriverUnavailable { backend: &'static str },
    #[error("student not found: {0}")]
    StudentNotFound(String),
    #[error("unable to generate a unique student id after {0} attempts")]
    IdSpaceExhausted(usize),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio_rusqlite::Error> for StoreError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        match err {
            tokio_rusqlite::Error::Rusqlite(e) => Self::Sqlite(e),
            other => Self::Task(other.to_string()),
        }
    }
}

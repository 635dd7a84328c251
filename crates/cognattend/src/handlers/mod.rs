pub mod attendance;
pub mod auth;
pub mod export;
pub mod students;

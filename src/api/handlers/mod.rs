pub mod admissions;
pub mod announcements;
pub mod auth;
pub mod catalog;
pub mod payments;
pub mod results;
pub mod students;
pub mod teachers;

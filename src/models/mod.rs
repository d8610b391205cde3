pub mod evaluation;
pub mod job;
pub mod resume;

pub mod file;
pub mod id;
pub mod json;
pub mod time;
pub mod worker;

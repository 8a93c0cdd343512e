pub mod admin;
pub mod chapters;
pub mod coins;
pub mod runs;

pub mod check_path;
pub mod doctor;
pub mod index;
pub mod serve;

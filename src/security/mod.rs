//! Trust-boundary primitives shared by the server and the collaborators.

pub mod path;

pub use path::{PathRejection, PathValidator, ValidatedPath};

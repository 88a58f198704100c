pub mod autoextract;
pub mod batch;
pub mod import;
pub mod ocr;
pub mod segment;
pub mod tools;

pub use batch::{AgencyScope, BatchError, BatchReport};

pub mod agency;
pub mod document;
pub mod enums;
pub mod field_category;
pub mod filters;
pub mod processed_document;
pub mod synthetic_document;

pub use agency::*;
pub use document::*;
pub use enums::*;
pub use field_category::*;
pub use filters::*;
pub use processed_document::*;
pub use synthetic_document::*;

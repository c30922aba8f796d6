pub mod contact;
pub mod export;
pub mod requests;
pub mod responses;

pub use contact::*;
pub use export::{ContactExport, ExportFormat};
pub use requests::*;
pub use responses::*;

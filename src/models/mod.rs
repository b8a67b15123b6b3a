pub mod credential;
pub mod document;
pub mod enums;
pub mod record;

pub use credential::*;
pub use document::*;
pub use enums::*;
pub use record::*;

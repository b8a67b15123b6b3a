pub mod extraction;
pub mod parsing;
pub mod processor;

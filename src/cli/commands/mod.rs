pub mod exercise;
pub mod migrate;
pub mod token;

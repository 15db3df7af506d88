pub mod chunker;
pub mod error_classifier;
pub mod hasher;

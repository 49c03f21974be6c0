pub mod convert;
pub mod info;
pub mod sample;
pub mod stats;

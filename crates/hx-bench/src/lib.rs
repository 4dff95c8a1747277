pub mod fakes;
pub mod fixture;
pub mod tracing_init;

pub mod compiled;
pub mod interpreted;

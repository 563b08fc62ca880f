pub mod bytes;
pub mod sym;

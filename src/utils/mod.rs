pub mod code_generator;
pub mod cursor;
pub mod hash;

pub mod logger;
pub mod temp;
pub mod tools;

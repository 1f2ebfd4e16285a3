pub mod codes;
pub mod crypto;
pub mod similarity;
pub mod time;

pub mod engines;
pub mod games;
pub mod moves;
pub mod pool;
pub mod records;

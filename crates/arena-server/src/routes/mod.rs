pub mod games;
pub mod health;
pub mod records;
pub mod tick;

pub mod locks;
pub mod tick;

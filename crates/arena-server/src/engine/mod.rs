pub mod arbiter;
pub mod hub;
pub mod movers;
pub mod uci;

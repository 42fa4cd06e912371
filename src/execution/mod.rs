pub mod risk;
pub mod trader;
pub mod types;

pub mod position_sizing;
pub mod price;
pub mod symbol_constraints;

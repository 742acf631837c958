pub mod creature;
pub mod decay;
pub mod item;
pub mod thing;

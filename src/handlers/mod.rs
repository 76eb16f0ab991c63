pub mod brands;
pub mod critique;

//! Cake catalog domain module.
//!
//! This crate contains the business rules for categories, discounts and cakes,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod cake;
pub mod category;
pub mod discount;

pub use cake::{Cake, NewCake, validate_cake_name};
pub use category::{Category, NewCategory};
pub use discount::{Discount, DiscountTerms, DiscountType};

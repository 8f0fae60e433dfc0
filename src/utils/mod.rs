pub mod earnings;
pub mod fare;
pub mod geo;
pub mod jwt;
pub mod lifecycle;
pub mod rental;

pub mod car_category;
pub mod car_rental;
pub mod driver;
pub mod rental_car;
pub mod ride;
pub mod user;

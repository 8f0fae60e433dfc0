pub use sea_orm_migration::prelude::*;

mod m20240301_000001_create_users;
mod m20240301_000002_create_car_categories;
mod m20240301_000003_create_drivers;
mod m20240301_000004_create_rides;
mod m20240301_000005_create_rental_cars;
mod m20240301_000006_create_car_rentals;
mod m20240301_000007_add_booking_guards;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_users::Migration),
            Box::new(m20240301_000002_create_car_categories::Migration),
            Box::new(m20240301_000003_create_drivers::Migration),
            Box::new(m20240301_000004_create_rides::Migration),
            Box::new(m20240301_000005_create_rental_cars::Migration),
            Box::new(m20240301_000006_create_car_rentals::Migration),
            Box::new(m20240301_000007_add_booking_guards::Migration),
        ]
    }
}

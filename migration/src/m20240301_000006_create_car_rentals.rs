use sea_orm_migration::{prelude::*, schema::*};

use super::m20240301_000001_create_users::Users;
use super::m20240301_000005_create_rental_cars::RentalCars;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CarRentals::Table)
                    .if_not_exists()
                    .col(uuid(CarRentals::Id).primary_key())
                    .col(uuid(CarRentals::CarId).not_null())
                    .col(uuid(CarRentals::RenterId).not_null())
                    .col(timestamp_with_time_zone(CarRentals::StartTime).not_null())
                    .col(timestamp_with_time_zone(CarRentals::EndTime).not_null())
                    .col(string_len(CarRentals::DurationType, 10).not_null())
                    .col(integer(CarRentals::DurationValue).not_null())
                    .col(double(CarRentals::TotalPrice).not_null())
                    .col(string_len(CarRentals::Status, 20).not_null().default("pending"))
                    .col(string_len(CarRentals::PickupLocation, 255).not_null())
                    .col(string_len(CarRentals::ReturnLocation, 255).not_null())
                    .col(
                        timestamp_with_time_zone(CarRentals::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .check(Expr::col(CarRentals::EndTime).gt(Expr::col(CarRentals::StartTime)))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rental_car")
                            .from(CarRentals::Table, CarRentals::CarId)
                            .to(RentalCars::Table, RentalCars::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rental_renter")
                            .from(CarRentals::Table, CarRentals::RenterId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CarRentals::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum CarRentals {
    Table,
    Id,
    CarId,
    RenterId,
    StartTime,
    EndTime,
    DurationType,
    DurationValue,
    TotalPrice,
    Status,
    PickupLocation,
    ReturnLocation,
    CreatedAt,
}

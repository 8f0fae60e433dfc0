use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RentalCars::Table)
                    .if_not_exists()
                    .col(uuid(RentalCars::Id).primary_key())
                    .col(string_len(RentalCars::Make, 50).not_null())
                    .col(string_len(RentalCars::Model, 50).not_null())
                    .col(integer(RentalCars::Year).not_null())
                    .col(integer(RentalCars::Seats).not_null())
                    .col(string_len(RentalCars::Transmission, 20).not_null())
                    .col(string_len(RentalCars::FuelType, 20).not_null())
                    .col(json_binary(RentalCars::Features).not_null().default(Expr::cust("'[]'::jsonb")))
                    .col(text_null(RentalCars::ImageUrl))
                    .col(double(RentalCars::PricePerHour).not_null())
                    .col(double(RentalCars::PricePerDay).not_null())
                    .col(string_len(RentalCars::Location, 100).not_null())
                    .col(boolean(RentalCars::IsAvailable).not_null().default(true))
                    .col(
                        timestamp_with_time_zone(RentalCars::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RentalCars::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum RentalCars {
    Table,
    Id,
    Make,
    Model,
    Year,
    Seats,
    Transmission,
    FuelType,
    Features,
    ImageUrl,
    PricePerHour,
    PricePerDay,
    Location,
    IsAvailable,
    CreatedAt,
}

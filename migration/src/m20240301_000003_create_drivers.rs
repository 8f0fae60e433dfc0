use sea_orm_migration::{prelude::*, schema::*};

use super::m20240301_000001_create_users::Users;
use super::m20240301_000002_create_car_categories::CarCategories;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Drivers::Table)
                    .if_not_exists()
                    .col(uuid(Drivers::Id).primary_key())
                    .col(integer(Drivers::CategoryId).not_null())
                    .col(string_len(Drivers::VehicleMake, 50).not_null())
                    .col(string_len(Drivers::VehicleModel, 50).not_null())
                    .col(string_len(Drivers::VehiclePlate, 20).not_null().unique_key())
                    .col(string_len_null(Drivers::VehicleColor, 30))
                    .col(boolean(Drivers::IsAvailable).not_null().default(false))
                    .col(double_null(Drivers::CurrentLat))
                    .col(double_null(Drivers::CurrentLng))
                    .col(double(Drivers::Rating).not_null().default(5.0))
                    .col(integer(Drivers::TotalRatings).not_null().default(0))
                    .col(
                        timestamp_with_time_zone(Drivers::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Drivers::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_driver_user")
                            .from(Drivers::Table, Drivers::Id)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_driver_category")
                            .from(Drivers::Table, Drivers::CategoryId)
                            .to(CarCategories::Table, CarCategories::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_drivers_available")
                    .table(Drivers::Table)
                    .col(Drivers::IsAvailable)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Drivers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Drivers {
    Table,
    Id,
    CategoryId,
    VehicleMake,
    VehicleModel,
    VehiclePlate,
    VehicleColor,
    IsAvailable,
    CurrentLat,
    CurrentLng,
    Rating,
    TotalRatings,
    CreatedAt,
    UpdatedAt,
}

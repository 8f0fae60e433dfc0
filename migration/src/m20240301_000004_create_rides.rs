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
                    .table(Rides::Table)
                    .if_not_exists()
                    .col(uuid(Rides::Id).primary_key())
                    .col(uuid(Rides::PassengerId).not_null())
                    .col(uuid_null(Rides::DriverId))
                    .col(integer(Rides::CategoryId).not_null())
                    .col(double(Rides::PickupLat).not_null())
                    .col(double(Rides::PickupLng).not_null())
                    .col(text(Rides::PickupAddress).not_null().default(""))
                    .col(double(Rides::DropoffLat).not_null())
                    .col(double(Rides::DropoffLng).not_null())
                    .col(text(Rides::DropoffAddress).not_null().default(""))
                    .col(double(Rides::DistanceKm).not_null())
                    .col(string_len(Rides::Status, 20).not_null().default("pending"))
                    .col(double(Rides::EstimatedFare).not_null())
                    .col(double_null(Rides::FinalFare))
                    .col(string_len(Rides::PaymentMethod, 20).not_null().default("cash"))
                    .col(integer_null(Rides::Rating))
                    .col(text_null(Rides::Feedback))
                    .col(
                        timestamp_with_time_zone(Rides::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(timestamp_with_time_zone_null(Rides::AcceptedAt))
                    .col(timestamp_with_time_zone_null(Rides::StartedAt))
                    .col(timestamp_with_time_zone_null(Rides::CompletedAt))
                    .col(timestamp_with_time_zone_null(Rides::CancelledAt))
                    .check(Expr::col(Rides::Rating).between(1, 5).or(Expr::col(Rides::Rating).is_null()))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ride_passenger")
                            .from(Rides::Table, Rides::PassengerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ride_driver")
                            .from(Rides::Table, Rides::DriverId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ride_category")
                            .from(Rides::Table, Rides::CategoryId)
                            .to(CarCategories::Table, CarCategories::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_rides_status")
                    .table(Rides::Table)
                    .col(Rides::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Rides::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Rides {
    Table,
    Id,
    PassengerId,
    DriverId,
    CategoryId,
    PickupLat,
    PickupLng,
    PickupAddress,
    DropoffLat,
    DropoffLng,
    DropoffAddress,
    DistanceKm,
    Status,
    EstimatedFare,
    FinalFare,
    PaymentMethod,
    Rating,
    Feedback,
    CreatedAt,
    AcceptedAt,
    StartedAt,
    CompletedAt,
    CancelledAt,
}

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CarCategories::Table)
                    .if_not_exists()
                    .col(pk_auto(CarCategories::Id))
                    .col(string_len(CarCategories::Name, 50).not_null().unique_key())
                    .col(text_null(CarCategories::Description))
                    .col(double(CarCategories::BaseFare).not_null())
                    .col(double(CarCategories::PricePerKm).not_null())
                    .col(double(CarCategories::MinimumFare).not_null())
                    .col(integer(CarCategories::Capacity).not_null())
                    .col(boolean(CarCategories::IsActive).not_null().default(true))
                    .to_owned(),
            )
            .await?;

        // Seed default tariffs
        let insert = Query::insert()
            .into_table(CarCategories::Table)
            .columns([
                CarCategories::Name,
                CarCategories::Description,
                CarCategories::BaseFare,
                CarCategories::PricePerKm,
                CarCategories::MinimumFare,
                CarCategories::Capacity,
            ])
            .values_panic([
                "Moto".into(),
                "Motorbike taxi for one passenger".into(),
                (1.0).into(),
                (0.6).into(),
                (2.0).into(),
                1.into(),
            ])
            .values_panic([
                "Standard".into(),
                "Everyday rides in a compact car".into(),
                (2.5).into(),
                (1.2).into(),
                (5.0).into(),
                4.into(),
            ])
            .values_panic([
                "Comfort".into(),
                "Newer cars with extra legroom".into(),
                (3.5).into(),
                (1.6).into(),
                (7.0).into(),
                4.into(),
            ])
            .values_panic([
                "Van".into(),
                "Groups and luggage".into(),
                (5.0).into(),
                (2.0).into(),
                (10.0).into(),
                7.into(),
            ])
            .to_owned();

        manager.exec_stmt(insert).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CarCategories::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum CarCategories {
    Table,
    Id,
    Name,
    Description,
    BaseFare,
    PricePerKm,
    MinimumFare,
    Capacity,
    IsActive,
}

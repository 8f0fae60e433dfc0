use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // At most one open ride per passenger
        db.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_rides_open_passenger ON rides (passenger_id) \
             WHERE status IN ('pending', 'accepted', 'in_progress')",
        )
        .await?;

        // At most one assigned, unfinished ride per driver
        db.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_rides_busy_driver ON rides (driver_id) \
             WHERE status IN ('accepted', 'in_progress')",
        )
        .await?;

        // No two bookings holding the same car may overlap in time
        db.execute_unprepared("CREATE EXTENSION IF NOT EXISTS btree_gist")
            .await?;
        db.execute_unprepared(
            "ALTER TABLE car_rentals ADD CONSTRAINT ex_car_rentals_overlap \
             EXCLUDE USING gist (car_id WITH =, tstzrange(start_time, end_time) WITH &&) \
             WHERE (status IN ('pending', 'confirmed', 'active'))",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(
            "ALTER TABLE car_rentals DROP CONSTRAINT IF EXISTS ex_car_rentals_overlap",
        )
        .await?;
        db.execute_unprepared("DROP INDEX IF EXISTS uq_rides_busy_driver")
            .await?;
        db.execute_unprepared("DROP INDEX IF EXISTS uq_rides_open_passenger")
            .await?;

        Ok(())
    }
}

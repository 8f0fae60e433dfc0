use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A ride tariff: base fare, per-km rate, minimum fare and seat capacity
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "car_categories")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub description: Option<String>,
    pub base_fare: f64,
    pub price_per_km: f64,
    pub minimum_fare: f64,
    pub capacity: i32,
    pub is_active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::ride::Entity")]
    Rides,
    #[sea_orm(has_many = "super::driver::Entity")]
    Drivers,
}

impl Related<super::ride::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Rides.def()
    }
}

impl Related<super::driver::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Drivers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

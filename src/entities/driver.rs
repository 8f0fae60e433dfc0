use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::utils::geo::GeoPoint;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "drivers")]
pub struct Model {
    /// Same id as the driver's user account
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub category_id: i32,
    pub vehicle_make: String,
    pub vehicle_model: String,
    pub vehicle_plate: String,
    pub vehicle_color: Option<String>,
    pub is_available: bool,
    pub current_lat: Option<f64>,
    pub current_lng: Option<f64>,
    pub rating: f64,
    pub total_ratings: i32,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn location(&self) -> Option<GeoPoint> {
        match (self.current_lat, self.current_lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::Id",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::car_category::Entity",
        from = "Column::CategoryId",
        to = "super::car_category::Column::Id"
    )]
    Category,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::car_category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

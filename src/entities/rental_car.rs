use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entities::car_rental::DurationType;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "rental_cars")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub seats: i32,
    pub transmission: String,
    pub fuel_type: String,
    /// JSON array of feature labels
    pub features: Json,
    pub image_url: Option<String>,
    pub price_per_hour: f64,
    pub price_per_day: f64,
    pub location: String,
    pub is_available: bool,
    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn unit_rate(&self, kind: DurationType) -> f64 {
        match kind {
            DurationType::Hourly => self.price_per_hour,
            DurationType::Daily => self.price_per_day,
        }
    }

    /// Feature labels; anything in the column that is not a string is dropped
    pub fn feature_list(&self) -> Vec<String> {
        parse_features(&self.features)
    }
}

pub fn parse_features(value: &Json) -> Vec<String> {
    match value {
        Json::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        // Some rows were written as a single comma-separated string
        Json::String(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::car_rental::Entity")]
    Rentals,
}

impl Related<super::car_rental::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Rentals.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn features_accept_arrays_and_joined_strings() {
        assert_eq!(
            parse_features(&json!(["GPS", " Bluetooth ", 3, ""])),
            vec!["GPS".to_string(), "Bluetooth".to_string()]
        );
        assert_eq!(
            parse_features(&json!("AC, GPS,,")),
            vec!["AC".to_string(), "GPS".to_string()]
        );
        assert!(parse_features(&json!(null)).is_empty());
    }
}

use super::TargetType;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Explicit quota-check flag for one user or one department. One row per
/// `(target_type, target_identifier)`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "quota_check_settings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub target_type: TargetType,
    pub target_identifier: String,
    pub enabled: bool,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

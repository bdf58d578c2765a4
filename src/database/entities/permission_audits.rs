use super::TargetType;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Audit trail of permission-setting mutations for both flag families.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "permission_audits")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub operation: String,
    pub target_type: TargetType,
    pub target_identifier: String,
    /// JSON detail map.
    pub details: String,
    pub create_time: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

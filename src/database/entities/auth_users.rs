use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Identity record synced from the auth system. The engine reads it for
/// giver metadata and for user-id/employee-number conversion; it never
/// creates these rows outside tests.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "auth_users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub github_id: Option<String>,
    /// Comma-separated starred projects as reported by the directory sync.
    pub github_star: String,
    pub employee_number: String,
    pub register_time: DateTime<Utc>,
    pub access_time: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

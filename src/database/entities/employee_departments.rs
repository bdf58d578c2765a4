use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Department membership synced from the directory. The full hierarchy is
/// stored as a comma-joined path, root first.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "employee_departments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub employee_number: String,
    /// Comma-joined department names, most general first.
    pub dept_full_level_names: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Department path root → leaf.
    pub fn dept_path(&self) -> Vec<String> {
        self.dept_full_level_names
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

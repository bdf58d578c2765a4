use crate::database::entities::{auth_users, AuthUser};
use crate::database::{DatabaseError, DatabaseResult};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::collections::HashMap;

/// Auth-users DAO for directory lookups and id conversion.
#[derive(Clone)]
pub struct UsersDao {
    db: DatabaseConnection,
}

impl UsersDao {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, user_id: &str) -> DatabaseResult<Option<AuthUser>> {
        auth_users::Entity::find_by_id(user_id)
            .one(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))
    }

    pub async fn find_by_employee_number(
        &self,
        employee_number: &str,
    ) -> DatabaseResult<Option<AuthUser>> {
        auth_users::Entity::find()
            .filter(auth_users::Column::EmployeeNumber.eq(employee_number))
            .one(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))
    }

    /// Convert employee_number to user id.
    pub async fn user_id_by_employee_number(
        &self,
        employee_number: &str,
    ) -> DatabaseResult<String> {
        self.find_by_employee_number(employee_number)
            .await?
            .map(|u| u.id)
            .ok_or(DatabaseError::NotFound)
    }

    /// Convert user id to employee_number.
    pub async fn employee_number_by_user_id(&self, user_id: &str) -> DatabaseResult<String> {
        self.find_by_id(user_id)
            .await?
            .map(|u| u.employee_number)
            .ok_or(DatabaseError::NotFound)
    }

    /// Batch conversion employee_number → user id.
    pub async fn user_ids_by_employee_numbers(
        &self,
        employee_numbers: &[String],
    ) -> DatabaseResult<HashMap<String, String>> {
        if employee_numbers.is_empty() {
            return Ok(HashMap::new());
        }

        let users = auth_users::Entity::find()
            .filter(auth_users::Column::EmployeeNumber.is_in(employee_numbers.iter().cloned()))
            .all(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(users
            .into_iter()
            .map(|u| (u.employee_number, u.id))
            .collect())
    }

    /// Batch conversion user id → employee_number.
    pub async fn employee_numbers_by_user_ids(
        &self,
        user_ids: &[String],
    ) -> DatabaseResult<HashMap<String, String>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let users = auth_users::Entity::find()
            .filter(auth_users::Column::Id.is_in(user_ids.iter().cloned()))
            .all(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(users
            .into_iter()
            .map(|u| (u.id, u.employee_number))
            .collect())
    }
}

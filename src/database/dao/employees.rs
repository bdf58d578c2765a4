use crate::database::entities::{employee_departments, EmployeeDepartment};
use crate::database::{DatabaseError, DatabaseResult};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};

/// Employee-department DAO. The department hierarchy is read-only here; the
/// directory sync owns the rows.
#[derive(Clone)]
pub struct EmployeesDao {
    db: DatabaseConnection,
}

impl EmployeesDao {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_employee_number(
        &self,
        employee_number: &str,
    ) -> DatabaseResult<Option<EmployeeDepartment>> {
        employee_departments::Entity::find()
            .filter(employee_departments::Column::EmployeeNumber.eq(employee_number))
            .one(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))
    }

    /// All employees whose department path mentions the given name.
    pub async fn find_by_department(
        &self,
        department_name: &str,
    ) -> DatabaseResult<Vec<EmployeeDepartment>> {
        employee_departments::Entity::find()
            .filter(
                employee_departments::Column::DeptFullLevelNames
                    .contains(department_name),
            )
            .all(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))
    }

    /// Number of employees whose department path mentions the given name.
    pub async fn count_by_department(&self, department_name: &str) -> DatabaseResult<u64> {
        employee_departments::Entity::find()
            .filter(
                employee_departments::Column::DeptFullLevelNames
                    .contains(department_name),
            )
            .count(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))
    }
}

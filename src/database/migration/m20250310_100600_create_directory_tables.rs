use super::{AuthUsers, EmployeeDepartments};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuthUsers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuthUsers::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AuthUsers::Name).string().not_null())
                    .col(ColumnDef::new(AuthUsers::Phone).string().null())
                    .col(ColumnDef::new(AuthUsers::GithubId).string().null())
                    .col(
                        ColumnDef::new(AuthUsers::GithubStar)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(AuthUsers::EmployeeNumber)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthUsers::RegisterTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthUsers::AccessTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_auth_users_employee_number")
                    .table(AuthUsers::Table)
                    .col(AuthUsers::EmployeeNumber)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EmployeeDepartments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmployeeDepartments::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EmployeeDepartments::EmployeeNumber)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EmployeeDepartments::DeptFullLevelNames)
                            .text()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uniq_employee_departments_number")
                    .table(EmployeeDepartments::Table)
                    .col(EmployeeDepartments::EmployeeNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EmployeeDepartments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AuthUsers::Table).to_owned())
            .await
    }
}

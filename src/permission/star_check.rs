use crate::database::entities::{
    effective_star_check_settings, permission_audits, star_check_settings, TargetType,
};
use crate::database::DatabaseManager;
use crate::error::ServiceError;
use crate::gateway::AiGatewayClient;
use crate::quota::expiry::truncate_to_second;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, EntityTrait, QueryFilter, Set,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

const OPERATION_SET: &str = "star_check_setting_set";
const OPERATION_UPDATE: &str = "star_check_setting_update";

/// Projects the effective star-check flag per user. Same mechanics as the
/// quota-check projector, over its own tables and gateway endpoint.
pub struct StarCheckPermissionService {
    db: Arc<DatabaseManager>,
    gateway: Arc<dyn AiGatewayClient>,
}

impl StarCheckPermissionService {
    pub fn new(db: Arc<DatabaseManager>, gateway: Arc<dyn AiGatewayClient>) -> Self {
        Self { db, gateway }
    }

    pub async fn set_user_setting(&self, user_id: &str, enabled: bool) -> Result<(), ServiceError> {
        let user = self
            .db
            .users()
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::UserNotFound(user_id.to_string()))?;

        if !self
            .upsert_setting(TargetType::User, user_id, enabled)
            .await?
        {
            return Ok(());
        }

        if let Err(err) = self.update_employee_permissions(&user.employee_number).await {
            error!(
                user_id,
                employee_number = %user.employee_number,
                error = %err,
                "failed to reproject star check permissions"
            );
        }

        self.record_audit(
            OPERATION_SET,
            TargetType::User,
            user_id,
            json!({ "user_id": user_id, "enabled": enabled }),
        )
        .await;

        Ok(())
    }

    pub async fn set_department_setting(
        &self,
        department_name: &str,
        enabled: bool,
    ) -> Result<(), ServiceError> {
        let employee_count = self.db.employees().count_by_department(department_name).await?;
        if employee_count == 0 {
            return Err(ServiceError::DepartmentNotFound(department_name.to_string()));
        }

        if !self
            .upsert_setting(TargetType::Department, department_name, enabled)
            .await?
        {
            return Ok(());
        }

        if let Err(err) = self.update_department_permissions(department_name).await {
            error!(
                department_name,
                error = %err,
                "failed to reproject department star check permissions"
            );
        }

        self.record_audit(
            OPERATION_SET,
            TargetType::Department,
            department_name,
            json!({ "department_name": department_name, "enabled": enabled }),
        )
        .await;

        Ok(())
    }

    pub async fn get_user_effective_setting(&self, user_id: &str) -> Result<bool, ServiceError> {
        let effective = effective_star_check_settings::Entity::find()
            .filter(effective_star_check_settings::Column::UserId.eq(user_id))
            .one(&self.db.connection)
            .await
            .map_err(|e| ServiceError::storage("read effective star check setting", e))?;

        Ok(effective.map(|e| e.enabled).unwrap_or(false))
    }

    pub async fn get_department_setting(
        &self,
        department_name: &str,
    ) -> Result<bool, ServiceError> {
        let setting = self
            .find_setting(TargetType::Department, department_name)
            .await?;
        Ok(setting.map(|s| s.enabled).unwrap_or(false))
    }

    pub async fn update_employee_permissions(
        &self,
        employee_number: &str,
    ) -> Result<(), ServiceError> {
        let Some(user) = self.db.users().find_by_employee_number(employee_number).await? else {
            return Ok(());
        };
        let user_id = user.id;

        let departments = match self
            .db
            .employees()
            .find_by_employee_number(employee_number)
            .await?
        {
            Some(employee) => employee.dept_path(),
            None => Vec::new(),
        };

        let existing = effective_star_check_settings::Entity::find()
            .filter(effective_star_check_settings::Column::UserId.eq(&user_id))
            .one(&self.db.connection)
            .await
            .map_err(|e| ServiceError::storage("read effective star check setting", e))?;

        let is_new_user = existing.is_none();
        let current_enabled = existing.as_ref().map(|e| e.enabled).unwrap_or(false);

        let (new_enabled, setting_id) = self.calculate_effective(&user_id, &departments).await?;
        let setting_changed = current_enabled != new_enabled;
        let now = truncate_to_second(Utc::now());

        match existing {
            Some(effective) => {
                let mut active: effective_star_check_settings::ActiveModel = effective.into();
                active.enabled = Set(new_enabled);
                active.setting_id = Set(setting_id);
                active.update_time = Set(now);
                active
                    .update(&self.db.connection)
                    .await
                    .map_err(|e| ServiceError::storage("update effective star check setting", e))?;
            }
            None => {
                effective_star_check_settings::ActiveModel {
                    id: ActiveValue::NotSet,
                    user_id: Set(user_id.clone()),
                    enabled: Set(new_enabled),
                    setting_id: Set(setting_id),
                    update_time: Set(now),
                }
                .insert(&self.db.connection)
                .await
                .map_err(|e| ServiceError::storage("insert effective star check setting", e))?;
            }
        }

        let should_notify =
            (!is_new_user && setting_changed) || (is_new_user && setting_id.is_some());

        if should_notify {
            match self
                .gateway
                .set_star_check_permission(&user_id, new_enabled)
                .await
            {
                Ok(()) => {
                    info!(%user_id, enabled = new_enabled, "star check permission pushed");
                }
                Err(err) => {
                    error!(%user_id, error = %err, "failed to notify gateway of star check change");
                }
            }
        }

        self.record_audit(
            OPERATION_UPDATE,
            TargetType::User,
            employee_number,
            json!({
                "employee_number": employee_number,
                "enabled": new_enabled,
                "setting_changed": setting_changed,
            }),
        )
        .await;

        Ok(())
    }

    pub async fn update_department_permissions(
        &self,
        department_name: &str,
    ) -> Result<(), ServiceError> {
        let employees = self.db.employees().find_by_department(department_name).await?;

        for employee in employees {
            if let Err(err) = self
                .update_employee_permissions(&employee.employee_number)
                .await
            {
                error!(
                    employee_number = %employee.employee_number,
                    department_name,
                    error = %err,
                    "failed to update star check permissions for employee"
                );
            }
        }

        Ok(())
    }

    pub async fn remove_user_completely(&self, employee_number: &str) -> Result<(), ServiceError> {
        info!(employee_number, "removing star check data for user");

        let user = self.db.users().find_by_employee_number(employee_number).await?;
        let user_id = user.map(|u| u.id);
        let target_identifier = user_id.clone().unwrap_or_else(|| employee_number.to_string());

        if let Err(err) = star_check_settings::Entity::delete_many()
            .filter(star_check_settings::Column::TargetType.eq(TargetType::User))
            .filter(star_check_settings::Column::TargetIdentifier.eq(&target_identifier))
            .exec(&self.db.connection)
            .await
        {
            error!(employee_number, error = %err, "failed to remove user star check setting");
        }

        if let Some(user_id) = user_id {
            if let Err(err) = effective_star_check_settings::Entity::delete_many()
                .filter(effective_star_check_settings::Column::UserId.eq(&user_id))
                .exec(&self.db.connection)
                .await
            {
                error!(employee_number, %user_id, error = %err, "failed to remove effective star check setting");
            }
        }

        Ok(())
    }

    async fn calculate_effective(
        &self,
        user_id: &str,
        departments: &[String],
    ) -> Result<(bool, Option<i32>), ServiceError> {
        if let Some(setting) = self.find_setting(TargetType::User, user_id).await? {
            return Ok((setting.enabled, Some(setting.id)));
        }

        for department in departments.iter().rev() {
            if let Some(setting) = self.find_setting(TargetType::Department, department).await? {
                return Ok((setting.enabled, Some(setting.id)));
            }
        }

        Ok((false, None))
    }

    async fn find_setting(
        &self,
        target_type: TargetType,
        target_identifier: &str,
    ) -> Result<Option<star_check_settings::Model>, ServiceError> {
        star_check_settings::Entity::find()
            .filter(star_check_settings::Column::TargetType.eq(target_type))
            .filter(star_check_settings::Column::TargetIdentifier.eq(target_identifier))
            .one(&self.db.connection)
            .await
            .map_err(|e| ServiceError::storage("read star check setting", e))
    }

    async fn upsert_setting(
        &self,
        target_type: TargetType,
        target_identifier: &str,
        enabled: bool,
    ) -> Result<bool, ServiceError> {
        let now = truncate_to_second(Utc::now());

        match self.find_setting(target_type, target_identifier).await? {
            Some(setting) if setting.enabled == enabled => Ok(false),
            Some(setting) => {
                let mut active: star_check_settings::ActiveModel = setting.into();
                active.enabled = Set(enabled);
                active.update_time = Set(now);
                active
                    .update(&self.db.connection)
                    .await
                    .map_err(|e| ServiceError::storage("update star check setting", e))?;
                Ok(true)
            }
            None => {
                star_check_settings::ActiveModel {
                    id: ActiveValue::NotSet,
                    target_type: Set(target_type),
                    target_identifier: Set(target_identifier.to_string()),
                    enabled: Set(enabled),
                    create_time: Set(now),
                    update_time: Set(now),
                }
                .insert(&self.db.connection)
                .await
                .map_err(|e| ServiceError::storage("create star check setting", e))?;
                Ok(true)
            }
        }
    }

    async fn record_audit(
        &self,
        operation: &str,
        target_type: TargetType,
        target_identifier: &str,
        details: serde_json::Value,
    ) {
        let audit = permission_audits::ActiveModel {
            id: ActiveValue::NotSet,
            operation: Set(operation.to_string()),
            target_type: Set(target_type),
            target_identifier: Set(target_identifier.to_string()),
            details: Set(details.to_string()),
            create_time: Set(truncate_to_second(Utc::now())),
        };

        if let Err(err) = audit.insert(&self.db.connection).await {
            warn!(operation, error = %err, "failed to record permission audit");
        }
    }
}

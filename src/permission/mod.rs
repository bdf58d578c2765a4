//! Effective-permission projection.
//!
//! Two independent flag families are projected with the same mechanism: the
//! quota-check flag and the star-check flag. They use distinct setting tables
//! and distinct gateway endpoints but identical algorithms: an explicit user
//! setting wins, otherwise the most specific department setting along the
//! user's department path, otherwise disabled.

pub mod quota_check;
pub mod star_check;

pub use quota_check::QuotaCheckPermissionService;
pub use star_check::StarCheckPermissionService;

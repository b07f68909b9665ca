use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Registry row for one organization. Lives in the shared store; the
/// backing_store_id is immutable once assigned and is never reused.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub custom_domain: Option<String>,
    pub backing_store_id: String,
    pub plan: String,
    pub max_admins: i32,
    pub max_members: i32,
    pub max_guests: i32,
    pub is_active: bool,
    pub is_verified: bool,
    /// False between store creation and schema application; a create-tenant
    /// retry resumes provisioning instead of failing while this is false.
    pub is_provisioned: bool,
    pub contact_email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const PLAN_FREE: &str = "free";
pub const PLAN_STANDARD: &str = "standard";
pub const PLAN_ENTERPRISE: &str = "enterprise";

pub const KNOWN_PLANS: &[&str] = &[PLAN_FREE, PLAN_STANDARD, PLAN_ENTERPRISE];

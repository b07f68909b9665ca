// Tenant-scoped data endpoints. Thin consumers of the routing layer: every
// access goes through the store router, which lands on the store resolved
// for this request's tenant.

use axum::extract::{Json, Path};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::models::{Enrollment, Student};
use crate::database::repository::Repository;
use crate::database::router::StoreRouter;
use crate::error::ApiError;
use crate::middleware::ApiResponse;

#[derive(Debug, Deserialize)]
pub struct CreateStudentRequest {
    pub full_name: String,
    pub email: Option<String>,
}

/// GET /api/data/students
pub async fn students_list() -> Result<ApiResponse<Vec<Student>>, ApiError> {
    let students = Repository::<Student>::new("students").select_all().await?;
    Ok(ApiResponse::success(students))
}

/// GET /api/data/students/:id
pub async fn student_get(Path(id): Path<Uuid>) -> Result<ApiResponse<Student>, ApiError> {
    let student = Repository::<Student>::new("students")
        .select_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Student not found"))?;
    Ok(ApiResponse::success(student))
}

/// POST /api/data/students
pub async fn student_create(
    Json(payload): Json<CreateStudentRequest>,
) -> Result<ApiResponse<Student>, ApiError> {
    if payload.full_name.trim().is_empty() {
        return Err(ApiError::bad_request("full_name is required"));
    }

    let pool = StoreRouter::pool_for("students").await?;
    let student = sqlx::query_as::<_, Student>(
        "INSERT INTO students (full_name, email) VALUES ($1, $2) RETURNING *",
    )
    .bind(payload.full_name.trim())
    .bind(&payload.email)
    .fetch_one(&pool)
    .await?;

    Ok(ApiResponse::created(student))
}

/// GET /api/data/enrollments
pub async fn enrollments_list() -> Result<ApiResponse<Value>, ApiError> {
    // Same-store relation; checked before querying
    StoreRouter::check_relation("enrollments", "students")?;

    let enrollments = Repository::<Enrollment>::new("enrollments")
        .select_all()
        .await?;
    let count = enrollments.len();
    Ok(ApiResponse::success(json!({
        "enrollments": enrollments,
        "count": count,
    })))
}

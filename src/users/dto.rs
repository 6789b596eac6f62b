use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A user as seen by the viewer.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

/// A followed author together with how many recipes they have published.
#[derive(Debug, Serialize, FromRow)]
pub struct Subscription {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub user: UserProfile,
    pub recipes_count: i64,
}

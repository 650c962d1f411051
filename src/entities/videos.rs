use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "videos")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub title: String,
    pub description: String,
    pub instructor_name: String,
    pub instructor_bio: Option<String>,
    pub instructor_photo: Option<String>,
    pub thumbnail_url: String,
    /// Public URL of the full video object
    pub video_url: String,
    /// Storage key the streaming URLs are signed against
    pub video_key: String,
    pub preview_url: Option<String>,
    pub price_cents: i64,
    pub duration_minutes: i32,
    pub category: String,
    pub skill_level: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub tags: Json,
    pub is_featured: bool,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::purchases::Entity")]
    Purchases,
    #[sea_orm(has_many = "super::reviews::Entity")]
    Reviews,
}

impl Related<super::purchases::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Purchases.def()
    }
}

impl Related<super::reviews::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

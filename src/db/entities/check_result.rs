use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::status::Status;

/// One check execution against a target. Append-only; error and sub-check
/// rows hang off it and are written in the same transaction.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "check_results")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub target_id: i32,
    pub status: Status,
    pub http_status: Option<i32>,
    pub response_time_ms: i64,
    pub content_length: Option<i64>,
    pub checked_at: ChronoDateTimeUtc,
    pub screenshot: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::target::Entity",
        from = "Column::TargetId",
        to = "super::target::Column::Id",
        on_delete = "Cascade"
    )]
    Target,

    #[sea_orm(has_many = "super::check_error::Entity")]
    CheckError,

    #[sea_orm(has_many = "super::iframe_check::Entity")]
    IframeCheck,

    #[sea_orm(has_many = "super::video_check::Entity")]
    VideoCheck,
}

impl Related<super::target::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Target.def()
    }
}

impl Related<super::check_error::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CheckError.def()
    }
}

impl Related<super::iframe_check::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::IframeCheck.def()
    }
}

impl Related<super::video_check::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VideoCheck.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

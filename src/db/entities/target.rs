use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A monitored endpoint. `auth_config` holds the tagged
/// [`crate::db::enums::AuthConfig`] as JSON; the URL is unique across the
/// registry.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "targets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub url: String,
    pub name: String,
    pub description: Option<String>,
    pub interval_seconds: i32,
    pub is_enabled: bool,
    #[sea_orm(column_type = "Json")]
    pub auth_config: Json,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::check_result::Entity")]
    CheckResult,

    #[sea_orm(has_many = "super::latency_sample::Entity")]
    LatencySample,
}

impl Related<super::check_result::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CheckResult.def()
    }
}

impl Related<super::latency_sample::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LatencySample.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-iframe load probe owned by one check result.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "iframe_checks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub check_result_id: i32,
    pub src: String,
    pub loaded: bool,
    pub error: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::check_result::Entity",
        from = "Column::CheckResultId",
        to = "super::check_result::Column::Id",
        on_delete = "Cascade"
    )]
    CheckResult,
}

impl Related<super::check_result::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CheckResult.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

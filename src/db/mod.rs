//! Persistence layer: entities, shared enums, and the service API the rest of
//! the engine talks to. Callers never touch SQL directly.

pub mod entities;
pub mod enums;
pub mod services;

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Schema};

pub async fn connect(url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(url).await
}

/// Creates all tables from the entity definitions if they do not exist yet.
/// Lets the binary bootstrap a fresh SQLite file and lets tests run against
/// `sqlite::memory:`.
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut statements = vec![
        schema.create_table_from_entity(entities::target::Entity),
        schema.create_table_from_entity(entities::check_result::Entity),
        schema.create_table_from_entity(entities::check_error::Entity),
        schema.create_table_from_entity(entities::iframe_check::Entity),
        schema.create_table_from_entity(entities::video_check::Entity),
        schema.create_table_from_entity(entities::latency_sample::Entity),
    ];

    for stmt in &mut statements {
        stmt.if_not_exists();
        db.execute(backend.build(&*stmt)).await?;
    }

    Ok(())
}

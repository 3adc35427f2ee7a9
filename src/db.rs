use sea_orm::sea_query::TableCreateStatement;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, Schema, Statement};
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::entity::{
    audit_log, department, department_transfer, employee, id_card_template, id_generate, menu, role,
    role_menu_access, role_permission, role_sub_menu_access, sub_menu, user,
};

/// Initialize database connection and auto-migrate tables
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let database_url = config.connection_url();

    let mut opt = ConnectOptions::new(&database_url);
    if config.is_sqlite() {
        info!("Connecting to sqlite database: {}", database_url);
        // An in-memory database lives only as long as its single connection
        opt.max_connections(1)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(8));
    } else {
        info!("Connecting to database: {}:{}/{}", config.host, config.port, config.name);
        opt.max_connections(100)
            .min_connections(5)
            .connect_timeout(Duration::from_secs(8))
            .acquire_timeout(Duration::from_secs(8))
            .idle_timeout(Duration::from_secs(8))
            .max_lifetime(Duration::from_secs(8))
            .set_schema_search_path("public");
    }
    opt.sqlx_logging(true)
        .sqlx_logging_level(tracing::log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;
    info!("Database connection established");

    auto_migrate(&db).await?;

    Ok(db)
}

/// Create every table from its entity definition
async fn auto_migrate(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    info!("Running auto-migration for all entities...");

    // Referenced tables first so that foreign keys resolve
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(role::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(department::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(menu::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(id_card_template::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(audit_log::Entity)).await?;

    create_table_if_not_exists(db, backend, schema.create_table_from_entity(user::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(sub_menu::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(employee::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(role_permission::Entity)).await?;

    create_table_if_not_exists(db, backend, schema.create_table_from_entity(role_menu_access::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(role_sub_menu_access::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(department_transfer::Entity)).await?;
    create_table_if_not_exists(db, backend, schema.create_table_from_entity(id_generate::Entity)).await?;

    info!("Auto-migration completed successfully");
    Ok(())
}

/// Create a table if it doesn't exist
async fn create_table_if_not_exists(
    db: &DatabaseConnection,
    backend: DbBackend,
    mut stmt: TableCreateStatement,
) -> Result<(), DbErr> {
    stmt.if_not_exists();

    let sql = backend.build(&stmt);

    db.execute(Statement::from_string(backend, sql.to_string())).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{EntityTrait, PaginatorTrait};

    #[tokio::test]
    async fn test_migrate_in_memory() {
        let config = DatabaseConfig {
            url: Some("sqlite::memory:".to_string()),
            ..Default::default()
        };
        let db = init_database(&config).await.unwrap();
        assert_eq!(role::Entity::find().count(&db).await.unwrap(), 0);
        assert_eq!(id_generate::Entity::find().count(&db).await.unwrap(), 0);

        // Running migration twice is harmless
        auto_migrate(&db).await.unwrap();
    }
}

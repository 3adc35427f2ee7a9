//! First-run seeding
//!
//! Makes sure the admin role, the default sidebar menus and the bootstrap
//! admin account exist. Safe to run on every start.

use anyhow::Context;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::auth::hash_password;
use crate::config::Config;
use crate::entity::{menu, role, sub_menu, user};
use crate::permission::resource;

/// (name, path, icon, children as (name, path, icon))
type MenuSeed = (
    &'static str,
    &'static str,
    &'static str,
    &'static [(&'static str, &'static str, &'static str)],
);

const DEFAULT_MENUS: &[MenuSeed] = &[
    ("Dashboard", resource::DASHBOARD, "home", &[]),
    (
        "Administration",
        "/administration",
        "settings",
        &[
            ("Users", resource::USERS, "users"),
            ("Roles", resource::ROLES, "shield"),
            ("Menus", resource::MENUS, "menu"),
            ("Audit Logs", resource::AUDIT_LOGS, "history"),
        ],
    ),
    (
        "Organization",
        "/organization",
        "building",
        &[
            ("Departments", resource::DEPARTMENTS, "layers"),
            ("Employees", resource::EMPLOYEES, "id-badge"),
            ("Department Transfers", resource::DEPARTMENT_TRANSFERS, "shuffle"),
        ],
    ),
    (
        "ID Cards",
        "/id-card",
        "credit-card",
        &[
            ("Templates", resource::ID_CARD_TEMPLATES, "layout"),
            ("Generated Cards", resource::ID_CARDS, "printer"),
        ],
    ),
];

pub async fn run(db: &DatabaseConnection, config: &Config) -> anyhow::Result<()> {
    let admin_role = ensure_admin_role(db).await?;
    seed_menus(db).await?;
    ensure_admin_user(db, config, admin_role.id).await?;
    Ok(())
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

async fn ensure_admin_role(db: &DatabaseConnection) -> anyhow::Result<role::Model> {
    if let Some(existing) = role::Entity::find()
        .filter(role::Column::Name.eq(role::ADMIN_ROLE))
        .one(db)
        .await?
    {
        return Ok(existing);
    }

    let ts = now();
    let created = role::ActiveModel {
        name: Set(role::ADMIN_ROLE.to_string()),
        description: Set(Some("Full access to every menu".to_string())),
        created_at: Set(ts),
        updated_at: Set(ts),
        ..Default::default()
    }
    .insert(db)
    .await
    .context("failed to create admin role")?;

    tracing::info!("Created role '{}'", created.name);
    Ok(created)
}

/// Insert default menus whose path is not taken yet
async fn seed_menus(db: &DatabaseConnection) -> anyhow::Result<()> {
    let ts = now();

    for (order, (name, path, icon, children)) in DEFAULT_MENUS.iter().enumerate() {
        let parent = match menu::Entity::find()
            .filter(menu::Column::Path.eq(*path))
            .one(db)
            .await?
        {
            Some(existing) => existing,
            None => {
                let created = menu::ActiveModel {
                    name: Set(name.to_string()),
                    path: Set(path.to_string()),
                    icon: Set(Some(icon.to_string())),
                    sort_order: Set(order as i32),
                    is_active: Set(true),
                    created_at: Set(ts),
                    updated_at: Set(ts),
                    ..Default::default()
                }
                .insert(db)
                .await
                .with_context(|| format!("failed to seed menu {}", path))?;
                tracing::info!("Seeded menu {}", path);
                created
            }
        };

        for (child_order, (child_name, child_path, child_icon)) in children.iter().enumerate() {
            let exists = sub_menu::Entity::find()
                .filter(sub_menu::Column::Path.eq(*child_path))
                .one(db)
                .await?
                .is_some();
            if exists {
                continue;
            }
            sub_menu::ActiveModel {
                menu_id: Set(parent.id),
                name: Set(child_name.to_string()),
                path: Set(child_path.to_string()),
                icon: Set(Some(child_icon.to_string())),
                sort_order: Set(child_order as i32),
                is_active: Set(true),
                created_at: Set(ts),
                updated_at: Set(ts),
                ..Default::default()
            }
            .insert(db)
            .await
            .with_context(|| format!("failed to seed sub-menu {}", child_path))?;
            tracing::info!("Seeded sub-menu {}", child_path);
        }
    }

    Ok(())
}

async fn ensure_admin_user(db: &DatabaseConnection, config: &Config, admin_role_id: i64) -> anyhow::Result<()> {
    let email = config.bootstrap.admin_email.trim().to_lowercase();
    if email.is_empty() {
        tracing::warn!("No bootstrap admin email configured, skipping admin account");
        return Ok(());
    }

    let exists = user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .one(db)
        .await?
        .is_some();
    if exists {
        return Ok(());
    }

    let password = hash_password(&config.auth, &config.bootstrap.admin_password)?;
    let ts = now();
    user::ActiveModel {
        name: Set(config.bootstrap.admin_name.clone()),
        email: Set(email.clone()),
        password: Set(password),
        role_id: Set(admin_role_id),
        is_active: Set(true),
        last_login: Set(None),
        created_at: Set(ts),
        updated_at: Set(ts),
        ..Default::default()
    }
    .insert(db)
    .await
    .context("failed to create admin user")?;

    tracing::warn!("Created bootstrap admin account {}; change its password", email);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_menu_paths_are_unique() {
        let mut paths = HashSet::new();
        for (_, path, _, children) in DEFAULT_MENUS {
            assert!(paths.insert(*path), "duplicate {}", path);
            for (_, child, _) in children.iter() {
                assert!(paths.insert(*child), "duplicate {}", child);
            }
        }
    }

    #[test]
    fn test_every_resource_has_a_menu() {
        let paths: HashSet<&str> = DEFAULT_MENUS
            .iter()
            .flat_map(|(_, path, _, children)| {
                std::iter::once(*path).chain(children.iter().map(|(_, p, _)| *p))
            })
            .collect();
        for required in [
            resource::DASHBOARD,
            resource::USERS,
            resource::ROLES,
            resource::MENUS,
            resource::AUDIT_LOGS,
            resource::DEPARTMENTS,
            resource::EMPLOYEES,
            resource::DEPARTMENT_TRANSFERS,
            resource::ID_CARD_TEMPLATES,
            resource::ID_CARDS,
        ] {
            assert!(paths.contains(required), "missing {}", required);
        }
    }
}

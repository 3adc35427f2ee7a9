//! Entity module - SeaORM entity definitions
//!
//! One module per table. Foreign keys are declared through `Relation` so that
//! auto-migration creates them and the database enforces restrict/cascade.

pub mod audit_log;
pub mod department;
pub mod department_transfer;
pub mod employee;
pub mod id_card_template;
pub mod id_generate;
pub mod menu;
pub mod role;
pub mod role_menu_access;
pub mod role_permission;
pub mod role_sub_menu_access;
pub mod sub_menu;
pub mod user;

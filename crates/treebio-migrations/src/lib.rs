//! Database migrations for the Treebio application

pub use sea_orm_migration::prelude::*;

mod migration;

pub use migration::Migrator;

//! Entity definitions for the Treebio database schema

pub mod custom_domains;

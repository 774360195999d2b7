// src/test_support.rs
//! Fixtures shared by unit tests

use crate::accounts::{Role, TenantRepository, User, UserRepository};
use crate::core::Database;

/// Fresh database with one tenant; returns (db, tenant_id)
pub async fn db_with_tenant() -> (Database, i64) {
    let db = Database::in_memory().await.unwrap();
    let tenant = TenantRepository::new(db.pool())
        .create_domain_tenant("acme.io", "acme")
        .await
        .unwrap();
    (db, tenant.id)
}

pub async fn add_user(db: &Database, tenant_id: i64, email: &str) -> i64 {
    add_member(db, tenant_id, email, Role::Member).await.id
}

pub async fn add_member(db: &Database, tenant_id: i64, email: &str, role: Role) -> User {
    UserRepository::new(db.pool())
        .create(tenant_id, email, None, role)
        .await
        .unwrap()
}

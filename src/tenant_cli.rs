// src/tenant_cli.rs
use crate::accounts::{TenantRepository, TenantService};
use crate::core::Database;
use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Args)]
#[command(about = "Manage tenants allowed to sign in")]
pub struct TenantCli {
    #[command(subcommand)]
    pub command: TenantCommand,

    /// Override the configured database path
    #[arg(long)]
    pub database_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum TenantCommand {
    /// Add a new tenant for specific email
    Add { email: String, tenant_name: String },
    /// Add a new tenant for entire domain
    AddDomain { domain: String, tenant_name: String },
    /// Remove/deactivate a tenant by email
    Remove { email: String },
    /// Remove/deactivate a tenant by domain
    RemoveDomain { domain: String },
    /// List all active tenants
    List,
    /// Check if an email is authorized
    Check { email: String },
    /// Import email tenants from a CSV file (email,tenant_name)
    Import { csv_file: PathBuf },
    /// Initialize the database
    Init,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: usize,
    pub skipped: usize,
    pub failed: usize,
}

fn is_unique_violation(e: &anyhow::Error) -> bool {
    e.to_string().contains("UNIQUE constraint failed")
}

pub async fn handle_tenant_command(cli: TenantCli, default_database: &Path) -> Result<()> {
    let database_path = cli
        .database_path
        .clone()
        .unwrap_or_else(|| default_database.to_path_buf());
    let db = Database::connect(&database_path).await?;
    let tenant_repo = TenantRepository::new(db.pool());
    let tenant_service = TenantService::new(db.pool());

    match cli.command {
        TenantCommand::Add { email, tenant_name } => {
            match tenant_repo.create_email_tenant(&email, &tenant_name).await {
                Ok(tenant) => {
                    info!(
                        "Email tenant created: {} -> {} (id {})",
                        email, tenant.tenant_name, tenant.id
                    );
                }
                Err(e) if is_unique_violation(&e) => {
                    warn!("Email '{}' already has a tenant", email);
                }
                Err(e) => error!("Failed to create tenant: {:#}", e),
            }
        }

        TenantCommand::AddDomain {
            domain,
            tenant_name,
        } => match tenant_repo.create_domain_tenant(&domain, &tenant_name).await {
            Ok(tenant) => {
                info!(
                    "Domain tenant created: @{} -> {} (id {})",
                    domain, tenant.tenant_name, tenant.id
                );
                info!(
                    "All emails with @{} can now sign in to tenant '{}'",
                    domain, tenant_name
                );
            }
            Err(e) if is_unique_violation(&e) => {
                warn!("Domain '@{}' already has a tenant", domain);
            }
            Err(e) => error!("Failed to create domain tenant: {:#}", e),
        },

        TenantCommand::Remove { email } => match tenant_repo.deactivate_by_email(&email).await {
            Ok(true) => info!("Tenant deactivated for email: {}", email),
            Ok(false) => warn!("No active tenant found for email: {}", email),
            Err(e) => error!("Failed to deactivate tenant: {:#}", e),
        },

        TenantCommand::RemoveDomain { domain } => {
            match tenant_repo.deactivate_by_domain(&domain).await {
                Ok(true) => info!("Tenant deactivated for domain: @{}", domain),
                Ok(false) => warn!("No active tenant found for domain: @{}", domain),
                Err(e) => error!("Failed to deactivate domain tenant: {:#}", e),
            }
        }

        TenantCommand::List => {
            let tenants = tenant_repo.list_active().await?;
            if tenants.is_empty() {
                info!("No active tenants found.");
            } else {
                info!(
                    "{:<5} {:<25} {:<8} {:<20} {:<16}",
                    "ID", "Email/Domain", "Type", "Tenant", "Created"
                );
                for tenant in tenants {
                    let address = match (&tenant.email, &tenant.domain) {
                        (Some(email), _) => email.clone(),
                        (None, Some(domain)) => format!("@{}", domain),
                        (None, None) => "-".to_string(),
                    };
                    info!(
                        "{:<5} {:<25} {:<8} {:<20} {:<16}",
                        tenant.id,
                        address,
                        tenant.authorization_kind(),
                        tenant.tenant_name,
                        tenant.created_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
        }

        TenantCommand::Check { email } => match tenant_service.validate_user_access(&email).await? {
            Some(tenant) => {
                info!(
                    "Email '{}' is authorized for tenant: {} (via {})",
                    email,
                    tenant.tenant_name,
                    tenant.authorization_kind()
                );
            }
            None => {
                warn!(
                    "Email '{}' is not authorized (no matching email or domain)",
                    email
                );
            }
        },

        TenantCommand::Import { csv_file } => {
            if !csv_file.exists() {
                anyhow::bail!("CSV file not found: {}", csv_file.display());
            }
            let content = tokio::fs::read_to_string(&csv_file).await?;
            let summary = import_tenants(&tenant_repo, &content).await;
            info!(
                "Import completed: {} added, {} skipped, {} failed",
                summary.added, summary.skipped, summary.failed
            );
        }

        TenantCommand::Init => {
            info!("Database initialized at: {}", database_path.display());
            info!("Add tenants with: hireflow tenant add <email> <tenant-name>");
        }
    }

    Ok(())
}

/// Create one email tenant per `email,tenant_name` record; existing emails are skipped
pub async fn import_tenants(repo: &TenantRepository<'_>, content: &str) -> ImportSummary {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());
    let mut summary = ImportSummary::default();

    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                summary.failed += 1;
                warn!("CSV parsing error: {}", e);
                continue;
            }
        };

        let email = record.get(0).map(str::trim).unwrap_or_default();
        let tenant_name = record.get(1).map(str::trim).unwrap_or_default();
        if email.is_empty() || tenant_name.is_empty() {
            summary.failed += 1;
            warn!("Skipping record without email or tenant name");
            continue;
        }

        match repo.create_email_tenant(email, tenant_name).await {
            Ok(_) => {
                summary.added += 1;
                info!("Added: {} -> {}", email, tenant_name);
            }
            Err(e) if is_unique_violation(&e) => {
                summary.skipped += 1;
                info!("Skipped (already exists): {}", email);
            }
            Err(e) => {
                summary.failed += 1;
                error!("Failed to add {}: {:#}", email, e);
            }
        }
    }

    summary
}

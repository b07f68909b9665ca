use clap::Subcommand;
use serde_json::json;

use crate::cli::OutputFormat;
use crate::database::context::StoreTarget;
use crate::database::manager::StoreManager;
use crate::database::router::EntityDomain;
use crate::database::schema::{SchemaRunner, SqlSchemaRunner};
use crate::services::lifecycle::{CloneTenant, CreateOutcome, CreateTenant, TenantLifecycle};
use crate::services::registry::TenantRegistry;

#[derive(Subcommand)]
pub enum TenantCommands {
    #[command(about = "Create a new tenant and provision its backing store")]
    Create {
        #[arg(help = "Tenant display name")]
        name: String,

        #[arg(long, help = "Contact email for the organization")]
        contact: String,

        #[arg(long, help = "URL-safe slug (derived from name if omitted)")]
        slug: Option<String>,

        #[arg(long, help = "Email of an existing principal to grant ownership")]
        owner: Option<String>,

        #[arg(long, help = "Plan: free, standard or enterprise")]
        plan: Option<String>,
    },

    #[command(about = "Delete a tenant and drop its backing store (irreversible)")]
    Delete {
        #[arg(help = "Tenant slug")]
        slug: String,

        #[arg(long, help = "Required: acknowledge the store will be destroyed")]
        confirm: bool,
    },

    #[command(about = "Clone a tenant's store into a brand-new tenant")]
    Clone {
        #[arg(help = "Source tenant slug")]
        source: String,

        #[arg(help = "Display name for the new tenant")]
        name: String,

        #[arg(long, help = "Slug for the new tenant (derived from name if omitted)")]
        slug: Option<String>,

        #[arg(long, help = "Plan for the new tenant (source's plan if omitted)")]
        plan: Option<String>,
    },

    #[command(about = "Reactivate a tenant so it resolves again")]
    Activate {
        #[arg(help = "Tenant slug")]
        slug: String,
    },

    #[command(about = "Deactivate a tenant (hidden from resolution; store untouched)")]
    Deactivate {
        #[arg(help = "Tenant slug")]
        slug: String,
    },

    #[command(about = "List all tenants")]
    List,

    #[command(about = "Show tenant details")]
    Show {
        #[arg(help = "Tenant slug")]
        slug: String,
    },
}

pub async fn handle(cmd: TenantCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    // Lifecycle operations need the shared registry tables in place
    bootstrap_shared_schema().await?;

    match cmd {
        TenantCommands::Create {
            name,
            contact,
            slug,
            owner,
            plan,
        } => {
            let lifecycle = TenantLifecycle::new().await?;
            let (tenant, outcome) = lifecycle
                .create(CreateTenant {
                    name,
                    contact_email: contact,
                    slug,
                    owner_email: owner,
                    plan,
                    custom_domain: None,
                })
                .await?;

            let outcome_str = match outcome {
                CreateOutcome::Created => "created",
                CreateOutcome::Resumed => "resumed",
                CreateOutcome::NoOp => "already-provisioned",
            };

            match output_format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&json!({
                            "slug": tenant.slug,
                            "backing_store_id": tenant.backing_store_id,
                            "plan": tenant.plan,
                            "outcome": outcome_str,
                        }))?
                    );
                }
                OutputFormat::Text => {
                    println!("Tenant {} ({})", tenant.slug, outcome_str);
                    println!("Backing store: {}", tenant.backing_store_id);
                    println!("Plan: {}", tenant.plan);
                }
            }
            Ok(())
        }

        TenantCommands::Delete { slug, confirm } => {
            let lifecycle = TenantLifecycle::new().await?;
            lifecycle.delete(&slug, confirm).await?;

            match output_format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&json!({ "deleted": slug }))?);
                }
                OutputFormat::Text => {
                    println!("Tenant '{}' deleted; backing store dropped", slug);
                }
            }
            Ok(())
        }

        TenantCommands::Clone {
            source,
            name,
            slug,
            plan,
        } => {
            let lifecycle = TenantLifecycle::new().await?;
            let (tenant, _) = lifecycle
                .clone_from(CloneTenant {
                    source_slug: source.clone(),
                    name,
                    slug,
                    plan,
                })
                .await?;

            match output_format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&json!({
                            "slug": tenant.slug,
                            "backing_store_id": tenant.backing_store_id,
                            "cloned_from": source,
                        }))?
                    );
                }
                OutputFormat::Text => {
                    println!("Tenant {} cloned from {}", tenant.slug, source);
                    println!("Backing store: {}", tenant.backing_store_id);
                }
            }
            Ok(())
        }

        TenantCommands::Activate { slug } => set_active(&slug, true, output_format).await,

        TenantCommands::Deactivate { slug } => set_active(&slug, false, output_format).await,

        TenantCommands::List => {
            let registry = TenantRegistry::new().await?;
            let tenants = registry.list().await?;

            match output_format {
                OutputFormat::Json => {
                    let items: Vec<_> = tenants
                        .iter()
                        .map(|t| {
                            json!({
                                "slug": t.slug,
                                "name": t.name,
                                "backing_store_id": t.backing_store_id,
                                "plan": t.plan,
                                "is_active": t.is_active,
                                "is_provisioned": t.is_provisioned,
                            })
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&json!({ "tenants": items }))?);
                }
                OutputFormat::Text => {
                    if tenants.is_empty() {
                        println!("No tenants registered");
                        return Ok(());
                    }
                    println!(
                        "{:<20} {:<25} {:<25} {:<12} {}",
                        "SLUG", "NAME", "STORE", "PLAN", "STATUS"
                    );
                    println!("{}", "-".repeat(95));
                    for t in &tenants {
                        let status = match (t.is_active, t.is_provisioned) {
                            (true, true) => "active",
                            (false, _) => "inactive",
                            (true, false) => "provisioning",
                        };
                        println!(
                            "{:<20} {:<25} {:<25} {:<12} {}",
                            t.slug, t.name, t.backing_store_id, t.plan, status
                        );
                    }
                }
            }
            Ok(())
        }

        TenantCommands::Show { slug } => {
            let registry = TenantRegistry::new().await?;
            let tenant = registry
                .find_by_slug(&slug)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Tenant '{}' not found", slug))?;

            match output_format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&tenant)?);
                }
                OutputFormat::Text => {
                    println!("Tenant: {}", tenant.slug);
                    println!("Name: {}", tenant.name);
                    println!("Backing store: {}", tenant.backing_store_id);
                    if let Some(domain) = &tenant.custom_domain {
                        println!("Custom domain: {}", domain);
                    }
                    println!("Plan: {}", tenant.plan);
                    println!("Contact: {}", tenant.contact_email);
                    println!("Active: {}", tenant.is_active);
                    println!("Provisioned: {}", tenant.is_provisioned);
                    println!("Created: {}", tenant.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
                }
            }
            Ok(())
        }
    }
}

async fn set_active(slug: &str, active: bool, output_format: OutputFormat) -> anyhow::Result<()> {
    let registry = TenantRegistry::new().await?;
    let tenant = registry
        .find_by_slug(slug)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Tenant '{}' not found", slug))?;
    registry.set_active(tenant.id, active).await?;

    match output_format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "slug": slug,
                    "is_active": active,
                }))?
            );
        }
        OutputFormat::Text => {
            if active {
                println!("Tenant '{}' activated; it resolves again", slug);
            } else {
                println!("Tenant '{}' deactivated; backing store untouched", slug);
            }
        }
    }
    Ok(())
}

async fn bootstrap_shared_schema() -> anyhow::Result<()> {
    let pool = StoreManager::shared_pool().await?;
    SqlSchemaRunner
        .apply(&pool, EntityDomain::Shared, &StoreTarget::Shared)
        .await?;
    Ok(())
}

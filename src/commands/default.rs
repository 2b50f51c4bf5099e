use anyhow::{Context as AnyhowContext, Result};
use policykit::{CancelToken, PolicyType};

use crate::Context;
use crate::ui;

pub fn run(ctx: &Context, policy_type: PolicyType) -> Result<()> {
    let (config, engine) = super::session(ctx)?;
    let cancel = CancelToken::new();

    if policy_type == PolicyType::AccessPolicy
        && engine.default_access_policy(&cancel, config.org.classic)?.is_none()
    {
        ui::warn("ACCESS_POLICY is not available on classic orgs");
        return Ok(());
    }

    let resource = engine
        .discover_default(&cancel, policy_type)
        .with_context(|| format!("Failed to discover the default {policy_type} policy"))?;

    ui::section(&format!("Default {policy_type} policy"));
    ui::kv("id", resource.id().unwrap_or("-"));
    ui::kv("name", &resource.name);
    ui::kv("status", resource.status.as_str());
    if let Some(description) = &resource.description {
        ui::kv("description", description);
    }
    if let Some(priority) = resource.priority {
        ui::kv("priority", &priority.to_string());
    }
    match &resource.default_included_group_id {
        Some(group) => ui::kv("everyone group", group),
        None => ui::dim("no \"Everyone\" group found"),
    }
    if !ctx.quiet {
        ui::info("System default policies are discovered, never created or deleted");
    }
    Ok(())
}

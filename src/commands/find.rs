use anyhow::Result;
use policykit::{CancelToken, Error, PolicyType};

use crate::Context;
use crate::ui;

pub fn run(ctx: &Context, policy_type: PolicyType, name: &str) -> Result<()> {
    let (_, engine) = super::session(ctx)?;

    match engine.find_by_name(&CancelToken::new(), policy_type, name) {
        Ok(policy) => {
            ui::success(&format!("Found {policy_type} policy {name:?}"));
            ui::policy(&policy);
            Ok(())
        }
        Err(e @ Error::LookupExhausted { .. }) => {
            ui::error(&e.to_string());
            ui::dim(e.category().advice());
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

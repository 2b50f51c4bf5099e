//! Plan display

use colored::Colorize;
use std::collections::BTreeMap;

use super::planner::{Action, DefaultEntry, ExecutionPlan, PlannedChange};

/// Display the plan grouped by policy type; field-level drift only when `verbose`
pub fn display_plan(plan: &ExecutionPlan, verbose: bool) {
    if plan.pending_count() == 0 {
        println!();
        println!("  {} No changes needed", "✓".green());
    } else {
        display_changes(plan, verbose);
    }

    let protected: Vec<_> = plan
        .changes
        .iter()
        .filter(|c| c.action == Action::Protected)
        .collect();
    if !protected.is_empty() {
        println!();
        for change in protected {
            println!(
                "  {} {} is the system default policy and is left unmanaged",
                "⚠".yellow(),
                change.label()
            );
        }
    }

    if !plan.defaults.is_empty() {
        display_defaults(&plan.defaults);
    }
}

fn display_changes(plan: &ExecutionPlan, verbose: bool) {
    let mut by_type: BTreeMap<_, Vec<&PlannedChange>> = BTreeMap::new();
    for change in plan.pending() {
        by_type
            .entry(change.resource.policy_type)
            .or_default()
            .push(change);
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Policy Diff".bold()
    );
    println!("│");

    for (policy_type, changes) in &by_type {
        println!("│ {}", policy_type.as_str().bold());
        for change in changes {
            let (symbol, desc) = describe(change);
            println!("│   {} {:<30} {}", symbol, change.resource.name, desc.dimmed());
            for line in drift_lines(change, verbose) {
                println!("│       {}", line.dimmed());
            }
        }
        println!("│");
    }

    let count = |wanted: fn(&Action) -> bool| plan.pending().filter(|c| wanted(&c.action)).count();
    let created = count(|a| matches!(a, Action::Create));
    let updated = count(|a| matches!(a, Action::Update(_)));
    let deleted = count(|a| matches!(a, Action::Delete));

    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} changes ({} to create, {} to update, {} to delete)",
        plan.pending_count().to_string().bold(),
        created.to_string().green(),
        updated.to_string().yellow(),
        deleted.to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

/// Field-level drift of an update, shown at `-v` and above
fn drift_lines(change: &PlannedChange, verbose: bool) -> Vec<String> {
    match &change.action {
        Action::Update(fields) if verbose => fields.iter().map(ToString::to_string).collect(),
        _ => Vec::new(),
    }
}

fn describe(change: &PlannedChange) -> (colored::ColoredString, String) {
    let id = change.resource.id().unwrap_or("-");
    match &change.action {
        Action::Create => ("+".green(), "(not found)".to_string()),
        Action::Update(fields) => ("~".yellow(), format!("{id} ({} fields)", fields.len())),
        Action::Delete => {
            let status = change.remote.as_ref().map_or("", |p| p.status.as_str());
            ("-".red(), format!("{id} {status} (will remove)"))
        }
        Action::NoChange | Action::Protected => ("?".dimmed(), String::new()),
    }
}

fn display_defaults(defaults: &[DefaultEntry]) {
    println!();
    println!("{}", "System defaults".cyan().bold());
    for entry in defaults {
        match entry {
            DefaultEntry::Found(resource) => println!(
                "  {} {:<20} {} {}",
                "●".blue(),
                resource.policy_type.as_str(),
                resource.id().unwrap_or("-"),
                format!(
                    "priority {} / everyone {}",
                    resource
                        .priority
                        .map_or_else(|| "-".to_string(), |p| p.to_string()),
                    resource.default_included_group_id.as_deref().unwrap_or("-")
                )
                .dimmed()
            ),
            DefaultEntry::Unavailable(policy_type) => println!(
                "  {} {:<20} {}",
                "○".dimmed(),
                policy_type.as_str(),
                "not available on classic orgs".dimmed()
            ),
        }
    }
}

use colored::Colorize;
use policykit::Policy;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print the attributes of a remote policy
pub fn policy(policy: &Policy) {
    kv("id", &policy.id);
    kv("name", &policy.name);
    kv("type", policy.policy_type.as_str());
    kv("status", &status_label(policy));
    if let Some(description) = policy.description.as_deref().filter(|d| !d.is_empty()) {
        kv("description", description);
    }
    kv("priority", &policy.priority.map_or_else(|| "-".to_string(), |p| p.to_string()));
    if let Some(groups) = policy.included_groups() {
        kv(
            "groups",
            &groups.into_iter().collect::<Vec<_>>().join(", "),
        );
    }
    if policy.system {
        kv("system", &"yes".yellow().to_string());
    }
}

fn status_label(policy: &Policy) -> String {
    match policy.status {
        policykit::PolicyStatus::Active => policy.status.as_str().green().to_string(),
        policykit::PolicyStatus::Inactive => policy.status.as_str().dimmed().to_string(),
        policykit::PolicyStatus::Unknown => policy.status.as_str().yellow().to_string(),
    }
}

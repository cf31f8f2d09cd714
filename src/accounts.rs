use anyhow::Result;

use crate::config::{AccountConfig, Config};
use crate::provider::ProviderKind;

/// Input location an account reads from and whether it exists.
fn input_status(account: &AccountConfig) -> (String, &'static str) {
    let path = match account.provider {
        ProviderKind::Google | ProviderKind::WindowsLive => account.snapshot_dir.as_ref(),
        ProviderKind::Local => account.root.as_ref(),
    };
    match path {
        Some(p) if p.exists() => (p.display().to_string(), "OK"),
        Some(p) => (p.display().to_string(), "MISSING"),
        None => ("-".to_string(), "NOT CONFIGURED"),
    }
}

pub fn list_accounts(config: &Config) -> Result<()> {
    if config.accounts.is_empty() {
        println!("No accounts configured.");
        return Ok(());
    }

    println!(
        "{:<16} {:<14} {:<20} {:<16} INPUT",
        "ACCOUNT", "PROVIDER", "CAPABILITIES", "STATUS"
    );
    for (name, account) in &config.accounts {
        let capabilities: Vec<String> = account.capabilities.iter().map(|c| c.to_string()).collect();
        let (input, status) = input_status(account);
        println!(
            "{:<16} {:<14} {:<20} {:<16} {}",
            name,
            account.provider,
            capabilities.join(","),
            status,
            input
        );
    }

    Ok(())
}

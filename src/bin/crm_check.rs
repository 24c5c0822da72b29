use std::collections::HashSet;
use std::sync::Arc;

use crm::core::{Activity, Contact, Deal, Task};
use crm::services::Crm;

/// References to ids that are not in `known`, as (owner id, missing id).
fn dangling(refs: impl Iterator<Item = (i64, Option<i64>)>, known: &HashSet<i64>) -> Vec<(i64, i64)> {
    refs.filter_map(|(owner, target)| target.filter(|id| !known.contains(id)).map(|id| (owner, id)))
        .collect()
}

fn print_dangling(label: &str, found: &[(i64, i64)]) {
    if found.is_empty() {
        return;
    }
    println!("\n  {} ({}):", label, found.len());
    for (owner, missing) in found {
        println!("    {} -> {}", owner, missing);
    }
}

#[tokio::main]
async fn main() {
    if let Ok(journal) = systemd_journal_logger::JournalLog::new() {
        let _ = journal
            .with_syslog_identifier("crm-check".to_string())
            .install();
    }
    log::set_max_level(log::LevelFilter::Info);

    let config_path = crm::config::default_config_path();
    let config = match crm::config::CrmConfig::resolve(&config_path) {
        Ok(c) => c,
        Err(e) => {
            println!("Config error: {}", e);
            return;
        }
    };

    println!("=== Record store check ===\n");

    if config.base_url.trim().is_empty() {
        println!("No record store URL configured.");
        return;
    }
    println!("--- {} (project {}) ---", config.base_url, config.project_id);

    let client = match crm::records::http::HttpRecordClient::from_config(&config).await {
        Ok(c) => c,
        Err(e) => {
            println!("  Client error: {}", e);
            return;
        }
    };
    let crm = Crm::new(Arc::new(client), config.page_limit);

    let fetched = futures::try_join!(
        crm.contacts.get_all(),
        crm.deals.get_all(),
        crm.tasks.get_all(),
        crm.activities.get_all(),
    );
    let (contacts, deals, tasks, activities): (Vec<Contact>, Vec<Deal>, Vec<Task>, Vec<Activity>) =
        match fetched {
            Ok(all) => all,
            Err(e) => {
                println!("  Fetch error: {}", e);
                return;
            }
        };

    println!(
        "  Contacts: {}, deals: {}, tasks: {}, activities: {}",
        contacts.len(),
        deals.len(),
        tasks.len(),
        activities.len()
    );
    let limit = config.page_limit as usize;
    for (table, count) in [
        ("contact_c", contacts.len()),
        ("deal_c", deals.len()),
        ("task_c", tasks.len()),
        ("activity_c", activities.len()),
    ] {
        if count >= limit {
            println!("  {} hit the page limit ({}); later records are not shown", table, limit);
        }
    }

    let contact_ids: HashSet<i64> = contacts.iter().map(|c| c.id).collect();
    let deal_ids: HashSet<i64> = deals.iter().map(|d| d.id).collect();

    print_dangling(
        "DEALS WITH MISSING CONTACT",
        &dangling(deals.iter().map(|d| (d.id, d.contact_id)), &contact_ids),
    );
    print_dangling(
        "TASKS WITH MISSING CONTACT",
        &dangling(tasks.iter().map(|t| (t.id, t.contact_id)), &contact_ids),
    );
    // Activities outlive deleted records, so these are informational.
    print_dangling(
        "ACTIVITIES FOR REMOVED CONTACTS",
        &dangling(activities.iter().map(|a| (a.id, a.contact_id)), &contact_ids),
    );
    print_dangling(
        "ACTIVITIES FOR REMOVED DEALS",
        &dangling(activities.iter().map(|a| (a.id, a.deal_id)), &deal_ids),
    );

    let untyped = activities.iter().filter(|a| a.kind.is_none()).count();
    if untyped > 0 {
        println!("\n  Activities without a known type: {}", untyped);
    }

    println!("\nDone.");
}

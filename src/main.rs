use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Local;
use clap::{Args, Parser, Subcommand};
use serde_json::json;

use crm::application::Layout;
use crm::config::{self, CrmConfig};
use crm::core::task_filter::TaskFilter;
use crm::core::{DealStage, Entity, Loose};
use crm::forms::{ContactForm, DealForm, TaskForm};
use crm::message::{Message, ModalTarget, Toast, ToastLevel};
use crm::pages::{ContactsPage, DealsPage, TasksPage};
use crm::records::RecordClient;
use crm::records::http::HttpRecordClient;
use crm::records::keyring;
use crm::records::memory::MemoryRecordClient;
use crm::services::Crm;

#[derive(Parser)]
#[command(name = "crm")]
#[command(about = "Contacts, deals, tasks and their activity log", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Work against an in-memory store seeded with sample records
    #[arg(long, global = true)]
    offline: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (defaults to ~/.config/crm/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List contacts
    Contacts {
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Add, edit or delete a contact
    Contact {
        #[command(subcommand)]
        command: ContactCommand,
    },

    /// Show the deal pipeline, or the deals linked to one contact
    Deals {
        #[arg(long)]
        contact: Option<i64>,
    },

    /// Add, edit, move or delete a deal
    Deal {
        #[command(subcommand)]
        command: DealCommand,
    },

    /// List tasks
    Tasks {
        /// all, today, overdue, completed or pending
        #[arg(short, long, default_value = "all")]
        filter: TaskFilter,

        #[arg(short, long)]
        search: Option<String>,
    },

    /// Add, edit, toggle or delete a task
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },

    /// Show the activity log, newest first
    Activity {
        #[arg(long, conflicts_with = "deal")]
        contact: Option<i64>,

        #[arg(long)]
        deal: Option<i64>,
    },

    /// Store the record store API key in the system keyring
    Login {
        #[arg(long)]
        key: String,
    },

    /// Remove the stored API key from the system keyring
    Logout,

    /// Print the resolved configuration, after saving any settings given
    Config {
        #[arg(long)]
        set_url: Option<String>,

        #[arg(long)]
        set_project: Option<String>,

        #[arg(long)]
        set_page_limit: Option<u32>,

        #[arg(long)]
        set_debug: Option<bool>,
    },
}

#[derive(Args)]
struct ContactFields {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    company: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    /// Comma-separated
    #[arg(long)]
    tags: Option<String>,
    #[arg(long)]
    notes: Option<String>,
}

impl ContactFields {
    fn apply(self, form: &mut ContactForm) {
        let fields = [
            (self.name, &mut form.name),
            (self.company, &mut form.company),
            (self.email, &mut form.email),
            (self.phone, &mut form.phone),
            (self.tags, &mut form.tags),
            (self.notes, &mut form.notes),
        ];
        for (value, slot) in fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

#[derive(Subcommand)]
enum ContactCommand {
    Add(ContactFields),
    Edit {
        id: i64,
        #[command(flatten)]
        fields: ContactFields,
    },
    Delete {
        id: i64,
    },
}

#[derive(Args)]
struct DealFields {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    value: Option<String>,
    #[arg(long)]
    stage: Option<String>,
    /// Percent, 0-100
    #[arg(long)]
    probability: Option<String>,
    #[arg(long)]
    close_date: Option<String>,
    #[arg(long)]
    contact: Option<String>,
}

impl DealFields {
    fn apply(self, form: &mut DealForm) {
        if let Some(stage) = self.stage {
            form.stage = DealStage::parse(&stage);
        }
        let fields = [
            (self.title, &mut form.title),
            (self.value, &mut form.value),
            (self.probability, &mut form.probability),
            (self.close_date, &mut form.expected_close_date),
            (self.contact, &mut form.contact_id),
        ];
        for (value, slot) in fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

#[derive(Subcommand)]
enum DealCommand {
    Add(DealFields),
    Edit {
        id: i64,
        #[command(flatten)]
        fields: DealFields,
    },
    /// Move a deal to another pipeline stage
    Stage {
        id: i64,
        stage: String,
    },
    Delete {
        id: i64,
    },
}

#[derive(Args)]
struct TaskFields {
    #[arg(long)]
    title: Option<String>,
    /// Date (2026-03-10) or date-time
    #[arg(long)]
    due: Option<String>,
    #[arg(long)]
    contact: Option<String>,
}

impl TaskFields {
    fn apply(self, form: &mut TaskForm) {
        let fields = [
            (self.title, &mut form.title),
            (self.due, &mut form.due_date),
            (self.contact, &mut form.contact_id),
        ];
        for (value, slot) in fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

#[derive(Subcommand)]
enum TaskCommand {
    Add(TaskFields),
    Edit {
        id: i64,
        #[command(flatten)]
        fields: TaskFields,
        #[arg(long)]
        completed: Option<bool>,
    },
    /// Mark complete, or reopen a completed task
    Toggle {
        id: i64,
    },
    Delete {
        id: i64,
    },
}

fn init_logging(debug: bool) {
    // Logs go to the systemd user journal (`journalctl --user -t crm -f`).
    // Wrapper filters: crm targets at info/debug, everything else at warn.
    struct FilteredJournal {
        inner: systemd_journal_logger::JournalLog,
    }

    impl log::Log for FilteredJournal {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            if metadata.target().starts_with("crm") {
                let max = if crm::debug_logging() {
                    log::LevelFilter::Debug
                } else {
                    log::LevelFilter::Info
                };
                metadata.level() <= max
            } else {
                metadata.level() <= log::LevelFilter::Warn
            }
        }
        fn log(&self, record: &log::Record) {
            if self.enabled(record.metadata()) {
                self.inner.log(record);
            }
        }
        fn flush(&self) {
            self.inner.flush();
        }
    }

    crm::set_debug_logging(debug);

    let journal = match systemd_journal_logger::JournalLog::new() {
        Ok(journal) => journal.with_syslog_identifier("crm".to_string()),
        Err(_) => return,
    };
    if log::set_boxed_logger(Box::new(FilteredJournal { inner: journal })).is_ok() {
        // Global max must be Debug so crm debug logs can pass through when toggled
        log::set_max_level(log::LevelFilter::Debug);
    }
}

fn loose(value: serde_json::Value) -> Loose {
    value.as_object().cloned().unwrap_or_default()
}

/// Sample records for `--offline`. Written through the tracked services so
/// the activity log is populated too.
async fn seed(crm: &Crm) -> Result<(), crm::error::ServiceError> {
    let today = Local::now().date_naive();
    let day = |offset: i64| (today + chrono::Duration::days(offset)).format("%Y-%m-%d").to_string();

    for contact in [
        json!({"name": "Ada Lovelace", "company": "Analytical Engines", "email": "ada@engines.example", "tags": "vip,math"}),
        json!({"name": "Grace Hopper", "company": "Navy", "phone": "555-0100", "tags": "compilers"}),
    ] {
        crm.contacts.create(&loose(contact)).await?;
    }
    for deal in [
        json!({"title": "Engine retrofit", "value": 12000, "stage": "Proposal", "probability": 60, "expectedCloseDate": day(30), "contactId": 1}),
        json!({"title": "COBOL training", "value": 4500, "stage": "Qualified", "probability": 30, "expectedCloseDate": day(45), "contactId": 2}),
    ] {
        crm.deals.create(&loose(deal)).await?;
    }
    for task in [
        json!({"title": "Send retrofit proposal", "dueDate": day(-1), "contactId": 1}),
        json!({"title": "Book training room", "dueDate": day(0), "contactId": 2}),
        json!({"title": "Quarterly review", "dueDate": day(7)}),
    ] {
        crm.tasks.create(&loose(task)).await?;
    }
    Ok(())
}

async fn connect(cli: &Cli, config: &CrmConfig) -> Result<Crm, Box<dyn std::error::Error>> {
    let client: Arc<dyn RecordClient> = if cli.offline {
        Arc::new(MemoryRecordClient::new())
    } else {
        Arc::new(HttpRecordClient::from_config(config).await?)
    };
    let crm = Crm::new(client, config.page_limit);
    if cli.offline {
        seed(&crm).await?;
    }
    Ok(crm)
}

fn report(toasts: &[Toast]) -> ExitCode {
    for toast in toasts {
        println!("{}", toast);
    }
    if toasts.iter().any(|t| t.level == ToastLevel::Error) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn failed(text: &str) -> ExitCode {
    report(&[Toast::error(text)])
}

async fn find<E: Entity>(
    service: &crm::services::TrackedService<E>,
    id: i64,
) -> Result<E, Box<dyn std::error::Error>> {
    Ok(service.get_by_id(id).await?)
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let config = CrmConfig::resolve(&config_path)?;
    init_logging(cli.verbose || config.debug_logging);
    log::debug!("Using config {}", config_path.display());

    match &cli.command {
        Commands::Config {
            set_url,
            set_project,
            set_page_limit,
            set_debug,
        } => {
            let changed = set_url.is_some()
                || set_project.is_some()
                || set_page_limit.is_some()
                || set_debug.is_some();
            let config = if changed {
                CrmConfig::update_file(&config_path, |file| {
                    if let Some(url) = set_url {
                        file.base_url = url.trim().to_string();
                    }
                    if let Some(project) = set_project {
                        file.project_id = project.trim().to_string();
                    }
                    if let Some(limit) = set_page_limit {
                        file.page_limit = *limit;
                    }
                    if let Some(debug) = set_debug {
                        file.debug_logging = *debug;
                    }
                })?;
                println!("Saved {}", config_path.display());
                CrmConfig::resolve(&config_path)?
            } else {
                config
            };
            println!("config file:  {}", config_path.display());
            println!("base url:     {}", config.base_url);
            println!("project id:   {}", config.project_id);
            println!("page limit:   {}", config.page_limit);
            println!("debug logs:   {}", config.debug_logging);
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Login { key } => {
            if config.base_url.is_empty() {
                return Ok(failed("Set base_url in the config file first"));
            }
            keyring::store_api_key(&config.base_url, key).await?;
            return Ok(report(&[Toast::success(format!(
                "API key stored for {}",
                config.base_url
            ))]));
        }
        Commands::Logout => {
            if config.base_url.is_empty() {
                return Ok(failed("No record store URL configured"));
            }
            keyring::delete_api_key(&config.base_url).await?;
            return Ok(report(&[Toast::success(format!(
                "API key removed for {}",
                config.base_url
            ))]));
        }
        _ => {}
    }

    let crm = connect(&cli, &config).await?;
    let now = Local::now().naive_local();

    let code = match cli.command {
        Commands::Contacts { search } => {
            let mut page = ContactsPage::new(&crm);
            page.load().await;
            if let Some(error) = &page.error {
                return Ok(failed(error));
            }
            page.set_search(search.as_deref().unwrap_or_default());
            for contact in page.visible() {
                println!(
                    "{:>4}  {:<24} {:<24} {:<28} {}",
                    contact.id,
                    contact.name,
                    contact.company,
                    contact.email,
                    contact.tags.join(", ")
                );
            }
            ExitCode::SUCCESS
        }

        Commands::Contact { command } => {
            let mut layout = Layout::new(crm.clone());
            match command {
                ContactCommand::Add(fields) => {
                    let mut form = ContactForm::default();
                    fields.apply(&mut form);
                    layout.update(Message::OpenModal(ModalTarget::Contact(None))).await;
                    report(&layout.update(Message::SaveContact(form)).await)
                }
                ContactCommand::Edit { id, fields } => {
                    let contact = find(&crm.contacts, id).await?;
                    let mut form = ContactForm::from_record(&contact);
                    fields.apply(&mut form);
                    layout
                        .update(Message::OpenModal(ModalTarget::Contact(Some(contact))))
                        .await;
                    report(&layout.update(Message::SaveContact(form)).await)
                }
                ContactCommand::Delete { id } => {
                    let mut page = ContactsPage::new(&crm);
                    page.load().await;
                    report(&page.delete(id).await)
                }
            }
        }

        Commands::Deals {
            contact: Some(contact_id),
        } => {
            let deals = crm.deals.service().get_by_contact_id(contact_id).await?;
            for deal in &deals {
                println!(
                    "{:>4}  {:<28} ${:>10.2} {:>3}%  {}",
                    deal.id, deal.title, deal.value, deal.probability, deal.stage
                );
            }
            println!("{} deals for contact {}", deals.len(), contact_id);
            ExitCode::SUCCESS
        }

        Commands::Deals { contact: None } => {
            let mut page = DealsPage::new(&crm);
            page.load().await;
            if let Some(error) = &page.error {
                return Ok(failed(error));
            }
            for column in page.pipeline().iter().filter(|c| !c.deals.is_empty()) {
                println!(
                    "{} ({}, total ${:.2}, weighted ${:.2})",
                    column.stage,
                    column.deals.len(),
                    column.total,
                    column.weighted
                );
                for deal in &column.deals {
                    println!(
                        "  {:>4}  {:<28} ${:>10.2} {:>3}%  {}  {}",
                        deal.id,
                        deal.title,
                        deal.value,
                        deal.probability,
                        deal.expected_close_date,
                        page.contact_name(deal).unwrap_or("-")
                    );
                }
            }
            println!("Open pipeline, weighted: ${:.2}", page.open_weighted_value());
            ExitCode::SUCCESS
        }

        Commands::Deal { command } => {
            let mut layout = Layout::new(crm.clone());
            match command {
                DealCommand::Add(fields) => {
                    let mut form = DealForm::default();
                    fields.apply(&mut form);
                    layout.update(Message::OpenModal(ModalTarget::Deal(None))).await;
                    report(&layout.update(Message::SaveDeal(form)).await)
                }
                DealCommand::Edit { id, fields } => {
                    let deal = find(&crm.deals, id).await?;
                    let mut form = DealForm::from_record(&deal);
                    fields.apply(&mut form);
                    layout
                        .update(Message::OpenModal(ModalTarget::Deal(Some(deal))))
                        .await;
                    report(&layout.update(Message::SaveDeal(form)).await)
                }
                DealCommand::Stage { id, stage } => {
                    let mut page = DealsPage::new(&crm);
                    page.load().await;
                    report(&page.move_to_stage(id, DealStage::parse(&stage)).await)
                }
                DealCommand::Delete { id } => {
                    let mut page = DealsPage::new(&crm);
                    page.load().await;
                    report(&page.delete(id).await)
                }
            }
        }

        Commands::Tasks { filter, search } => {
            let mut page = TasksPage::new(&crm);
            page.load().await;
            if let Some(error) = &page.error {
                return Ok(failed(error));
            }
            page.set_filter(filter);
            page.set_search(search.as_deref().unwrap_or_default());

            let stats = page.stats(now);
            println!(
                "{} overdue, {} due today, {} pending, {} completed",
                stats.overdue, stats.today, stats.pending, stats.completed
            );
            for task in page.visible(now) {
                let mark = if task.completed {
                    "x"
                } else if task.is_overdue(now) {
                    "!"
                } else {
                    " "
                };
                println!(
                    "[{}] {:>4}  {:<32} {:<20} {}",
                    mark,
                    task.id,
                    task.title,
                    task.due_date,
                    page.contact_name(task).unwrap_or("-")
                );
            }
            println!("{}", page.summary(now));
            ExitCode::SUCCESS
        }

        Commands::Task { command } => {
            let mut page = TasksPage::new(&crm);
            page.load().await;
            if let Some(error) = &page.error {
                return Ok(failed(error));
            }
            match command {
                TaskCommand::Add(fields) => {
                    let mut form = TaskForm::default();
                    fields.apply(&mut form);
                    page.open_add();
                    report(&page.save(form).await)
                }
                TaskCommand::Edit {
                    id,
                    fields,
                    completed,
                } => {
                    page.open_edit(id);
                    let Some(task) = page.modal.data.as_ref() else {
                        return Ok(failed("Task not found"));
                    };
                    let mut form = TaskForm::from_record(task);
                    fields.apply(&mut form);
                    if let Some(completed) = completed {
                        form.completed = completed;
                    }
                    report(&page.save(form).await)
                }
                TaskCommand::Toggle { id } => {
                    if !page.tasks.iter().any(|t| t.id == id) {
                        return Ok(failed("Task not found"));
                    }
                    report(&page.toggle_complete(id).await)
                }
                TaskCommand::Delete { id } => report(&page.delete(id).await),
            }
        }

        Commands::Activity { contact, deal } => {
            let activities = match (contact, deal) {
                (Some(contact), _) => crm.activities.get_by_contact_id(contact).await?,
                (None, Some(deal)) => crm.activities.get_by_deal_id(deal).await?,
                (None, None) => crm.activities.get_all().await?,
            };
            for activity in activities {
                println!(
                    "{:<26} {:<5} {}",
                    activity.timestamp,
                    activity.kind.map(|k| k.as_str()).unwrap_or("-"),
                    activity.description
                );
            }
            ExitCode::SUCCESS
        }

        Commands::Config { .. } | Commands::Login { .. } | Commands::Logout => ExitCode::SUCCESS,
    };

    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use clap::error::ErrorKind;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn activity_takes_one_of_contact_or_deal() {
        let err = Cli::try_parse_from(["crm", "activity", "--contact", "1", "--deal", "2"])
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);

        let cli = Cli::try_parse_from(["crm", "activity", "--deal", "2"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Activity {
                contact: None,
                deal: Some(2)
            }
        ));
    }

    #[test]
    fn config_and_deal_flags_parse() {
        let cli = Cli::try_parse_from([
            "crm",
            "config",
            "--set-url",
            "https://records.example.com",
            "--set-debug",
            "true",
        ])
        .unwrap();
        match cli.command {
            Commands::Config {
                set_url,
                set_project,
                set_debug,
                ..
            } => {
                assert_eq!(set_url.as_deref(), Some("https://records.example.com"));
                assert_eq!(set_project, None);
                assert_eq!(set_debug, Some(true));
            }
            _ => panic!("expected config command"),
        }

        let cli = Cli::try_parse_from(["crm", "--offline", "deals", "--contact", "3"]).unwrap();
        assert!(cli.offline);
        assert!(matches!(cli.command, Commands::Deals { contact: Some(3) }));
        assert!(matches!(
            Cli::try_parse_from(["crm", "logout"]).unwrap().command,
            Commands::Logout
        ));
    }
}

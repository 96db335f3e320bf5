use shared_types::{Contact, SendReport};
use std::io::{self, Write};
use tagsend_core::storage::ContactStoreOptions;
use tagsend_core::{
    build_driver, ChatDriver, ContactStore, DispatchOptions, Dispatcher, FriendDetailsStore,
    SendPlan, Settings,
};

/// Everything one `tagsend` invocation works with, built once from the
/// loaded settings.
pub struct App {
    pub settings: Settings,
    pub contacts: ContactStore,
    pub friends: FriendDetailsStore,
    pub dispatcher: Dispatcher,
}

impl App {
    pub fn new(settings: Settings) -> Self {
        let driver = build_driver(&settings.app().driver);
        Self::with_driver(settings, driver)
    }

    pub fn with_driver(settings: Settings, driver: Box<dyn ChatDriver>) -> Self {
        let config = settings.app();
        let contacts = ContactStore::open(ContactStoreOptions::from(&config.contacts));
        let friends = FriendDetailsStore::open(config.friend_details.data_file.clone());
        let dispatcher = Dispatcher::new(driver, DispatchOptions::from(&config.message));

        tracing::info!(
            contacts = contacts.contact_count(),
            driver = dispatcher.driver().name(),
            "tagsend ready"
        );

        Self {
            settings,
            contacts,
            friends,
            dispatcher,
        }
    }
}

pub fn write_report(out: &mut dyn Write, report: &SendReport) -> io::Result<()> {
    if let Some(error) = &report.error {
        return writeln!(out, "Not sent: {error}");
    }

    writeln!(
        out,
        "Sent {}/{} in {:.1}s",
        report.sent_count, report.total_count, report.duration_seconds
    )?;
    for failure in &report.failures {
        writeln!(out, "  failed: {} ({})", failure.name, failure.reason)?;
    }
    Ok(())
}

pub fn write_contacts(out: &mut dyn Write, contacts: &[Contact]) -> io::Result<()> {
    if contacts.is_empty() {
        return writeln!(out, "No contacts.");
    }

    for contact in contacts {
        let tags = if contact.tags.is_empty() {
            "-".to_string()
        } else {
            contact.tags.join(", ")
        };
        writeln!(out, "{} [{}] tags: {}", contact.name, contact.contact_type, tags)?;
    }
    writeln!(out, "{} contact(s)", contacts.len())
}

pub fn write_plan(out: &mut dyn Write, plan: &SendPlan) -> io::Result<()> {
    writeln!(
        out,
        "About to send to {} contact(s) tagged '{}':",
        plan.contacts.len(),
        plan.tag
    )?;
    for contact in &plan.contacts {
        writeln!(out, "  {}", contact.name)?;
    }
    for warning in &plan.warnings {
        writeln!(out, "warning: {warning}")?;
    }
    writeln!(out, "Message:\n{}", plan.message)
}

use crate::driver::ChatDriver;
use crate::settings::MessageConfig;
use crate::storage::ContactStore;
use crate::validator::validate_message;
use chrono::Local;
use shared_types::{
    timestamp_now, Contact, SendFailure, SendReport, SendStatistics, SYSTEM_CONTACT_NAME,
};
use std::time::Duration;

pub const REASON_DRIVER_FAILED: &str = "driver reported failure";
pub const REASON_CONNECT_FAILED: &str = "chat client connection failed";

/// Why a batch was refused before any message went out.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("{0}")]
    InvalidMessage(String),

    #[error("no matching contacts for tag '{0}'")]
    NoMatchingContacts(String),

    #[error("cancelled by user")]
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct DispatchOptions {
    pub send_interval: Duration,
    pub exact_match: bool,
    pub confirm_before_send: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            send_interval: Duration::from_secs(2),
            exact_match: true,
            confirm_before_send: true,
        }
    }
}

impl From<&MessageConfig> for DispatchOptions {
    /// Negative or NaN intervals mean no pause. Values that do not fit a
    /// `Duration` fall back to the default interval.
    fn from(config: &MessageConfig) -> Self {
        let defaults = Self::default();
        let send_interval = match Duration::try_from_secs_f64(config.send_interval.max(0.0)) {
            Ok(interval) => interval,
            Err(e) => {
                tracing::warn!(
                    "Unusable send interval {}: {}, using {:?}",
                    config.send_interval,
                    e,
                    defaults.send_interval
                );
                defaults.send_interval
            }
        };
        Self {
            send_interval,
            exact_match: config.exact_match,
            confirm_before_send: config.confirm_before_send,
        }
    }
}

/// Waits between two sends.
pub trait Pacer {
    fn pause(&mut self, interval: Duration);
}

/// Blocks the current thread for the interval.
#[derive(Debug, Default)]
pub struct ThreadSleep;

impl Pacer for ThreadSleep {
    fn pause(&mut self, interval: Duration) {
        if !interval.is_zero() {
            std::thread::sleep(interval);
        }
    }
}

/// A validated batch: the message and the contacts it resolved to.
#[derive(Debug, Clone)]
pub struct SendPlan {
    pub tag: String,
    pub message: String,
    pub contacts: Vec<Contact>,
    pub warnings: Vec<String>,
}

/// Sends one message to many contacts, one at a time.
///
/// Owns the single driver handle, connects it lazily on first use and keeps
/// the statistics of the most recent run.
pub struct Dispatcher {
    driver: Box<dyn ChatDriver>,
    pacer: Box<dyn Pacer>,
    options: DispatchOptions,
    connected: bool,
    statistics: SendStatistics,
}

impl Dispatcher {
    pub fn new(driver: Box<dyn ChatDriver>, options: DispatchOptions) -> Self {
        Self {
            driver,
            pacer: Box::new(ThreadSleep),
            options,
            connected: false,
            statistics: SendStatistics::default(),
        }
    }

    pub fn with_pacer(mut self, pacer: Box<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    pub fn driver(&self) -> &dyn ChatDriver {
        self.driver.as_ref()
    }

    pub fn driver_mut(&mut self) -> &mut dyn ChatDriver {
        self.driver.as_mut()
    }

    /// Statistics of the last batch.
    pub fn statistics(&self) -> &SendStatistics {
        &self.statistics
    }

    /// Validates the message and resolves the tag. Nothing is sent.
    pub fn prepare(
        &self,
        store: &ContactStore,
        tag: &str,
        message: &str,
    ) -> Result<SendPlan, DispatchError> {
        let validation = validate_message(message);
        if !validation.valid {
            let reason = validation.reason.unwrap_or_default();
            tracing::warn!("Rejected message for tag '{}': {}", tag, reason);
            return Err(DispatchError::InvalidMessage(reason));
        }
        for warning in &validation.warnings {
            tracing::warn!("{}", warning);
        }

        let contacts = store.get_by_tag(tag);
        if contacts.is_empty() {
            return Err(DispatchError::NoMatchingContacts(tag.to_string()));
        }

        Ok(SendPlan {
            tag: tag.to_string(),
            message: message.to_string(),
            contacts,
            warnings: validation.warnings,
        })
    }

    pub fn execute(&mut self, plan: &SendPlan) -> SendReport {
        let names: Vec<String> = plan.contacts.iter().map(|c| c.name.clone()).collect();
        tracing::info!("Sending to {} contacts tagged '{}'", names.len(), plan.tag);
        self.send_batch(&names, &plan.message)
    }

    /// Validates, resolves and sends. Assumes the caller already confirmed.
    pub fn send_by_tag(&mut self, store: &ContactStore, tag: &str, message: &str) -> SendReport {
        match self.prepare(store, tag, message) {
            Ok(plan) => self.execute(&plan),
            Err(e) => SendReport::rejected(e.to_string()),
        }
    }

    /// Like [`Dispatcher::send_by_tag`], but asks `confirm` first when
    /// confirmation is enabled.
    pub fn send_by_tag_confirmed<F>(
        &mut self,
        store: &ContactStore,
        tag: &str,
        message: &str,
        confirm: F,
    ) -> SendReport
    where
        F: FnOnce(&SendPlan) -> bool,
    {
        let plan = match self.prepare(store, tag, message) {
            Ok(plan) => plan,
            Err(e) => return SendReport::rejected(e.to_string()),
        };

        if self.options.confirm_before_send && !confirm(&plan) {
            tracing::info!("Batch for tag '{}' cancelled by user", tag);
            return SendReport::rejected(DispatchError::Cancelled.to_string());
        }

        self.execute(&plan)
    }

    /// Sends `message` to each name in order, pausing between sends.
    /// Every name is attempted exactly once; failures are collected, never
    /// raised.
    pub fn send_batch(&mut self, names: &[String], message: &str) -> SendReport {
        self.statistics = SendStatistics::start(names.len());
        tracing::info!("Starting batch send to {} contacts", names.len());

        for (index, name) in names.iter().enumerate() {
            match self.send_to_contact(name, message) {
                Ok(()) => self.statistics.record_success(),
                Err(reason) => self.statistics.record_failure(SendFailure {
                    name: name.clone(),
                    reason,
                    timestamp: timestamp_now(),
                }),
            }

            if index + 1 < names.len() {
                self.pacer.pause(self.options.send_interval);
            }
        }

        self.statistics.finish();
        let report = SendReport::from_statistics(&self.statistics);
        tracing::info!(
            "Batch finished - sent: {}, failed: {}, took {:.1}s",
            report.sent_count,
            report.failed_count,
            report.duration_seconds
        );
        report
    }

    /// One send. `Err` carries the failure reason for the statistics.
    pub fn send_to_contact(&mut self, name: &str, message: &str) -> Result<(), String> {
        if !self.ensure_connected() {
            return Err(REASON_CONNECT_FAILED.to_string());
        }

        tracing::info!("Sending message to {}", name);
        match self
            .driver
            .send_message(name, message, self.options.exact_match)
        {
            Ok(true) => {
                tracing::info!("Message sent to {}", name);
                Ok(())
            }
            Ok(false) => {
                tracing::warn!("Driver failed to send to {}", name);
                Err(REASON_DRIVER_FAILED.to_string())
            }
            Err(e) => {
                tracing::error!("Error sending to {}: {}", name, e);
                Err(format!("send error: {e}"))
            }
        }
    }

    /// Re-sends `message` once to every contact that failed in the last
    /// batch. The statistics are replaced by those of the retry.
    pub fn retry_failed(&mut self, message: &str) -> SendReport {
        let names: Vec<String> = self
            .statistics
            .failed_contacts
            .iter()
            .map(|f| f.name.clone())
            .collect();

        if names.is_empty() {
            tracing::info!("No failed sends to retry");
            return SendReport::empty();
        }

        let validation = validate_message(message);
        if !validation.valid {
            return SendReport::rejected(
                DispatchError::InvalidMessage(validation.reason.unwrap_or_default()).to_string(),
            );
        }

        tracing::info!("Retrying {} failed sends", names.len());
        self.send_batch(&names, message)
    }

    /// Sends a timestamped probe message, by default to the chat client's
    /// built-in file transfer conversation.
    pub fn send_test_message(&mut self, contact: Option<&str>) -> bool {
        let contact = contact.unwrap_or(SYSTEM_CONTACT_NAME);
        let message = format!(
            "tagsend test message\ntime: {}",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );

        match self.send_to_contact(contact, &message) {
            Ok(()) => {
                tracing::info!("Test message sent to {}", contact);
                true
            }
            Err(reason) => {
                tracing::error!("Test message to {} failed: {}", contact, reason);
                false
            }
        }
    }

    fn ensure_connected(&mut self) -> bool {
        if self.connected {
            return true;
        }

        tracing::info!("Connecting to chat client via '{}'", self.driver.name());
        match self.driver.connect() {
            Ok(true) => {
                tracing::info!("Chat client connected");
                self.connected = true;
            }
            Ok(false) => tracing::error!("Chat client refused the connection"),
            Err(e) => tracing::error!("Failed to connect to chat client: {}", e),
        }
        self.connected
    }
}

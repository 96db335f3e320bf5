use super::{ChatDriver, DriverCapabilities, DriverError};

/// Logs every message instead of sending it. The default driver, so a fresh
/// install never messages anyone by accident.
#[derive(Debug, Default)]
pub struct DryRunDriver {
    sent: usize,
}

impl DryRunDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> usize {
        self.sent
    }
}

impl ChatDriver for DryRunDriver {
    fn name(&self) -> &str {
        "dry-run"
    }

    fn capabilities(&self) -> DriverCapabilities {
        DriverCapabilities {
            send_message: true,
            friend_details: false,
        }
    }

    fn connect(&mut self) -> Result<bool, DriverError> {
        tracing::info!("Dry-run driver connected");
        Ok(true)
    }

    fn send_message(
        &mut self,
        contact: &str,
        text: &str,
        exact_match: bool,
    ) -> Result<bool, DriverError> {
        self.sent += 1;
        tracing::info!(
            contact,
            exact_match,
            chars = text.chars().count(),
            "[dry-run] would send message"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dry_run_always_succeeds() {
        let mut driver = DryRunDriver::new();
        assert!(driver.connect().unwrap());
        assert!(driver.send_message("Alice", "hi", true).unwrap());
        assert!(driver.send_message("Bob", "hi", false).unwrap());
        assert_eq!(driver.sent(), 2);
        assert!(matches!(
            driver.friend_details(None),
            Err(DriverError::Unsupported(_))
        ));
    }
}

use super::{ChatDriver, DriverCapabilities, DriverError};
use shared_types::FriendDetail;
use std::io::Write;
use std::process::{Command, Output, Stdio};

/// Bridges to an external helper program that owns the chat client
/// automation. Protocol, with `<args>` taken from the config:
///
/// ```text
/// <program> <args> connect                     exit 0 = connected
/// <program> <args> send <contact> [--exact]    message on stdin, exit 0 = sent
/// <program> <args> friends [--limit N]         JSON array of friends on stdout
/// ```
#[derive(Debug, Clone)]
pub struct CommandDriver {
    program: String,
    args: Vec<String>,
}

impl CommandDriver {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn command(&self, action: &str) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).arg(action);
        command
    }

    fn run(&self, mut command: Command, stdin: Option<&str>) -> Result<Output, DriverError> {
        command
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|source| DriverError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        if let (Some(text), Some(mut pipe)) = (stdin, child.stdin.take()) {
            // A helper that exits early closes the pipe; its exit status
            // still decides the outcome.
            match pipe.write_all(text.as_bytes()) {
                Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e.into()),
                _ => {}
            }
        }

        Ok(child.wait_with_output()?)
    }
}

impl ChatDriver for CommandDriver {
    fn name(&self) -> &str {
        &self.program
    }

    fn capabilities(&self) -> DriverCapabilities {
        DriverCapabilities {
            send_message: true,
            friend_details: true,
        }
    }

    fn connect(&mut self) -> Result<bool, DriverError> {
        let output = self.run(self.command("connect"), None)?;
        if !output.status.success() {
            tracing::warn!(
                "Driver connect failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(output.status.success())
    }

    fn send_message(
        &mut self,
        contact: &str,
        text: &str,
        exact_match: bool,
    ) -> Result<bool, DriverError> {
        let mut command = self.command("send");
        command.arg(contact);
        if exact_match {
            command.arg("--exact");
        }

        let output = self.run(command, Some(text))?;
        if !output.status.success() {
            tracing::debug!(
                "Driver send to {} exited with {}: {}",
                contact,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(output.status.success())
    }

    fn friend_details(&mut self, limit: Option<usize>) -> Result<Vec<FriendDetail>, DriverError> {
        let mut command = self.command("friends");
        if let Some(limit) = limit {
            command.arg("--limit").arg(limit.to_string());
        }

        let output = self.run(command, None)?;
        if !output.status.success() {
            return Err(DriverError::Failed {
                action: "friends",
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| DriverError::MalformedOutput(e.to_string()))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    const BRIDGE: &str = r#"
case "$1" in
  connect) exit 0 ;;
  send)
    message=$(cat)
    [ "$2" = "Alice" ] && [ "$3" = "--exact" ] && [ "$message" = "hello there" ]
    ;;
  friends)
    if [ "$2" = "--limit" ]; then
      echo '[{"NickName": "Ann", "Remark": "school"}]'
    else
      echo 'not json'
    fi
    ;;
  *) exit 2 ;;
esac
"#;

    fn bridge() -> CommandDriver {
        CommandDriver::new(
            "sh",
            vec!["-c".to_string(), BRIDGE.to_string(), "bridge".to_string()],
        )
    }

    #[test]
    fn test_connect_and_send_map_exit_status() {
        let mut driver = bridge();
        assert!(driver.connect().unwrap());
        assert!(driver.send_message("Alice", "hello there", true).unwrap());
        assert!(!driver.send_message("Alice", "hello there", false).unwrap());
        assert!(!driver.send_message("Bob", "hello there", true).unwrap());
    }

    #[test]
    fn test_friend_details_parses_stdout() {
        let mut driver = bridge();
        let friends = driver.friend_details(Some(1)).unwrap();
        assert_eq!(friends.len(), 1);
        assert_eq!(friends[0].nickname, "Ann");
        assert_eq!(friends[0].extra["Remark"], "school");

        assert!(matches!(
            driver.friend_details(None),
            Err(DriverError::MalformedOutput(_))
        ));
    }

    #[test]
    fn test_missing_program_is_a_spawn_error() {
        let mut driver = CommandDriver::new("tagsend-no-such-bridge-program", Vec::new());
        assert!(matches!(driver.connect(), Err(DriverError::Spawn { .. })));
        assert!(matches!(
            driver.send_message("Alice", "hi", true),
            Err(DriverError::Spawn { .. })
        ));
    }
}

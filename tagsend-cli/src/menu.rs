use crate::app::{write_contacts, write_plan, write_report, App};
use std::io::{self, BufRead, Write};
use tagsend_core::SendPlan;

const MENU: &str = "
==== tagsend ====
1. Send by tag
2. List contacts
3. Manage tags
4. Add contact
5. Sync contacts
6. Get friend details
0. Exit";

/// Line-oriented prompt over any reader/writer pair.
pub struct Prompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn output(&mut self) -> &mut W {
        &mut self.output
    }

    /// Trimmed answer, or `None` once input is exhausted.
    pub fn ask(&mut self, label: &str) -> io::Result<Option<String>> {
        write!(self.output, "{label}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Only an explicit `y`, `yes` or `是` counts as consent.
    pub fn confirm(&mut self, label: &str) -> io::Result<bool> {
        let answer = self.ask(&format!("{label} [y/N]: "))?;
        Ok(matches!(
            answer.as_deref().map(str::to_lowercase).as_deref(),
            Some("y" | "yes" | "是")
        ))
    }

    pub fn confirm_plan(&mut self, plan: &SendPlan) -> bool {
        let shown = write_plan(&mut self.output, plan);
        shown.is_ok() && self.confirm("Send now?").unwrap_or(false)
    }
}

/// Runs the interactive menu until `0` or end of input.
pub fn run<R: BufRead, W: Write>(app: &mut App, prompt: &mut Prompt<R, W>) -> io::Result<()> {
    loop {
        writeln!(prompt.output(), "{MENU}")?;
        let Some(choice) = prompt.ask("Choose: ")? else {
            break;
        };

        match choice.as_str() {
            "1" => send_by_tag(app, prompt)?,
            "2" => list_contacts(app, prompt)?,
            "3" => manage_tags(app, prompt)?,
            "4" => add_contact(app, prompt)?,
            "5" => sync_contacts(app, prompt)?,
            "6" => friend_details(app, prompt)?,
            "0" => {
                writeln!(prompt.output(), "Bye.")?;
                break;
            }
            other => writeln!(prompt.output(), "Unknown choice '{other}'")?,
        }
    }
    Ok(())
}

fn send_by_tag<R: BufRead, W: Write>(app: &mut App, prompt: &mut Prompt<R, W>) -> io::Result<()> {
    let Some(tag) = prompt.ask("Tag: ")? else {
        return Ok(());
    };
    let Some(message) = prompt.ask("Message: ")? else {
        return Ok(());
    };

    let report = app
        .dispatcher
        .send_by_tag_confirmed(&app.contacts, &tag, &message, |plan| {
            prompt.confirm_plan(plan)
        });
    write_report(prompt.output(), &report)?;

    if report.failed_count > 0 && prompt.confirm("Retry failed contacts?")? {
        let retried = app.dispatcher.retry_failed(&message);
        write_report(prompt.output(), &retried)?;
    }
    Ok(())
}

fn list_contacts<R: BufRead, W: Write>(app: &App, prompt: &mut Prompt<R, W>) -> io::Result<()> {
    let Some(tag) = prompt.ask("Tag (empty for all): ")? else {
        return Ok(());
    };
    let contacts = if tag.is_empty() {
        app.contacts.list_all()
    } else {
        app.contacts.get_by_tag(&tag)
    };
    write_contacts(prompt.output(), &contacts)
}

fn manage_tags<R: BufRead, W: Write>(app: &mut App, prompt: &mut Prompt<R, W>) -> io::Result<()> {
    let tags: Vec<String> = app.contacts.all_tags().into_iter().collect();
    writeln!(
        prompt.output(),
        "Tags: {}",
        if tags.is_empty() { "-".to_string() } else { tags.join(", ") }
    )?;

    let Some(name) = prompt.ask("Contact name: ")? else {
        return Ok(());
    };
    match app.contacts.get(&name) {
        Some(contact) => {
            let current = contact.tags.join(", ");
            writeln!(prompt.output(), "Current tags: {current}")?;
        }
        None => {
            writeln!(prompt.output(), "No contact named '{name}'")?;
            return Ok(());
        }
    }

    let Some(action) = prompt.ask("(a)dd or (r)emove tag: ")? else {
        return Ok(());
    };
    let Some(tag) = prompt.ask("Tag: ")? else {
        return Ok(());
    };

    let changed = match action.as_str() {
        "a" | "add" => app.contacts.add_tag(&name, &tag),
        "r" | "remove" => app.contacts.remove_tag(&name, &tag),
        other => {
            writeln!(prompt.output(), "Unknown action '{other}'")?;
            return Ok(());
        }
    };
    if changed {
        writeln!(prompt.output(), "Tags updated.")
    } else {
        writeln!(prompt.output(), "Nothing changed.")
    }
}

fn add_contact<R: BufRead, W: Write>(app: &mut App, prompt: &mut Prompt<R, W>) -> io::Result<()> {
    let Some(name) = prompt.ask("Name: ")? else {
        return Ok(());
    };
    let Some(contact_type) = prompt.ask("Type [friend]: ")? else {
        return Ok(());
    };
    let Some(tags) = prompt.ask("Tags (comma separated): ")? else {
        return Ok(());
    };

    let contact_type = if contact_type.is_empty() {
        "friend"
    } else {
        contact_type.as_str()
    };
    let tags: Vec<String> = tags
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect();

    if app.contacts.add_contact(&name, contact_type, &tags) {
        writeln!(prompt.output(), "Added {name}.")
    } else {
        writeln!(prompt.output(), "Could not add '{name}'.")
    }
}

fn sync_contacts<R: BufRead, W: Write>(app: &mut App, prompt: &mut Prompt<R, W>) -> io::Result<()> {
    let ok = app.contacts.sync_from_driver(app.dispatcher.driver());
    writeln!(
        prompt.output(),
        "{} ({} contacts)",
        if ok { "Sync finished" } else { "Sync failed" },
        app.contacts.contact_count()
    )
}

fn friend_details<R: BufRead, W: Write>(
    app: &mut App,
    prompt: &mut Prompt<R, W>,
) -> io::Result<()> {
    let Some(limit) = prompt.ask("How many (empty for all): ")? else {
        return Ok(());
    };
    let limit = match limit.parse::<usize>() {
        Ok(n) => Some(n),
        Err(_) if limit.is_empty() => None,
        Err(_) => {
            writeln!(prompt.output(), "Not a number: '{limit}'")?;
            return Ok(());
        }
    };

    let fetched = app.friends.fetch(app.dispatcher.driver_mut(), limit);
    if fetched.is_empty() {
        return writeln!(prompt.output(), "No friend details available.");
    }
    for friend in &fetched {
        writeln!(prompt.output(), "  {}", friend.nickname)?;
    }
    writeln!(prompt.output(), "Fetched {} friend(s).", fetched.len())?;

    if prompt.confirm("Import them as contacts?")? {
        match app.friends.sync_to_contacts(&mut app.contacts) {
            Ok(added) => writeln!(prompt.output(), "Imported {added} new contact(s).")?,
            Err(e) => writeln!(prompt.output(), "Import failed: {e}")?,
        }
    }
    Ok(())
}

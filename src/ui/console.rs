//! Terminal front end for the kiosk.

use std::io::{self, Write};

use tokio::io::{AsyncBufReadExt, BufReader};

use super::tables::{format_number, Table};
use super::{KioskScreen, KioskView, KioskViewState};
use crate::app::MessageSender;
use crate::state::{KioskEvent, SelectionLists};

pub const HELP: &str = "\
Commands:
  list                              show drivers, vehicles and bowsers
  login <driver> <vehicle> <bowser> authenticate with the selected ids
  photo | unphoto                   attach or remove the odometer photo
  odo <reading>                     submit the odometer reading in km
  yes | no                          answer a lower-reading confirmation
  cancel | done                     start over
  help                              show this help
  quit                              leave the kiosk";

/// One line of kiosk input
#[derive(Debug, Clone)]
pub enum ConsoleCommand {
    Event(KioskEvent),
    Help,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse_command(line: &str) -> ConsoleCommand {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return ConsoleCommand::Empty;
    };
    let args: Vec<&str> = words.collect();

    let event = match verb.to_ascii_lowercase().as_str() {
        "list" => KioskEvent::LoadSelections,
        "login" | "auth" => {
            let arg = |i: usize| args.get(i).map(|s| s.to_string()).unwrap_or_default();
            KioskEvent::Authenticate {
                driver_id: arg(0),
                vehicle_id: arg(1),
                bowser_id: arg(2),
            }
        }
        "photo" => KioskEvent::AttachPhoto,
        "unphoto" | "remove-photo" => KioskEvent::DetachPhoto,
        "odo" | "odometer" | "submit" => KioskEvent::SubmitOdometer {
            input: args.join(" "),
        },
        "yes" | "y" => KioskEvent::ConfirmDecrease,
        "no" | "n" => KioskEvent::CancelDecrease,
        "cancel" | "done" | "reset" => KioskEvent::Reset,
        "help" | "?" => return ConsoleCommand::Help,
        "quit" | "exit" => return ConsoleCommand::Quit,
        _ => return ConsoleCommand::Unknown(line.trim().to_string()),
    };
    ConsoleCommand::Event(event)
}

fn selection_lines(lists: &SelectionLists) -> Vec<String> {
    let mut drivers = Table::new(vec!["Driver", "Name"]);
    for driver in &lists.drivers {
        drivers.push(vec![driver.driver_id.clone(), driver.name.clone()]);
    }
    let mut vehicles = Table::new(vec!["Vehicle", "Name", "Registration"]);
    for vehicle in &lists.vehicles {
        vehicles.push(vec![
            vehicle.vehicle_id.clone(),
            vehicle.name.clone(),
            vehicle.registration.clone().unwrap_or_default(),
        ]);
    }
    let mut bowsers = Table::new(vec!["Bowser", "Name"]);
    for bowser in &lists.bowsers {
        bowsers.push(vec![bowser.bowser_id.clone(), bowser.name.clone()]);
    }

    vec![drivers.render(), vehicles.render(), bowsers.render()]
}

/// Lines to print when moving from `prev` to `next`
pub fn describe(prev: Option<&KioskViewState>, next: &KioskViewState) -> Vec<String> {
    let mut lines = Vec::new();
    let screen_changed = prev.map_or(true, |p| p.screen != next.screen);
    let changed = |f: fn(&KioskViewState) -> bool| prev.map_or(true, |p| f(p) != f(next));

    if screen_changed {
        match next.screen {
            KioskScreen::Authentication => {
                lines.push("== Driver authentication ==".to_string());
                lines.push("Select with: login <driver> <vehicle> <bowser>".to_string());
            }
            KioskScreen::OdometerEntry => {
                lines.push("== Odometer reading ==".to_string());
                if let Some(badge) = &next.driver_badge {
                    lines.push(badge.clone());
                }
                lines.push(format!(
                    "Vehicle: {} ({})",
                    next.vehicle_name.as_deref().unwrap_or_default(),
                    next.vehicle_registration.as_deref().unwrap_or("N/A")
                ));
                if let Some(reading) = next.odometer_prefill {
                    lines.push(format!("Last reading: {} km", format_number(reading)));
                }
                if let Some(min) = next.odometer_min {
                    lines.push(format!(
                        "Readings below {} km need confirmation",
                        format_number(min)
                    ));
                }
                lines.push("Enter: odo <reading>, photo / unphoto, cancel".to_string());
            }
            KioskScreen::Confirmation => {
                lines.push("== Transaction recorded ==".to_string());
                if let Some(id) = &next.transaction_id {
                    lines.push(format!("Transaction ID: {}", id));
                }
                lines.push("Type done to finish now".to_string());
            }
        }
    }

    if next.screen == KioskScreen::Authentication {
        if let Some(lists) = &next.selections {
            if screen_changed || prev.is_some_and(|p| p.selections.as_ref() != Some(lists)) {
                lines.extend(selection_lines(lists));
            }
        }
    }

    if next.loading && changed(|v| v.loading) {
        lines.push("Verifying...".to_string());
    }

    if !screen_changed && next.screen == KioskScreen::OdometerEntry && changed(|v| v.photo_attached) {
        lines.push(if next.photo_attached {
            "Photo attached".to_string()
        } else {
            "Photo removed".to_string()
        });
    }

    if let Some(seconds) = next.countdown {
        if prev.map_or(true, |p| p.countdown != next.countdown) {
            lines.push(format!("Returning to start in {}s", seconds));
        }
    }

    if let Some(error) = &next.error {
        if prev.map_or(true, |p| p.error.as_ref() != Some(error)) {
            lines.push(format!("! {}", error));
        }
    }

    if let Some(prompt) = &next.confirmation_prompt {
        if prev.map_or(true, |p| p.confirmation_prompt.as_ref() != Some(prompt)) {
            lines.push(format!("? {} [yes/no]", prompt));
        }
    }

    lines
}

/// Kiosk view that prints state changes as text
pub struct ConsoleView<W: Write + Send> {
    out: W,
    last: Option<KioskViewState>,
}

impl ConsoleView<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleView<W> {
    pub fn new(out: W) -> Self {
        Self { out, last: None }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> KioskView for ConsoleView<W> {
    fn render(&mut self, view: &KioskViewState) {
        for line in describe(self.last.as_ref(), view) {
            if let Err(e) = writeln!(self.out, "{}", line) {
                log::warn!("Failed to write kiosk output: {}", e);
                break;
            }
        }
        let _ = self.out.flush();
        self.last = Some(view.clone());
    }
}

/// Forward terminal input to the kiosk until `quit` or end of input
pub async fn read_commands(sender: MessageSender) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::error!("Failed to read kiosk input: {}", e);
                break;
            }
        };

        match parse_command(&line) {
            ConsoleCommand::Event(event) => sender.send_event(event),
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Quit => break,
            ConsoleCommand::Empty => {}
            ConsoleCommand::Unknown(input) => println!("Unknown command: {} (type help)", input),
        }
    }

    sender.shutdown();
}

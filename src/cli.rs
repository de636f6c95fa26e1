//! Interactive console front-end
//!
//! A thin adapter: it reads lines, turns them into service calls and prints
//! the outcome. Generic over its input and output so sessions can be
//! scripted in tests.

use crate::ranking::Results;
use crate::service::VotingService;
use crate::storage::StateStore;
use crate::types::{CandidateForm, VoteRequest};
use crate::{Error, Result};
use std::io::{BufRead, Write};

const RULE: &str = "=============================================";

/// Menu entries, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuOption {
    RegisterCandidate,
    ListCandidates,
    CastVote,
    ShowResults,
    ExportCandidates,
    Exit,
}

impl MenuOption {
    pub const ALL: [MenuOption; 6] = [
        MenuOption::RegisterCandidate,
        MenuOption::ListCandidates,
        MenuOption::CastVote,
        MenuOption::ShowResults,
        MenuOption::ExportCandidates,
        MenuOption::Exit,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MenuOption::RegisterCandidate => "Register candidate",
            MenuOption::ListCandidates => "List candidates",
            MenuOption::CastVote => "Cast vote",
            MenuOption::ShowResults => "Show results",
            MenuOption::ExportCandidates => "Export candidates to JSON",
            MenuOption::Exit => "Exit",
        }
    }

    /// Parse a 1-based menu number
    pub fn from_number(number: usize) -> Option<Self> {
        number.checked_sub(1).and_then(|i| Self::ALL.get(i).copied())
    }
}

/// Console session bound to a voting service
pub struct Console<'a, S: StateStore, R: BufRead, W: Write> {
    service: &'a VotingService<S>,
    input: R,
    output: W,
}

impl<'a, S: StateStore, R: BufRead, W: Write> Console<'a, S, R, W> {
    pub fn new(service: &'a VotingService<S>, input: R, output: W) -> Self {
        Self {
            service,
            input,
            output,
        }
    }

    /// Run the menu loop until the operator exits or input ends
    pub fn run(&mut self) -> Result<()> {
        loop {
            self.print_menu()?;
            let Some(line) = self.prompt("Select an option: ")? else {
                self.say("\nGoodbye!")?;
                return Ok(());
            };

            let option = match line.parse::<usize>() {
                Ok(number) => MenuOption::from_number(number),
                Err(_) => {
                    self.say("Please enter a valid number.\n")?;
                    continue;
                }
            };

            let keep_going = match option {
                Some(MenuOption::RegisterCandidate) => self.register_candidate()?,
                Some(MenuOption::ListCandidates) => self.list_candidates()?,
                Some(MenuOption::CastVote) => self.cast_vote()?,
                Some(MenuOption::ShowResults) => self.show_results()?,
                Some(MenuOption::ExportCandidates) => self.export_candidates()?,
                Some(MenuOption::Exit) => {
                    self.say("\nThank you for using the system!")?;
                    return Ok(());
                }
                None => {
                    self.say("Invalid option. Please try again.\n")?;
                    true
                }
            };

            if !keep_going {
                self.say("\nGoodbye!")?;
                return Ok(());
            }
        }
    }

    fn print_menu(&mut self) -> Result<()> {
        self.say(RULE)?;
        self.say("====== C A N D I D A T E   R E G I S T R Y ======")?;
        self.say(RULE)?;
        for (number, option) in MenuOption::ALL.iter().enumerate() {
            self.say(&format!("{}. {}", number + 1, option.label()))?;
        }
        self.say(RULE)
    }

    /// Each action returns `false` when input ended mid-way
    fn register_candidate(&mut self) -> Result<bool> {
        self.say("\n===== R E G I S T E R   C A N D I D A T E =====")?;
        let Some(nombre) = self.prompt("Candidate name: ")? else { return Ok(false) };
        let Some(partido) = self.prompt("Political party: ")? else { return Ok(false) };
        let Some(periodo) = self.prompt("Term length (years): ")? else { return Ok(false) };
        let Some(gobierno) = self.prompt("Government model: ")? else { return Ok(false) };

        match self
            .service
            .register_candidate(CandidateForm::new(nombre, partido, periodo, gobierno))
        {
            Ok(_) => self.say("Candidate registered successfully!\n")?,
            Err(Error::Validation { .. }) => self.say("All fields are required.\n")?,
            Err(e) => self.report(e)?,
        }
        Ok(true)
    }

    fn list_candidates(&mut self) -> Result<bool> {
        self.say("\n--- CANDIDATE LIST ---")?;
        let candidates = self.service.candidates()?;
        if candidates.is_empty() {
            self.say("No candidates registered.\n")?;
            return Ok(true);
        }

        self.say(&format!("\nTotal candidates: {}\n", candidates.len()))?;
        for (i, candidate) in candidates.iter().enumerate() {
            self.say(&format!("{}. {}", i + 1, candidate))?;
        }
        self.say("")?;
        Ok(true)
    }

    fn cast_vote(&mut self) -> Result<bool> {
        self.say("\n===== C A S T   V O T E =====")?;
        let candidates = self.service.candidates()?;
        if candidates.is_empty() {
            self.say("No candidates registered yet.\n")?;
            return Ok(true);
        }

        let Some(name) = self.prompt("Your name: ")? else { return Ok(false) };
        let Some(age) = self.prompt("Your age: ")? else { return Ok(false) };
        let Some(identity) = self.prompt("National ID number: ")? else { return Ok(false) };

        self.say("")?;
        for (i, candidate) in candidates.iter().enumerate() {
            self.say(&format!("{}. {} ({})", i + 1, candidate.nombre, candidate.partido))?;
        }
        let Some(choice) = self.prompt("Candidate number: ")? else { return Ok(false) };

        match self
            .service
            .cast_vote(VoteRequest::new(name, age, identity, choice))
        {
            Ok(receipt) => {
                self.say(&format!("Vote recorded for {}. Thank you!\n", receipt.candidate_name))?
            }
            Err(e) => self.report(e)?,
        }
        Ok(true)
    }

    fn show_results(&mut self) -> Result<bool> {
        self.say("\n--- RESULTS ---")?;
        let standings = match self.service.results()? {
            Results::NoVotes => {
                self.say("No votes have been cast yet.\n")?;
                return Ok(true);
            }
            Results::Ranked(standings) => standings,
        };

        self.say(&format!("Total votes: {}\n", standings.total()))?;
        for (i, standing) in standings.entries().iter().enumerate() {
            let name = self.candidate_name(&standing.candidate_id)?;
            self.say(&format!(
                "{}. {} - {} votes ({:.2}%)",
                i + 1,
                name,
                standing.votes,
                standing.percentage
            ))?;
        }

        let leaders = standings.leaders();
        if leaders.len() > 1 {
            let mut names = Vec::with_capacity(leaders.len());
            for standing in leaders {
                names.push(self.candidate_name(&standing.candidate_id)?);
            }
            self.say(&format!("\nTie for first place: {}\n", names.join(", ")))?;
        } else {
            let winner = self.candidate_name(&standings.winner().candidate_id)?;
            self.say(&format!("\nWinner: {winner}\n"))?;
        }
        Ok(true)
    }

    fn export_candidates(&mut self) -> Result<bool> {
        let Some(base) = self.prompt("File name (without extension): ")? else { return Ok(false) };
        if base.is_empty() {
            self.say("No file name given.\n")?;
            return Ok(true);
        }

        match self.service.export_candidates(format!("{base}.json")) {
            Ok(path) => self.say(&format!("Data exported to {}\n", path.display()))?,
            Err(e) => self.report(e)?,
        }
        Ok(true)
    }

    fn candidate_name(&self, id: &crate::types::CandidateId) -> Result<String> {
        Ok(self
            .service
            .candidate(id)?
            .map(|c| c.nombre)
            .unwrap_or_else(|| format!("<unknown {id}>")))
    }

    fn report(&mut self, error: Error) -> Result<()> {
        if !error.is_recoverable() {
            return Err(error);
        }

        let message = match &error {
            Error::Validation { field, reason } => format!("Invalid {field}: {reason}"),
            Error::DuplicateVote => "This ID number has already voted.".to_string(),
            Error::Persistence { .. } => format!("Could not save, nothing was changed: {error}"),
            _ => error.to_string(),
        };
        self.say(&format!("{message}\n"))
    }

    /// Print a label and read one trimmed line; `None` at end of input
    fn prompt(&mut self, label: &str) -> Result<Option<String>> {
        write!(self.output, "{label}").map_err(console_error)?;
        self.output.flush().map_err(console_error)?;

        let mut line = String::new();
        let read = self.input.read_line(&mut line).map_err(console_error)?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn say(&mut self, text: &str) -> Result<()> {
        writeln!(self.output, "{text}").map_err(console_error)
    }
}

fn console_error(e: std::io::Error) -> Error {
    Error::internal(format!("Console I/O failed: {e}"))
}

//! Interactive prompting, injectable so the login and resolver logic can be
//! driven by scripted implementations in tests.

use std::io::{self, Write};

pub trait Prompter: Send + Sync {
    /// Reads a line of input; an empty reply falls back to `default`.
    fn line(&self, prompt: &str, default: &str) -> io::Result<String>;

    /// Reads a line without echoing it back.
    fn password(&self, prompt: &str) -> io::Result<String>;

    /// Picks one entry out of `items`, returning its index.
    fn select(&self, header: &str, items: &[String]) -> io::Result<usize>;
}

/// Production prompter reading from the controlling terminal.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn line(&self, prompt: &str, default: &str) -> io::Result<String> {
        if default.is_empty() {
            print!("{prompt}: ");
        } else {
            print!("{prompt} [{default}]: ");
        }
        io::stdout().flush()?;
        let mut reply = String::new();
        io::stdin().read_line(&mut reply)?;
        let reply = reply.trim();
        Ok(if reply.is_empty() {
            default.to_string()
        } else {
            reply.to_string()
        })
    }

    fn password(&self, prompt: &str) -> io::Result<String> {
        rpassword::prompt_password(format!("{prompt}: "))
    }

    fn select(&self, header: &str, items: &[String]) -> io::Result<usize> {
        loop {
            println!("\n{header}");
            for (index, item) in items.iter().enumerate() {
                println!("    {index}:  {item}");
            }
            let reply = self.line("   ", "")?;
            match reply.trim().parse::<usize>() {
                Ok(index) if index < items.len() => return Ok(index),
                _ => println!("Please enter a number between 0 and {}.", items.len() - 1),
            }
        }
    }
}

//! Colored terminal output for the CLI.
//!
//! Every helper has a plain fallback so `--no-color` output stays readable
//! when piped into logs.

use owo_colors::OwoColorize;

use crate::types::{Answer, RetrievalResult, SnapshotManifest};

const COLUMN_WIDTH: usize = 15;
const PASSAGE_PREVIEW_CHARS: usize = 160;

pub struct Output {
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    pub fn new() -> Self {
        Self { colored: true }
    }

    pub fn no_color() -> Self {
        Self { colored: false }
    }

    pub fn banner(&self) {
        let version = format!("v{}", env!("CARGO_PKG_VERSION"));
        if self.colored {
            println!(
                "\n   {} {}\n   {}\n",
                "~~~ oceanrag".bright_cyan().bold(),
                version.dimmed(),
                "Ocean policy question answering".bright_white()
            );
        } else {
            println!("\n   ~~~ oceanrag {}\n   Ocean policy question answering\n", version);
        }
    }

    pub fn success(&self, message: &str) {
        self.tagged("✓", "OK", message, Tone::Good);
    }

    pub fn info(&self, message: &str) {
        self.tagged("•", "INFO", message, Tone::Plain);
    }

    pub fn warning(&self, message: &str) {
        self.tagged("⚠", "WARN", message, Tone::Warn);
    }

    /// Errors go to stderr.
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// `what` is a short label such as "config" or "12 chunks".
    pub fn created(&self, what: &str, name: &str) {
        if self.colored {
            println!("  {} {} {}", "✓".green().bold(), what.dimmed(), name.bright_white());
        } else {
            println!("  [CREATED] {} {}", what, name);
        }
    }

    pub fn skipped(&self, name: &str, reason: &str) {
        if self.colored {
            println!("  {} {} ({})", "○".yellow(), name.dimmed(), reason.yellow());
        } else {
            println!("  [SKIPPED] {} ({})", name, reason);
        }
    }

    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    pub fn subheader(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.cyan().bold());
        } else {
            println!("\n  --- {} ---", title);
        }
    }

    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {}", message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    pub fn command(&self, cmd: &str) {
        if self.colored {
            println!("     {}", format!("$ {}", cmd).bright_cyan());
        } else {
            println!("     $ {}", cmd);
        }
    }

    pub fn newline(&self) {
        println!();
    }

    /// Print an answer with its confidence and numbered sources.
    pub fn answer(&self, answer: &Answer) {
        self.header("Answer");
        println!("\n    {}\n", answer.text);
        if !answer.grounded {
            self.warning("No passage in the corpus matched the question");
            return;
        }
        self.kv("confidence", &format!("{:.2}", answer.confidence));
        self.subheader("Sources");
        for (i, uri) in answer.citations.iter().enumerate() {
            if self.colored {
                println!("    {} {}", format!("[{}]", i + 1).cyan(), uri);
            } else {
                println!("    [{}] {}", i + 1, uri);
            }
        }
    }

    pub fn passages(&self, passages: &[RetrievalResult]) {
        self.subheader("Passages");
        for passage in passages {
            let label = passage_label(passage);
            let preview = preview(&passage.text_span, PASSAGE_PREVIEW_CHARS);
            if self.colored {
                println!("    {}\n      {}", label.bright_white(), preview.dimmed());
            } else {
                println!("    {}\n      {}", label, preview);
            }
        }
    }

    pub fn snapshots(&self, snapshots: &[SnapshotManifest]) {
        let header = columns(&["Snapshot", "Created", "Entries", "Documents"]);
        let rule = "-".repeat(header.len());
        if self.colored {
            println!("    {}\n    {}", header.bright_white().bold(), rule.dimmed());
        } else {
            println!("    {}\n    {}", header, rule);
        }
        for manifest in snapshots {
            println!(
                "    {}",
                columns(&[
                    &manifest.snapshot_id,
                    &manifest.created_at.format("%Y-%m-%d %H:%M").to_string(),
                    &manifest.entry_count.to_string(),
                    &manifest.document_count.to_string(),
                ])
            );
        }
    }

    fn tagged(&self, symbol: &str, tag: &str, message: &str, tone: Tone) {
        if !self.colored {
            println!("  [{}] {}", tag, message);
            return;
        }
        match tone {
            Tone::Good => println!("  {} {}", symbol.green().bold(), message.green()),
            Tone::Warn => println!("  {} {}", symbol.yellow().bold(), message.yellow()),
            Tone::Plain => println!("  {} {}", symbol.blue(), message),
        }
    }
}

#[derive(Clone, Copy)]
enum Tone {
    Good,
    Warn,
    Plain,
}

fn columns(values: &[&str]) -> String {
    values
        .iter()
        .map(|v| format!("{:<width$}", v, width = COLUMN_WIDTH))
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end()
        .to_string()
}

fn passage_label(passage: &RetrievalResult) -> String {
    format!(
        "{:.3}  {} #{}",
        passage.score, passage.document_title, passage.sequence_index
    )
}

/// First `max_chars` characters on one line, with an ellipsis when cut.
fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}…", cut.trim_end())
}

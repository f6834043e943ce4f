use owo_colors::OwoColorize;

/// Consistent terminal output for the CLI
#[derive(Debug, Clone, Copy, Default)]
pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn print(&self, text: &str) {
        println!("{}", text);
    }

    pub fn status(&self, message: &str) {
        println!("{} {}", "::".bright_blue().bold(), message);
    }

    pub fn info(&self, label: &str, value: &str) {
        println!("  {} {}", label.bright_black(), value);
    }

    pub fn kv(&self, key: &str, value: &str) {
        println!("  {:<24} {}", format!("{}:", key).bright_black(), value);
    }

    pub fn section(&self, title: &str) {
        println!();
        println!("{}", title.bold().underline());
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", "✓".green().bold(), message);
    }

    pub fn warning(&self, message: &str) {
        eprintln!("{} {}", "!".yellow().bold(), message.yellow());
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red().bold(), message.red());
    }
}

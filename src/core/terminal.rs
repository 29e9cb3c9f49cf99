use console::{Emoji, style};

pub static SUCCESS_ICON: Emoji<'_, '_> = Emoji("✅ ", "");
pub static INFO_ICON: Emoji<'_, '_> = Emoji("ℹ️  ", "");
pub static WARN_ICON: Emoji<'_, '_> = Emoji("⚠️  ", "");
pub static ERROR_ICON: Emoji<'_, '_> = Emoji("❌ ", "");
pub static MAILBOX: Emoji<'_, '_> = Emoji("📬 ", "");

pub fn print_success(msg: &str) {
    println!("{} {}", SUCCESS_ICON, style(msg).green());
}

pub fn print_info(msg: &str) {
    println!("{} {}", INFO_ICON, style(msg).blue());
}

pub fn print_warn(msg: &str) {
    println!("{} {}", WARN_ICON, style(msg).yellow());
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", ERROR_ICON, style(msg).red().bold());
}

pub fn print_banner() {
    println!(
        "\n{} {}",
        MAILBOX,
        style("reportwire: scheduled analytics reports, delivered.")
            .bold()
            .cyan()
    );
    println!();
}

/// One titled block of the command guide.
pub struct GuideSection {
    title: String,
    commands: Vec<(String, String)>,
}

impl GuideSection {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            commands: Vec::new(),
        }
    }

    pub fn command(mut self, name: &str, description: &str) -> Self {
        self.commands.push((name.to_string(), description.to_string()));
        self
    }

    pub fn print(self) {
        println!(" {}", style(self.title).bold().underlined());
        for (name, description) in self.commands {
            println!("   {:<18} {}", style(name).green(), description);
        }
        println!();
    }
}

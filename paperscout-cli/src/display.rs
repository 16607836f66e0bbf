//! Plain-ANSI terminal rendering.

use paperscout_core::arxiv::paper::Paper;

const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const CYAN: &str = "\x1b[36m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

pub fn print_welcome() {
    println!("{BOLD}PaperScout{RESET} - arXiv paper assistant");
    println!(
        "{DIM}Ask for papers in plain language, e.g. \"RAG papers from last week\".{RESET}"
    );
    println!("{DIM}Type /help for commands, /quit to exit{RESET}");
}

pub fn print_system(message: &str) {
    println!("{DIM}{message}{RESET}");
}

pub fn print_error(message: &str) {
    eprintln!("{RED}{message}{RESET}");
}

pub fn print_notification(message: &str) {
    println!("\n{CYAN}{message}{RESET}");
}

pub fn print_summary(summary: &str) {
    println!("\n{BOLD}Research Summary{RESET}");
    println!("{summary}\n");
}

fn score_color(score: f64) -> &'static str {
    if score >= 7.0 {
        GREEN
    } else if score >= 5.0 {
        YELLOW
    } else {
        DIM
    }
}

pub fn print_papers(papers: &[Paper], max_display: Option<usize>) {
    if papers.is_empty() {
        print_system("No papers matched.");
        return;
    }

    let shown = max_display.unwrap_or(papers.len()).min(papers.len());
    for (i, paper) in papers.iter().take(shown).enumerate() {
        let color = score_color(paper.interest_score);
        println!(
            "\n{BOLD}{}. {}{RESET}  {color}[{:.1}]{RESET}",
            i + 1,
            paper.title,
            paper.interest_score
        );
        println!("{DIM}   {}{RESET}", paper.short_summary().replace('\n', "\n   "));
        if !paper.interest_reason.is_empty() {
            println!("   {}", paper.interest_reason);
        }
        println!("{DIM}   {}{RESET}", paper.arxiv_url);
    }

    if shown < papers.len() {
        print_system(&format!(
            "\nShowing {shown} of {} papers (display.max_display)",
            papers.len()
        ));
    }
}

pub const HELP_TEXT: &str = "\
Commands:
  /help            Show this help
  /memory          Show the preference memory
  /clear-memory    Clear the preference memory
  /settings        Show current settings
  /lang <en|zh>    Set the response language
  /mode <keyword|exhaustive>  Set the search mode
  /quit            Exit

Anything else is treated as a paper search query.
After results are shown you can leave feedback in plain language;
it is folded into your preference memory in the background.";

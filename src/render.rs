//! Output rendering for replies.
//!
//! The [`ChatController`](crate::ChatController) reports each appended fragment, failure and
//! completion to a [`Renderer`] as it happens.  Pass `&mut ()` to render nothing.

use std::io::{self, Stdout, Write};

use crate::types::SourceInfo;

/// ANSI escape code for dim text (used for sources and notices).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for source titles).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Trait for rendering reply output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - Capturing output in tests
pub trait Renderer: Send {
    /// Print a chunk of reply text.
    ///
    /// This is called incrementally as fragments are applied to the placeholder.
    fn print_text(&mut self, text: &str);

    /// Print the web-search sources attached to a reply.
    fn print_sources(&mut self, sources: &[SourceInfo]) {
        _ = sources;
    }

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Called when a reply is complete.
    fn finish_response(&mut self);

    /// Called when a reply was cancelled.
    fn print_interrupted(&mut self) {}
}

impl Renderer for () {
    fn print_text(&mut self, _: &str) {}

    fn print_error(&mut self, _: &str) {}

    fn print_info(&mut self, _: &str) {}

    fn finish_response(&mut self) {}
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    line_start: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            line_start: true,
        }
    }

    /// Flushes stdout to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        print!("{text}");
        self.line_start = text.ends_with('\n');
        self.flush();
    }

    fn end_line(&mut self) {
        if !self.line_start {
            self.write("\n");
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn print_text(&mut self, text: &str) {
        self.write(text);
    }

    fn print_sources(&mut self, sources: &[SourceInfo]) {
        if sources.is_empty() {
            return;
        }
        self.end_line();
        for (index, source) in sources.iter().enumerate() {
            let title = source.title.as_deref().unwrap_or("untitled");
            let url = &source.url;
            let line = if self.use_color {
                format!(
                    "{ANSI_DIM}[{}]{ANSI_RESET} {ANSI_CYAN}{title}{ANSI_RESET} {ANSI_DIM}{url}{ANSI_RESET}\n",
                    index + 1
                )
            } else {
                format!("[{}] {title} {url}\n", index + 1)
            };
            self.write(&line);
        }
    }

    fn print_error(&mut self, error: &str) {
        self.end_line();
        if self.use_color {
            eprintln!("{ANSI_RED}Error: {error}{ANSI_RESET}");
        } else {
            eprintln!("Error: {error}");
        }
    }

    fn print_info(&mut self, info: &str) {
        self.end_line();
        println!("{info}");
        self.line_start = true;
        self.flush();
    }

    fn finish_response(&mut self) {
        self.end_line();
    }

    fn print_interrupted(&mut self) {
        self.end_line();
        if self.use_color {
            self.write(&format!("{ANSI_DIM}[interrupted]{ANSI_RESET}\n"));
        } else {
            self.write("[interrupted]\n");
        }
    }
}

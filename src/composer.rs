//! Folds handler contributions into the base summary.

use crate::core::models::{Contribution, SignalKind, Tone};

/// Merges a base summary with handler contributions.
///
/// Output is a pure function of its inputs. Contributions are appended in the
/// order given, which the coordinator keeps aligned with signal detection
/// order. Profile contributions are skipped here because they were already
/// fed into the base-summary prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct Composer;

impl Composer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn compose(&self, base: &str, contributions: &[Contribution], tone: Tone) -> String {
        let lines: Vec<String> = contributions
            .iter()
            .filter(|c| c.signal.kind() != SignalKind::ProfileReferenceable)
            .map(|c| c.text.trim())
            .filter(|text| !text.is_empty())
            .map(|text| format_line(text, tone))
            .collect();

        if lines.is_empty() {
            return base.to_string();
        }

        let mut out = String::with_capacity(base.len() + lines.iter().map(String::len).sum::<usize>() + 64);
        out.push_str(base.trim_end());
        out.push_str("\n\n");
        out.push_str(section_header(tone));
        for line in lines {
            out.push('\n');
            out.push_str(&line);
        }
        out
    }
}

fn section_header(tone: Tone) -> &'static str {
    match tone {
        Tone::Stoic => "Additional context:",
        Tone::Chaotic => "BONUS INTEL, hot off the wire:",
        Tone::Pubbie => "Overheard at the bar:",
        Tone::Literal => "ALSO HEARD:",
    }
}

fn format_line(text: &str, tone: Tone) -> String {
    match tone {
        Tone::Stoic | Tone::Pubbie => format!("- {text}"),
        Tone::Chaotic => format!("* {text}"),
        Tone::Literal => format!("- {}", text.to_uppercase()),
    }
}

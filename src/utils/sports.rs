//! Football vocabulary used to spot sports chatter and to build lookups.

use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

/// Confidence when a window names a team, player, league, or a score line.
pub const STRONG_CONFIDENCE: f32 = 0.9;
/// Confidence when only generic match vocabulary shows up.
pub const WEAK_CONFIDENCE: f32 = 0.6;

const TEAMS: &[(&str, &str)] = &[
    ("arsenal", "Arsenal FC"),
    ("chelsea", "Chelsea FC"),
    ("liverpool", "Liverpool FC"),
    ("manchester united", "Manchester United"),
    ("man utd", "Manchester United"),
    ("manchester city", "Manchester City"),
    ("man city", "Manchester City"),
    ("tottenham", "Tottenham Hotspur"),
    ("spurs", "Tottenham Hotspur"),
    ("newcastle", "Newcastle United"),
    ("wolves", "Wolverhampton Wanderers"),
    ("aston villa", "Aston Villa"),
    ("everton", "Everton FC"),
    ("leeds", "Leeds United"),
    ("brighton", "Brighton & Hove Albion"),
    ("leicester", "Leicester City"),
    ("west ham", "West Ham United"),
    ("brentford", "Brentford FC"),
    ("barcelona", "FC Barcelona"),
    ("barca", "FC Barcelona"),
    ("real madrid", "Real Madrid"),
    ("atletico", "Atlético Madrid"),
    ("sevilla", "Sevilla FC"),
    ("valencia", "Valencia CF"),
    ("juventus", "Juventus FC"),
    ("juve", "Juventus FC"),
    ("ac milan", "AC Milan"),
    ("inter milan", "Inter Milan"),
    ("napoli", "SSC Napoli"),
    ("bayern", "Bayern Munich"),
    ("dortmund", "Borussia Dortmund"),
    ("bvb", "Borussia Dortmund"),
    ("leverkusen", "Bayer Leverkusen"),
    ("psg", "Paris Saint-Germain"),
    ("marseille", "Olympique Marseille"),
];

const PLAYERS: &[(&str, &str)] = &[
    ("messi", "Lionel Messi"),
    ("ronaldo", "Cristiano Ronaldo"),
    ("cr7", "Cristiano Ronaldo"),
    ("mbappe", "Kylian Mbappé"),
    ("haaland", "Erling Haaland"),
    ("salah", "Mohamed Salah"),
    ("benzema", "Karim Benzema"),
    ("de bruyne", "Kevin De Bruyne"),
    ("kdb", "Kevin De Bruyne"),
    ("neymar", "Neymar Jr"),
    ("lewandowski", "Robert Lewandowski"),
    ("harry kane", "Harry Kane"),
    ("enzo", "Enzo Fernández"),
    ("vinicius", "Vinícius Júnior"),
];

// Score lines collide with dates ("05-04") and clock times ("10:30"), so
// they only count next to other sports evidence.
static HYPHEN_SCORE_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"\b\d{1,2}-\d{1,2}\b"));

static COLON_SCORE_RE: LazyLock<Regex> = LazyLock::new(|| compile(r"\b\d{1,2}:\d{1,2}\b"));

static KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\b(?:goals?|scored?|match|game|playing|players?|team|football|soccer|halftime|half-time|penalty|red card|offside|kick-?off|derby)\b",
    )
});

static LEAGUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\b(?:premier league|la liga|bundesliga|serie a|ligue 1|champions league|europa league|fa cup)\b",
    )
});

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    let mut aliases: Vec<&str> = TEAMS
        .iter()
        .chain(PLAYERS.iter())
        .map(|(alias, _)| *alias)
        .collect();
    // Longest first so "manchester united" wins over shorter overlaps.
    aliases.sort_by_key(|alias| std::cmp::Reverse(alias.len()));
    let alternation = aliases
        .iter()
        .map(|alias| regex::escape(alias))
        .collect::<Vec<_>>()
        .join("|");
    compile(&format!(r"\b(?:{alternation})\b"))
});

fn compile(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .unwrap_or_else(|_| Regex::new(r"$^").expect("fallback regex compiles"))
}

/// Rate how strongly a piece of text refers to football. `None` when it
/// does not.
#[must_use]
pub fn assess(text: &str) -> Option<f32> {
    let strong = LEAGUE_RE.is_match(text) || ENTITY_RE.is_match(text);
    let weak = KEYWORD_RE.is_match(text);
    let score_line = HYPHEN_SCORE_RE.is_match(text) || COLON_SCORE_RE.is_match(text);

    if strong || (weak && score_line) {
        Some(STRONG_CONFIDENCE)
    } else if weak {
        Some(WEAK_CONFIDENCE)
    } else {
        None
    }
}

/// Canonical team and player names mentioned in `text`, first mention first.
#[must_use]
pub fn recognised_entities(text: &str) -> Vec<&'static str> {
    let mut out: Vec<&'static str> = Vec::new();
    for m in ENTITY_RE.find_iter(text) {
        let alias = m.as_str().to_ascii_lowercase();
        let canonical = TEAMS
            .iter()
            .chain(PLAYERS.iter())
            .find(|(a, _)| *a == alias)
            .map(|(_, name)| *name);
        if let Some(name) = canonical
            && !out.contains(&name)
        {
            out.push(name);
        }
    }
    out
}

/// Score lines such as `2-1`, in order of appearance.
#[must_use]
pub fn score_lines(text: &str) -> Vec<String> {
    HYPHEN_SCORE_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

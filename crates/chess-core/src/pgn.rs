//! PGN utilities — lightweight regex-based reader and an annotated writer.

use regex::Regex;

use crate::game_data::{GameSource, PlayerInfo};

pub const STANDARD_START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

const MAX_LINE_WIDTH: usize = 80;

/// Parse a PGN string into a GameSource.
/// Returns None when the text has no moves.
pub fn parse_pgn(pgn: &str) -> Option<GameSource> {
    let header_re = Regex::new(r#"\[(\w+)\s+"([^"]*)"\]"#).ok()?;

    let mut white = "White".to_string();
    let mut black = "Black".to_string();
    let mut result = "*".to_string();
    let mut date = None;
    let mut event = None;
    let mut setup = None;
    let mut fen = None;

    for cap in header_re.captures_iter(pgn) {
        let key = &cap[1];
        let value = cap[2].to_string();
        match key {
            "White" => white = value,
            "Black" => black = value,
            "Result" => result = value,
            "Date" => date = Some(value),
            "Event" => event = Some(value),
            "SetUp" => setup = Some(value),
            "FEN" => fen = Some(value),
            _ => {}
        }
    }

    // FEN without SetUp "1" is still honoured; some exporters omit the flag
    let starting_fen = match (setup.as_deref(), fen) {
        (Some("0"), _) => None,
        (_, Some(f)) if f != STANDARD_START_FEN => Some(f),
        _ => None,
    };

    let moves = extract_moves(pgn);
    if moves.is_empty() {
        return None;
    }

    Some(GameSource {
        moves,
        starting_fen,
        white: PlayerInfo::new(white, extract_header_int(pgn, "WhiteElo")),
        black: PlayerInfo::new(black, extract_header_int(pgn, "BlackElo")),
        result,
        date,
        event,
    })
}

/// Extract SAN moves from PGN text (after removing headers, comments, variations).
fn extract_moves(pgn: &str) -> Vec<String> {
    let strip = |re: &str, text: &str| -> String {
        match Regex::new(re) {
            Ok(r) => r.replace_all(text, " ").into_owned(),
            Err(_) => text.to_string(),
        }
    };

    let no_headers = strip(r"\[[^\]]*\]", pgn);
    let no_comments = strip(r"\{[^}]*\}|;[^\n]*", &no_headers);
    let mut text = no_comments;
    // Nested variations are removed innermost first
    loop {
        let next = strip(r"\([^()]*\)", &text);
        if next == text {
            break;
        }
        text = next;
    }

    let move_re = match Regex::new(
        r"[KQRBN]?[a-h]?[1-8]?x?[a-h][1-8](?:=[QRBN])?[+#]?|O-O-O[+#]?|O-O[+#]?",
    ) {
        Ok(r) => r,
        Err(_) => return Vec::new(),
    };

    move_re
        .find_iter(&text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Extract an integer value from a PGN header ("?" and "-" yield None).
pub fn extract_header_int<T: std::str::FromStr>(pgn: &str, header_name: &str) -> Option<T> {
    let pattern = format!(r#"\[{}\s+"(\d+)"\]"#, regex::escape(header_name));
    let re = Regex::new(&pattern).ok()?;
    re.captures(pgn)?.get(1)?.as_str().parse().ok()
}

/// One move of an annotated game record.
#[derive(Debug, Clone, Default)]
pub struct AnnotatedMove {
    pub san: String,
    pub nag: Option<u8>,
    pub comment: Option<String>,
}

/// Render a PGN game record. Headers are written in the given order;
/// `first_move_number` and `black_first` cover games set up from a FEN.
pub fn write_pgn(
    headers: &[(String, String)],
    moves: &[AnnotatedMove],
    first_move_number: u32,
    black_first: bool,
    result: &str,
) -> String {
    let mut out = String::new();
    for (key, value) in headers {
        out.push_str(&format!("[{} \"{}\"]\n", key, value.replace('"', "'")));
    }
    out.push('\n');

    let mut tokens: Vec<String> = Vec::new();
    for (i, mv) in moves.iter().enumerate() {
        let ply = i + usize::from(black_first);
        let number = first_move_number as usize + ply / 2;
        if ply % 2 == 0 {
            tokens.push(format!("{number}."));
        } else if i == 0 {
            tokens.push(format!("{number}..."));
        }
        tokens.push(mv.san.clone());
        if let Some(nag) = mv.nag {
            tokens.push(format!("${nag}"));
        }
        if let Some(comment) = &mv.comment {
            // Braces cannot be nested inside a PGN comment
            let clean = comment.replace(['{', '}'], "");
            tokens.push(format!("{{{clean}}}"));
        }
        // A comment interrupts the move pair; the black reply gets "N..."
        if mv.comment.is_some() && ply % 2 == 0 && i + 1 < moves.len() {
            tokens.push(format!("{number}..."));
        }
    }
    tokens.push(result.to_string());

    let mut line_len = 0;
    for token in tokens {
        if line_len > 0 && line_len + 1 + token.len() > MAX_LINE_WIDTH {
            out.push('\n');
            line_len = 0;
        } else if line_len > 0 {
            out.push(' ');
            line_len += 1;
        }
        line_len += token.len();
        out.push_str(&token);
    }
    out.push('\n');
    out
}

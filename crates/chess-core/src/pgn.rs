//! Game-text parsing utilities — lightweight regex-based parser.

use regex::Regex;

/// Parse free-form game text into move tokens and per-ply clocks.
/// Returns `None` when the text yields no moves at all (the caller is
/// expected to skip that game rather than abort the batch).
pub fn parse_game_text(text: &str) -> Option<(Vec<String>, Option<Vec<u32>>)> {
    // Clocks live inside comments, so pull them before stripping anything.
    let clocks = extract_clocks(text);
    let moves = extract_moves(text);

    if moves.is_empty() {
        return None;
    }

    let clocks = if clocks.is_empty() { None } else { Some(clocks) };
    Some((moves, clocks))
}

/// Extract SAN moves from game text (after removing headers, comments, variations).
pub fn extract_moves(text: &str) -> Vec<String> {
    // Remove headers
    let header_re = Regex::new(r"\[[^\]]*\]").unwrap();
    let no_headers = header_re.replace_all(text, "");

    // Remove comments
    let comment_re = Regex::new(r"\{[^}]*\}").unwrap();
    let no_comments = comment_re.replace_all(&no_headers, "");

    // Remove variations
    let variation_re = Regex::new(r"\([^)]*\)").unwrap();
    let no_variations = variation_re.replace_all(&no_comments, "");

    // Extract moves
    let move_re =
        Regex::new(r"[KQRBN]?[a-h]?[1-8]?x?[a-h][1-8](?:=[QRBN])?[+#]?|O-O-O|O-O").unwrap();

    move_re
        .find_iter(&no_variations)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Extract `[%clk H:MM:SS(.f)]` annotations as centiseconds, in order.
pub fn extract_clocks(text: &str) -> Vec<u32> {
    let clk_re = Regex::new(r"\[%clk\s+(\d+):(\d{1,2}):(\d{1,2}(?:\.\d+)?)\]").unwrap();

    clk_re
        .captures_iter(text)
        .filter_map(|cap| {
            let hours: u32 = cap[1].parse().ok()?;
            let minutes: u32 = cap[2].parse().ok()?;
            let seconds: f64 = cap[3].parse().ok()?;
            let total = (hours * 3600 + minutes * 60) as f64 + seconds;
            Some((total * 100.0).round() as u32)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_game_text_with_clocks() {
        let text = "1. e4 {[%clk 0:09:58]} e5 {[%clk 0:09:55]}";
        let (moves, clocks) = parse_game_text(text).unwrap();
        assert_eq!(moves, vec!["e4", "e5"]);
        assert_eq!(clocks, Some(vec![59800, 59500]));
    }

    #[test]
    fn test_parse_game_text_fractional_clock() {
        let text = "12. Qxf7+ {[%clk 0:01:02.3]} Kd8 {[%clk 1:00:00]}";
        let (moves, clocks) = parse_game_text(text).unwrap();
        assert_eq!(moves, vec!["Qxf7+", "Kd8"]);
        assert_eq!(clocks, Some(vec![6230, 360000]));
    }

    #[test]
    fn test_parse_game_text_without_clocks() {
        let text = r#"[White "Player1"]
[Black "Player2"]

1. e4 e5 2. Nf3 Nc6 1-0"#;
        let (moves, clocks) = parse_game_text(text).unwrap();
        assert_eq!(moves, vec!["e4", "e5", "Nf3", "Nc6"]);
        assert_eq!(clocks, None);
    }

    #[test]
    fn test_parse_game_text_empty() {
        assert!(parse_game_text("garbage with no moves").is_none());
    }

    #[test]
    fn test_extract_moves_strips_variations_and_comments() {
        let text = "1. e4 {best by test} e5 (1... c5 2. Nf3) 2. Nf3 O-O-O";
        let moves = extract_moves(text);
        assert_eq!(moves, vec!["e4", "e5", "Nf3", "O-O-O"]);
    }

    #[test]
    fn test_extract_moves_promotion_and_castle() {
        let moves = extract_moves("31. e8=Q+ Rxe8 32. O-O");
        assert_eq!(moves, vec!["e8=Q+", "Rxe8", "O-O"]);
    }
}

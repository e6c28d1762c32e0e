use super::level::{LevelKind, RuleLevel};
use crate::types::Span;

/// Find the cut candidates of `level` inside `span`.
///
/// Delimiter levels return the leftmost non-overlapping matches across all of
/// the level's patterns; on a tie at the same position the pattern listed
/// first wins. Whitespace levels return maximal whitespace runs, or a single
/// zero-width match at the character midpoint when no run yields an interior cut.
pub fn find_matches(text: &str, span: Span, level: &RuleLevel) -> Vec<Span> {
    match &level.kind {
        LevelKind::Delimiters(delimiters) => {
            let mut candidates: Vec<(Span, usize)> = delimiters
                .iter()
                .enumerate()
                .flat_map(|(index, d)| d.find_in(text, span).into_iter().map(move |m| (m, index)))
                .collect();
            candidates.sort_by_key(|(m, index)| (m.start, *index));

            let mut selected = Vec::with_capacity(candidates.len());
            let mut last_end = span.start;
            for (m, _) in candidates {
                if m.start >= last_end {
                    last_end = m.end;
                    selected.push(m);
                }
            }
            selected
        }
        LevelKind::Whitespace => {
            let runs = whitespace_runs(text, span);
            let has_interior_cut = runs.iter().any(|run| {
                let at = level.inclusion.cut_position(*run);
                at > span.start && at < span.end
            });
            if has_interior_cut {
                runs
            } else {
                midpoint(text, span).into_iter().collect()
            }
        }
    }
}

fn whitespace_runs(text: &str, span: Span) -> Vec<Span> {
    let mut runs = Vec::new();
    let mut run_start: Option<usize> = None;

    for (offset, ch) in span.slice(text).char_indices() {
        let at = span.start + offset;
        match (ch.is_whitespace(), run_start) {
            (true, None) => run_start = Some(at),
            (false, Some(start)) => {
                runs.push(Span::new(start, at));
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        runs.push(Span::new(start, span.end));
    }
    runs
}

/// Zero-width match at the middle character boundary; `None` under two chars.
fn midpoint(text: &str, span: Span) -> Option<Span> {
    let slice = span.slice(text);
    let chars = slice.chars().count();
    if chars < 2 {
        return None;
    }
    slice
        .char_indices()
        .nth(chars / 2)
        .map(|(offset, _)| Span::new(span.start + offset, span.start + offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::level::Delimiter;
    use crate::types::Inclusion;

    fn full(text: &str) -> Span {
        Span::new(0, text.len())
    }

    #[test]
    fn test_first_listed_pattern_wins_tie() {
        let text = "xx TASK [a] yy";
        let level = RuleLevel::delimiters(
            vec![Delimiter::literal("TASK").unwrap(), Delimiter::literal("TASK [").unwrap()],
            Inclusion::Next,
        );
        assert_eq!(find_matches(text, full(text), &level), vec![Span::new(3, 7)]);

        let swapped = RuleLevel::delimiters(
            vec![Delimiter::literal("TASK [").unwrap(), Delimiter::literal("TASK").unwrap()],
            Inclusion::Next,
        );
        assert_eq!(find_matches(text, full(text), &swapped), vec![Span::new(3, 9)]);
    }

    #[test]
    fn test_overlapping_matches_leftmost_kept() {
        let text = "abcd";
        let level = RuleLevel::delimiters(
            vec![Delimiter::literal("bc").unwrap(), Delimiter::literal("ab").unwrap()],
            Inclusion::Prev,
        );
        assert_eq!(find_matches(text, full(text), &level), vec![Span::new(0, 2)]);
    }

    #[test]
    fn test_whitespace_runs_are_maximal() {
        let text = "ok:  [h1]\n\tdone";
        let level = RuleLevel::whitespace(Inclusion::Prev);
        assert_eq!(
            find_matches(text, full(text), &level),
            vec![Span::new(3, 5), Span::new(9, 11)]
        );
    }

    #[test]
    fn test_whitespace_falls_back_to_midpoint() {
        let text = "abcdef";
        let level = RuleLevel::whitespace(Inclusion::Prev);
        assert_eq!(find_matches(text, full(text), &level), vec![Span::new(3, 3)]);
    }

    #[test]
    fn test_trailing_whitespace_only_uses_midpoint() {
        // the only run sits at the end, which is not an interior cut
        let text = "abcd  ";
        let level = RuleLevel::whitespace(Inclusion::Prev);
        assert_eq!(find_matches(text, full(text), &level), vec![Span::new(3, 3)]);
    }

    #[test]
    fn test_midpoint_on_char_boundary() {
        let text = "héé";
        let level = RuleLevel::whitespace(Inclusion::Prev);
        let cuts = find_matches(text, full(text), &level);
        assert_eq!(cuts, vec![Span::new(1, 1)]);
        assert!(text.is_char_boundary(cuts[0].start));
    }

    #[test]
    fn test_single_char_cannot_split() {
        let level = RuleLevel::whitespace(Inclusion::Prev);
        assert!(find_matches("x", Span::new(0, 1), &level).is_empty());
    }
}

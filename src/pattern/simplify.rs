//! Canonical form of a pattern.
//!
//! After simplification no single-character set stands alone (it is folded
//! into a literal), adjacent single-occurrence literals are merged, and
//! consecutive identical matches become one match with a summed repeat.

use super::{MatchKind, Pattern, PatternList, PatternMatch, Repetition};

pub(super) fn simplify_list(list: PatternList) -> PatternList {
    PatternList {
        alternatives: list.alternatives.into_iter().map(simplify_pattern).collect(),
    }
}

fn simplify_pattern(pattern: Pattern) -> Pattern {
    let mut out: Vec<PatternMatch> = Vec::with_capacity(pattern.matches.len());
    for m in pattern.matches {
        for m in fold(m) {
            push_merged(&mut out, m);
        }
    }
    Pattern { matches: out }
}

/// Simplify one match in isolation. Single-alternative captures matched once
/// are spliced into the enclosing sequence.
fn fold(m: PatternMatch) -> Vec<PatternMatch> {
    match m.kind {
        MatchKind::CharSet(set) => match set.single_char() {
            Some(c) => vec![PatternMatch::new(MatchKind::StringMatch(c.to_string()), m.repeat)],
            None => vec![PatternMatch::new(MatchKind::CharSet(set), m.repeat)],
        },
        MatchKind::Capture(inner) => {
            let inner = simplify_list(inner);
            if m.repeat.is_once() && inner.alternatives.len() == 1 {
                inner
                    .alternatives
                    .into_iter()
                    .flat_map(|p| p.matches)
                    .collect()
            } else {
                vec![PatternMatch::new(MatchKind::Capture(inner), m.repeat)]
            }
        }
        MatchKind::StringMatch(s) if s.is_empty() => Vec::new(),
        kind => vec![PatternMatch::new(kind, m.repeat)],
    }
}

fn push_merged(out: &mut Vec<PatternMatch>, next: PatternMatch) {
    let Some(prev) = out.last_mut() else {
        out.push(next);
        return;
    };

    if prev.repeat.is_once() && next.repeat.is_once() {
        if let (MatchKind::StringMatch(a), MatchKind::StringMatch(b)) = (&mut prev.kind, &next.kind)
        {
            a.push_str(b);
            return;
        }
        if let (MatchKind::Anchor(a), MatchKind::Anchor(b)) = (&prev.kind, &next.kind) {
            if a == b {
                return;
            }
        }
    }

    let both_literal_once = prev.repeat.is_once()
        && next.repeat.is_once()
        && matches!(prev.kind, MatchKind::StringMatch(_));
    let mergeable = !both_literal_once
        && !matches!(prev.kind, MatchKind::Anchor(_))
        && prev.kind == next.kind
        && prev.repeat.greedy == next.repeat.greedy;
    if mergeable {
        let min = prev.repeat.min.checked_add(next.repeat.min);
        let max = match (prev.repeat.max, next.repeat.max) {
            (Some(a), Some(b)) => a.checked_add(b).map(Some),
            _ => Some(None),
        };
        // Counts that overflow stay as two matches.
        if let (Some(min), Some(max)) = (min, max) {
            prev.repeat = Repetition {
                min,
                max,
                greedy: prev.repeat.greedy,
            };
            return;
        }
    }

    out.push(next);
}

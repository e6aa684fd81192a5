use unicode_general_category::{get_general_category, GeneralCategory};

/// Zero-width joiner, the glue inside emoji family/profession sequences.
pub const ZWJ: char = '\u{200D}';

fn is_variation_selector(c: char) -> bool {
    matches!(c, '\u{FE00}'..='\u{FE0F}' | '\u{E0100}'..='\u{E01EF}')
}

fn is_regional_indicator(c: char) -> bool {
    matches!(c, '\u{1F1E6}'..='\u{1F1FF}')
}

fn is_emoji_modifier(c: char) -> bool {
    // Skin-tone modifiers; category Sk, so the combining-mark check misses
    // them even though they always attach to the preceding emoji.
    matches!(c, '\u{1F3FB}'..='\u{1F3FF}')
}

fn is_combining_mark(c: char) -> bool {
    matches!(
        get_general_category(c),
        GeneralCategory::NonspacingMark
            | GeneralCategory::SpacingMark
            | GeneralCategory::EnclosingMark
    )
}

/// Split `text` into the units a human perceives as single typed characters.
///
/// This is a deliberate approximation of grapheme clustering, not UAX#29:
/// it covers ZWJ sequences, variation selectors, combining marks and
/// regional-indicator (flag) pairs, which is enough for common emoji and all
/// non-combining scripts. Indic conjuncts and Hangul composition are out of
/// scope.
pub fn segment(text: &str) -> Vec<String> {
    let mut clusters: Vec<String> = Vec::new();
    // A ZWJ forces the codepoint after it into the same cluster.
    let mut join_next = false;
    // The current cluster ends with a regional indicator that has not yet
    // been paired; flags are exactly two indicators, so a third starts over.
    let mut pending_regional = false;

    for c in text.chars() {
        let joins = if clusters.is_empty() {
            // Lenient: an isolated combining mark at the start of the buffer
            // becomes its own cluster rather than an error.
            false
        } else if join_next || c == ZWJ {
            true
        } else if is_variation_selector(c) || is_emoji_modifier(c) || is_combining_mark(c) {
            true
        } else {
            pending_regional && is_regional_indicator(c)
        };

        let completed_pair = joins && pending_regional && is_regional_indicator(c);

        if joins {
            if let Some(last) = clusters.last_mut() {
                last.push(c);
            }
        } else {
            clusters.push(c.to_string());
        }

        join_next = c == ZWJ;
        pending_regional = is_regional_indicator(c) && !completed_pair;
    }

    clusters
}

/// Number of typed units in `text`. Always <= the codepoint count.
pub fn cluster_count(text: &str) -> usize {
    segment(text).len()
}

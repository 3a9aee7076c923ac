//! Holder name normalization.
//!
//! [`normalize_name`] is a pure function of the input bytes: the same raw
//! name always yields the same key regardless of what has been resolved
//! before it.

/// Trailing tokens that carry legal form rather than identity.
const CORPORATE_SUFFIXES: &[&str] = &[
    "inc",
    "incorporated",
    "corp",
    "corporation",
    "co",
    "company",
    "llc",
    "lp",
    "llp",
    "ltd",
    "limited",
    "plc",
    "group",
    "holdings",
    "sa",
    "nv",
    "ag",
];

/// Normalize a raw holder name into its lookup key.
///
/// Lowercases, spells out `&`, drops periods and apostrophes so dotted
/// abbreviations collapse (`L.P.` becomes `lp`), turns every other
/// non-alphanumeric character into a separator, removes a leading `the` and
/// trailing corporate suffixes (`L P` counts as one). An `and` left dangling
/// by a stripped suffix goes with it, so `Smith & Co` becomes `smith`; an
/// `and` that ends the name on its own is kept. A name made only of suffixes
/// keeps them.
pub fn normalize_name(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '.' | '\'' | '\u{2019}' => {}
            '&' => cleaned.push_str(" and "),
            c if c.is_alphanumeric() => cleaned.extend(c.to_lowercase()),
            _ => cleaned.push(' '),
        }
    }

    let all: Vec<&str> = cleaned.split_whitespace().collect();
    let mut tokens: &[&str] = &all;

    if tokens.len() > 1 && tokens[0] == "the" {
        tokens = &tokens[1..];
    }
    loop {
        let n = tokens.len();
        let strip = if n > 2 && tokens[n - 2..] == ["l", "p"] {
            2
        } else if n > 1 && CORPORATE_SUFFIXES.contains(&tokens[n - 1]) {
            1
        } else {
            break;
        };
        tokens = &tokens[..n - strip];
        if tokens.len() > 1 && tokens[tokens.len() - 1] == "and" {
            tokens = &tokens[..tokens.len() - 1];
        }
    }

    tokens.join(" ")
}

/// Trim and collapse internal whitespace, keeping the original spelling.
pub fn display_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vanguard_variants_share_a_key() {
        assert_eq!(normalize_name("Vanguard Group"), "vanguard");
        assert_eq!(normalize_name("The Vanguard Group, Inc."), "vanguard");
        assert_eq!(normalize_name("  THE   VANGUARD GROUP INC "), "vanguard");
    }

    #[test]
    fn test_dotted_abbreviations_collapse() {
        assert_eq!(normalize_name("Dimensional Fund Advisors L.P."), "dimensional fund advisors");
        assert_eq!(normalize_name("T. Rowe Price Associates, Inc."), "t rowe price associates");
    }

    #[test]
    fn test_ampersand_and_trailing_co() {
        assert_eq!(normalize_name("JPMorgan Chase & Co."), "jpmorgan chase");
        assert_eq!(
            normalize_name("Fidelity Management & Research Company"),
            "fidelity management and research"
        );
    }

    #[test]
    fn test_connector_goes_only_with_a_suffix() {
        assert_eq!(normalize_name("Smith & Co"), "smith");
        assert_eq!(normalize_name("Smith and Company, Inc."), "smith");
        assert_eq!(normalize_name("Rock and"), "rock and");
        assert_eq!(normalize_name("Johnson & Johnson"), "johnson and johnson");
    }

    #[test]
    fn test_spaced_lp_is_a_suffix() {
        assert_eq!(normalize_name("Dimensional Fund Advisors L P"), "dimensional fund advisors");
        assert_eq!(normalize_name("L P"), "l p");
    }

    #[test]
    fn test_suffix_only_name_is_kept() {
        assert_eq!(normalize_name("Group Inc."), "group");
        assert_eq!(normalize_name("The"), "the");
    }

    #[test]
    fn test_punctuation_only_is_empty() {
        assert_eq!(normalize_name(" -- , "), "");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        for raw in ["BlackRock, Inc.", "State Street Corp.", "Berkshire Hathaway Inc."] {
            let once = normalize_name(raw);
            assert_eq!(normalize_name(&once), once);
        }
    }

    #[test]
    fn test_display_name_collapses_whitespace() {
        assert_eq!(display_name("  BlackRock,\t Inc. "), "BlackRock, Inc.");
    }
}

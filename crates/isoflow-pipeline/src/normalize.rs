//! Fuzzy matching of raw-export headers onto the canonical `Data` schema.

/// Collapse whitespace runs to single spaces and lowercase.
pub fn normalize_header(header: &str) -> String {
    header
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// For each canonical header, the index of the matching source header.
///
/// Blank canonical headers (spacer columns) never map. Matching is tried in three
/// passes, the first hit in source order winning within each pass:
/// exact normalized equality, equality with all spaces removed, then substring
/// containment in either direction.
pub fn map_columns(canonical: &[&str], source: &[String]) -> Vec<Option<usize>> {
    let source: Vec<(usize, String, String)> = source
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let norm = normalize_header(h);
            let joined = norm.replace(' ', "");
            (i, norm, joined)
        })
        .filter(|(_, norm, _)| !norm.is_empty())
        .collect();

    canonical
        .iter()
        .map(|header| {
            let wanted = normalize_header(header);
            if wanted.is_empty() {
                return None;
            }
            let wanted_joined = wanted.replace(' ', "");

            let exact = source.iter().find(|(_, norm, _)| *norm == wanted);
            let joined = || source.iter().find(|(_, _, joined)| *joined == wanted_joined);
            let contained = || {
                source.iter().find(|(_, norm, joined)| {
                    norm.contains(&wanted)
                        || wanted.contains(norm.as_str())
                        || joined.contains(&wanted_joined)
                })
            };

            let hit = exact.or_else(joined).or_else(contained).map(|(i, _, _)| *i);
            if hit.is_none() {
                log::debug!("canonical column '{header}' has no source column");
            }
            hit
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn normalizes_whitespace_and_case() {
        assert_eq!(normalize_header("  Ampl   44 "), "ampl 44");
        assert_eq!(normalize_header("d 13C/12C"), "d 13c/12c");
        assert_eq!(normalize_header(""), "");
    }

    #[test]
    fn matching_passes_run_in_order() {
        let source = headers(&["Time Code", "Identifier 1", "Ampl44", "d 13C/12C [per mil]", "LINE"]);
        let canonical = ["Line", "Time Code", "", "Ampl 44", "d 13C/12C", "Area All"];
        assert_eq!(
            map_columns(&canonical, &source),
            vec![Some(4), Some(0), None, Some(2), Some(3), None]
        );
    }

    #[test]
    fn exact_match_beats_an_earlier_substring_match() {
        let source = headers(&["Identifier 1 (old)", "Identifier 1"]);
        assert_eq!(map_columns(&["Identifier 1"], &source), vec![Some(1)]);
    }

    #[test]
    fn blank_source_headers_are_ignored() {
        let source = headers(&["", "  ", "Comment"]);
        assert_eq!(map_columns(&["Comment", "Rt"], &source), vec![Some(2), None]);
    }
}

use super::ProjectDisplayInfo;

const ELLIPSIS: &str = "...";

/// Shorten `display_name` to at most `max_length` characters.
///
/// The file name (last `/` segment) is kept whole unless it alone exceeds
/// the budget; otherwise parent segments are kept from the innermost outward
/// and the dropped prefix is replaced with `...`. Applying this to its own
/// output with the same maximum returns the output unchanged.
pub fn truncate_display_name(display_name: &str, max_length: usize) -> ProjectDisplayInfo {
    let unchanged = |name: String| ProjectDisplayInfo {
        display_name: name,
        was_truncated: false,
        original_name: display_name.to_string(),
    };
    let truncated = |name: String| ProjectDisplayInfo {
        display_name: name,
        was_truncated: true,
        original_name: display_name.to_string(),
    };

    if char_len(display_name) <= max_length {
        return unchanged(display_name.to_string());
    }

    let budget = max_length.saturating_sub(ELLIPSIS.len());
    let segments: Vec<&str> = display_name.split('/').collect();
    let (file_name, parents) = match segments.split_last() {
        Some(split) => split,
        None => return unchanged(display_name.to_string()),
    };

    if char_len(file_name) > budget {
        let kept: String = file_name.chars().take(budget).collect();
        return truncated(format!("{kept}{ELLIPSIS}"));
    }

    let mut result = file_name.to_string();
    let mut used = char_len(file_name);
    for segment in parents.iter().rev() {
        let cost = char_len(segment) + 1;
        if used + cost > budget {
            return truncated(format!("{ELLIPSIS}{result}"));
        }
        result = format!("{segment}/{result}");
        used += cost;
    }

    unchanged(result)
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_are_unchanged() {
        let info = truncate_display_name("src/default.project.json", 70);
        assert_eq!(info.display_name, "src/default.project.json");
        assert!(!info.was_truncated);
        assert_eq!(info.original_name, "src/default.project.json");
    }

    #[test]
    fn name_exactly_at_limit_is_unchanged() {
        let name = "a".repeat(20);
        let info = truncate_display_name(&name, 20);
        assert_eq!(info.display_name, name);
        assert!(!info.was_truncated);
    }

    #[test]
    fn long_path_keeps_file_name_and_inner_parents() {
        let info = truncate_display_name("very/long/nested/path/to/project.json5", 20);
        assert_eq!(info.display_name, "...to/project.json5");
        assert!(info.display_name.starts_with("..."));
        assert!(info.display_name.ends_with("project.json5"));
        assert!(info.display_name.chars().count() <= 20);
        assert!(info.was_truncated);
        assert_eq!(info.original_name, "very/long/nested/path/to/project.json5");
    }

    #[test]
    fn overlong_file_name_is_cut_itself() {
        let name = format!("dir/{}.project.json", "x".repeat(40));
        let info = truncate_display_name(&name, 20);
        assert_eq!(info.display_name, format!("{}...", "x".repeat(17)));
        assert_eq!(info.display_name.chars().count(), 20);
        assert!(info.was_truncated);
    }

    #[test]
    fn stops_at_first_parent_that_does_not_fit() {
        // "b/" would fit after "c/" is rejected, but truncation is contiguous.
        let info = truncate_display_name("b/cccccccccc/file.json", 15);
        assert_eq!(info.display_name, "...file.json");
        assert!(info.was_truncated);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let name = "überlang/ördner/ßpiel.project.json";
        let info = truncate_display_name(name, 25);
        assert!(info.display_name.chars().count() <= 25);
        assert!(info.display_name.ends_with("ßpiel.project.json"));
    }

    #[test]
    fn tiny_maximum_does_not_panic() {
        let info = truncate_display_name("a/b/c.project.json", 2);
        assert_eq!(info.display_name, "...");
        assert!(info.was_truncated);
    }

    #[test]
    fn truncation_is_idempotent() {
        let inputs = [
            "very/long/nested/path/to/project.json5",
            "a/b/c/d/e/f/g/h/i/j/k/l/m/n/o/p/q/r/s/t/u/v/w/x/y/z/default.project.json",
            "x/an-extremely-long-project-file-name-that-never-fits.project.json5",
            "/abs/olute/path/with/leading/slash/default.project.json",
            "plain.project.json",
        ];
        for input in inputs {
            for max in [0, 2, 3, 5, 10, 20, 40, 70] {
                let once = truncate_display_name(input, max).display_name;
                let twice = truncate_display_name(&once, max).display_name;
                assert_eq!(once, twice, "input {input:?} max {max}");
            }
        }
    }
}

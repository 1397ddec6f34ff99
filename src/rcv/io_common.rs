use std::path::Path;

/// File name without its directory, for record ids and log lines.
pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Splits a cell on the configured overvote delimiter; several marks in
/// one cell become an overvote set at that rank. Without a delimiter the
/// cell is a single mark (blank cells stay blank so the engine can apply
/// its blank-handling rules).
pub fn split_marks(cell: &str, delimiter: &Option<String>) -> Vec<String> {
    match delimiter {
        Some(delimiter) if !delimiter.is_empty() && cell.contains(delimiter.as_str()) => cell
            .split(delimiter.as_str())
            .map(|mark| mark.trim().to_string())
            .filter(|mark| !mark.is_empty())
            .collect(),
        _ => vec![cell.trim().to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_simplified() {
        assert_eq!(simplify_file_name("/a/b/votes.xlsx"), "votes.xlsx");
        assert_eq!(simplify_file_name("votes.csv"), "votes.csv");
    }

    #[test]
    fn marks_split_only_on_a_configured_delimiter() {
        let none: Option<String> = None;
        assert_eq!(split_marks("A|B", &none), vec!["A|B".to_string()]);
        let pipe = Some("|".to_string());
        assert_eq!(
            split_marks("A | B", &pipe),
            vec!["A".to_string(), "B".to_string()]
        );
        assert_eq!(split_marks("A", &pipe), vec!["A".to_string()]);
        assert_eq!(split_marks("", &pipe), vec![String::new()]);
    }
}

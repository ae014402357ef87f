use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Print a prompt and read one trimmed line from stdin.
pub fn ask(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush().context("Failed to flush stdout")?;
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim().to_string())
}

/// The universal back-out sentinel.
pub fn is_back(input: &str) -> bool {
    input.eq_ignore_ascii_case("q")
}

pub fn confirm(prompt: &str) -> Result<bool> {
    let answer = ask(prompt)?.to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Normalize a drag-and-dropped path: shells quote it or escape the
/// spaces, sometimes both.
pub fn clean_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim().trim_matches('\'').trim_matches('"');
    if cfg!(windows) {
        PathBuf::from(trimmed)
    } else {
        PathBuf::from(trimmed.replace("\\ ", " ").replace('\\', ""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_quotes_and_escapes() {
        assert_eq!(
            clean_path("'/media/My Movie.mkv'"),
            PathBuf::from("/media/My Movie.mkv")
        );
        assert_eq!(
            clean_path("/media/My\\ Movie.mkv "),
            PathBuf::from("/media/My Movie.mkv")
        );
        assert_eq!(
            clean_path("\"/media/plain.mkv\""),
            PathBuf::from("/media/plain.mkv")
        );
    }

    #[test]
    fn back_sentinel_is_case_insensitive() {
        assert!(is_back("q"));
        assert!(is_back("Q"));
        assert!(!is_back("quit"));
    }
}

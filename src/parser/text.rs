use std::path::Path;

use crate::parser::ParseOutcome;

/// Plain text / source / structured text: read as UTF-8, replacing
/// decoding errors, no further transformation.
pub fn parse(path: &Path) -> ParseOutcome {
    match std::fs::read(path) {
        Ok(bytes) => ParseOutcome::Text(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => ParseOutcome::Failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("lucidfiles-text-test-{}-{}", uuid::Uuid::new_v4(), name))
    }

    #[test]
    fn reads_utf8_file() {
        let path = scratch_path("hello.txt");
        std::fs::write(&path, "hello world").unwrap();
        let outcome = parse(&path);
        std::fs::remove_file(&path).ok();
        match outcome {
            ParseOutcome::Text(t) => assert_eq!(t, "hello world"),
            _ => panic!("expected Text"),
        }
    }

    #[test]
    fn missing_file_is_a_failure() {
        let path = scratch_path("missing.txt");
        match parse(&path) {
            ParseOutcome::Failed(_) => {}
            _ => panic!("expected Failed"),
        }
    }
}

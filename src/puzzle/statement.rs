use thiserror::Error;

use super::Part;

pub const PART_TWO_MARKER: &str = "--- Part Two ---";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("statement contains {occurrences} `{PART_TWO_MARKER}` markers, expected at most one")]
    AmbiguousSplit { occurrences: usize },
    #[error("part two is not available for this puzzle")]
    MissingPartTwo,
}

/// Statement text split at the part-two marker. Both halves are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuzzleStatement {
    part_one: String,
    part_two: Option<String>,
}

impl PuzzleStatement {
    pub fn split(text: &str) -> Result<Self, FormatError> {
        let occurrences = text.matches(PART_TWO_MARKER).count();
        match occurrences {
            0 => Ok(Self {
                part_one: text.to_string(),
                part_two: None,
            }),
            1 => {
                let (before, after) = text
                    .split_once(PART_TWO_MARKER)
                    .ok_or(FormatError::AmbiguousSplit { occurrences })?;
                Ok(Self {
                    part_one: before.to_string(),
                    part_two: Some(after.to_string()),
                })
            }
            _ => Err(FormatError::AmbiguousSplit { occurrences }),
        }
    }

    pub fn part_one(&self) -> &str {
        &self.part_one
    }

    pub fn part_two(&self) -> Option<&str> {
        self.part_two.as_deref()
    }

    pub fn part(&self, part: Part) -> Result<&str, FormatError> {
        match part {
            Part::One => Ok(self.part_one()),
            Part::Two => self.part_two().ok_or(FormatError::MissingPartTwo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FormatError, PuzzleStatement};
    use crate::puzzle::Part;

    #[test]
    fn single_marker_splits_verbatim_around_it() {
        let text = "--- Day 1 ---\nfind pairs\n\n--- Part Two ---\n now triples \n";
        let statement = PuzzleStatement::split(text).expect("split");

        assert_eq!(
            statement.part(Part::One),
            Ok("--- Day 1 ---\nfind pairs\n\n")
        );
        assert_eq!(statement.part(Part::Two), Ok("\n now triples \n"));
    }

    #[test]
    fn without_marker_only_part_one_exists() {
        let statement = PuzzleStatement::split("only one part").expect("split");

        assert_eq!(statement.part(Part::One), Ok("only one part"));
        assert_eq!(statement.part(Part::Two), Err(FormatError::MissingPartTwo));
    }

    #[test]
    fn repeated_marker_is_ambiguous() {
        let text = "a --- Part Two --- b --- Part Two --- c";
        let err = PuzzleStatement::split(text).expect_err("ambiguous");

        assert_eq!(err, FormatError::AmbiguousSplit { occurrences: 2 });
        assert_eq!(
            err.to_string(),
            "statement contains 2 `--- Part Two ---` markers, expected at most one"
        );
    }

    #[test]
    fn marker_at_the_edges_yields_empty_parts() {
        let statement = PuzzleStatement::split("--- Part Two ---").expect("split");
        assert_eq!(statement.part_one(), "");
        assert_eq!(statement.part_two(), Some(""));
    }
}

//! Corpus listing command.

use wacct::{ChapterId, HarnessConfig, ValidityClass};

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::terminal;

/// Print the path of every test of `class` in `chapters` (all chapters when empty).
pub fn cmd_list(config: &HarnessConfig, chapters: &[ChapterId], class: ValidityClass) -> i32 {
    let corpus = config.corpus();
    let chapters = if chapters.is_empty() {
        match corpus.discover_chapters() {
            Ok(found) => found,
            Err(e) => {
                terminal::error(&e.to_string());
                return EXIT_FAILURE;
            }
        }
    } else {
        chapters.to_vec()
    };

    let mut total = 0;
    for chapter in chapters {
        let cases = match corpus.list(chapter, class) {
            Ok(cases) => cases,
            Err(e) => {
                terminal::error(&e.to_string());
                return EXIT_FAILURE;
            }
        };
        for case in &cases {
            println!("{}", corpus.path(case).display());
        }
        total += cases.len();
    }

    terminal::info(&format!("{total} {class} tests"));
    EXIT_SUCCESS
}

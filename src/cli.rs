//! Interactive prompt plumbing for the binary.

use crate::engine::Chooser;
use crate::steam_store::SearchHit;
use std::io::{self, BufRead, Write};
use tracing::warn;

/// Invalid selections are re-prompted this many times before giving up.
const MAX_CHOICE_ATTEMPTS: u32 = 5;

/// Print a prompt and read one trimmed line from stdin.
pub fn prompt(message: &str) -> io::Result<String> {
    print!("{message}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Block until the user acknowledges, so a double-clicked console window
/// does not vanish with its output.
pub fn pause() {
    let _ = prompt("press Enter to exit...");
}

/// Stdin-backed search-hit selection with a bounded re-prompt loop.
pub struct StdinChooser;

impl Chooser for StdinChooser {
    fn choose(&self, hits: &[SearchHit]) -> Option<usize> {
        for _ in 0..MAX_CHOICE_ATTEMPTS {
            let Ok(answer) = prompt("select a result number: ") else {
                return None;
            };
            if let Ok(choice) = answer.parse::<usize>() {
                if (1..=hits.len()).contains(&choice) {
                    return Some(choice - 1);
                }
            }
            warn!("invalid selection, enter 1..{}", hits.len());
        }
        None
    }
}

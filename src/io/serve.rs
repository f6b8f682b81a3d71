//! Line-oriented query loop for the long-lived `serve` mode.
//!
//! One query per input line, one JSON response line per query. Blank lines
//! are skipped. A line that is not valid UTF-8 is decoded lossily and still
//! answered. Before each query the service checks whether a newer index has
//! been published and swaps it in.

use crate::query::QueryService;
use std::borrow::Cow;
use std::io::{BufRead, ErrorKind, Write};

/// Answer every line of `input` on `output` until EOF.
///
/// Returns the number of responses written. A closed output ends the loop
/// normally.
///
/// # Errors
/// Any other read or write failure.
pub fn serve_lines(
    service: &QueryService,
    mut input: impl BufRead,
    mut output: impl Write,
    k: usize,
) -> std::io::Result<usize> {
    let mut buf = Vec::new();
    let mut answered = 0;

    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        if matches!(line, Cow::Owned(_)) {
            tracing::warn!("Input line is not valid UTF-8, replacing invalid bytes");
        }
        let query = line.trim();
        if query.is_empty() {
            continue;
        }

        if let Err(e) = service.refresh_if_changed() {
            tracing::warn!("Keeping the loaded index: {e}");
        }
        let response = service.respond(query, k);

        match writeln!(output, "{}", response.to_json_line()).and_then(|()| output.flush()) {
            Ok(()) => answered += 1,
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                tracing::debug!("Output closed after {answered} responses");
                break;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(answered)
}

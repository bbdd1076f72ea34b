//! Applying a match to the run sequence.
//!
//! A match inside one run is replaced in place. A match spanning several
//! runs is coalesced into the first touched run, whose tags (and therefore
//! formatting) win; the matched text is removed from the other touched runs,
//! which keep their tags even when their text ends up empty. Run count never
//! changes and runs outside the span are never touched.

use crate::error::{FillError, Result};
use crate::locate::Match;
use crate::logical::{LogicalText, RunSpan};
use crate::runs::Run;

/// Replace `m` in `runs`. `logical` must have been assembled from `runs`.
///
/// Returns the run span that was rewritten. Any inconsistency between the
/// match, the offset map and the runs is reported as
/// [`FillError::Integrity`] and leaves `runs` unchanged.
pub fn rewrite(runs: &mut [Run], logical: &LogicalText, m: &Match) -> Result<RunSpan> {
    let (start, end) = (m.logical_start, m.logical_end);
    match logical.as_str().get(start..end) {
        Some(found) if found == m.target => {}
        Some(_) => {
            return Err(FillError::integrity(
                start,
                end,
                "logical text differs from the match target",
            ))
        }
        None => {
            return Err(FillError::integrity(
                start,
                end,
                "range is not on character boundaries",
            ))
        }
    }

    let span = logical.map_range(start, end)?;
    validate_span(runs, &span, start, end)?;

    if span.is_single_run() {
        let run = &mut runs[span.first_run];
        let text = run.text();
        let new_text = format!(
            "{}{}{}",
            &text[..span.first_offset],
            m.replacement,
            &text[span.last_offset..]
        );
        run.set_text(new_text);
        run.ensure_space_preserve();
        return Ok(span);
    }

    let head = {
        let text = runs[span.first_run].text();
        format!("{}{}", &text[..span.first_offset], m.replacement)
    };
    let tail = runs[span.last_run].text()[span.last_offset..].to_string();

    runs[span.first_run].set_text(head);
    runs[span.first_run].ensure_space_preserve();
    for run in &mut runs[span.first_run + 1..span.last_run] {
        run.set_text(String::new());
    }
    runs[span.last_run].set_text(tail);
    runs[span.last_run].ensure_space_preserve();

    Ok(span)
}

fn validate_span(runs: &[Run], span: &RunSpan, start: usize, end: usize) -> Result<()> {
    if span.first_run > span.last_run || span.last_run >= runs.len() {
        return Err(FillError::integrity(
            start,
            end,
            format!(
                "run span {}..={} is outside {} runs",
                span.first_run,
                span.last_run,
                runs.len()
            ),
        ));
    }
    let first = runs[span.first_run].text();
    let last = runs[span.last_run].text();
    if !first.is_char_boundary(span.first_offset) || !last.is_char_boundary(span.last_offset) {
        return Err(FillError::integrity(start, end, "run offsets are not on character boundaries"));
    }
    if span.is_single_run() && span.first_offset > span.last_offset {
        return Err(FillError::integrity(start, end, "inverted offsets inside one run"));
    }
    Ok(())
}

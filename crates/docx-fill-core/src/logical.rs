//! Logical text: the readable text of a part, with a map back to its runs.

use crate::error::{FillError, Result};
use crate::runs::Run;

/// One run's contribution to the logical text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub logical_start: usize,
    pub run_index: usize,
    pub run_local_start: usize,
    pub len: usize,
    /// Paragraph or line block of the run, see [`Run::block`].
    pub block: usize,
}

impl Segment {
    fn logical_end(&self) -> usize {
        self.logical_start + self.len
    }
}

/// Where a logical range lands in the run sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSpan {
    pub first_run: usize,
    /// Byte offset of the range start inside the first run's text.
    pub first_offset: usize,
    pub last_run: usize,
    /// Byte offset of the range end inside the last run's text.
    pub last_offset: usize,
}

impl RunSpan {
    pub fn is_single_run(&self) -> bool {
        self.first_run == self.last_run
    }
}

/// Concatenated run text plus its offset map. Read-only; rebuild it with
/// [`LogicalText::assemble`] after every accepted rewrite.
#[derive(Debug, Clone, Default)]
pub struct LogicalText {
    text: String,
    segments: Vec<Segment>,
}

impl LogicalText {
    pub fn assemble(runs: &[Run]) -> Self {
        let mut text = String::with_capacity(runs.iter().map(|r| r.text().len()).sum());
        let mut segments = Vec::with_capacity(runs.len());
        for (run_index, run) in runs.iter().enumerate() {
            if run.text().is_empty() {
                continue;
            }
            segments.push(Segment {
                logical_start: text.len(),
                run_index,
                run_local_start: 0,
                len: run.text().len(),
                block: run.block(),
            });
            text.push_str(run.text());
        }
        Self { text, segments }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether `[start, end)` lies inside a single paragraph or line block.
    /// Ranges outside the text are reported as not single-block.
    pub fn is_single_block(&self, start: usize, end: usize) -> bool {
        if start >= end || end > self.text.len() {
            return false;
        }
        let first = self.segments.partition_point(|s| s.logical_end() <= start);
        let last = self.segments.partition_point(|s| s.logical_end() < end);
        match (self.segments.get(first), self.segments.get(last)) {
            (Some(a), Some(b)) => a.block == b.block,
            _ => false,
        }
    }

    /// Map `[start, end)` to the contiguous runs it covers. The runs must
    /// share one block.
    pub fn map_range(&self, start: usize, end: usize) -> Result<RunSpan> {
        if start >= end {
            return Err(FillError::integrity(start, end, "empty range"));
        }
        if end > self.text.len() {
            return Err(FillError::integrity(
                start,
                end,
                format!("range exceeds logical text of {} bytes", self.text.len()),
            ));
        }

        // Segments are sorted and contiguous, so the first one ending after
        // `start` is the one containing it.
        let first = self.segments.partition_point(|s| s.logical_end() <= start);
        let last = self.segments.partition_point(|s| s.logical_end() < end);
        let (Some(first_seg), Some(last_seg)) =
            (self.segments.get(first), self.segments.get(last))
        else {
            return Err(FillError::integrity(start, end, "no segment covers the range"));
        };
        if first_seg.logical_start > start || last_seg.logical_start >= end {
            return Err(FillError::integrity(start, end, "range falls outside the offset map"));
        }

        for pair in self.segments[first..=last].windows(2) {
            if pair[0].logical_end() != pair[1].logical_start
                || pair[0].run_index >= pair[1].run_index
            {
                return Err(FillError::integrity(start, end, "offset map has a hole"));
            }
            if pair[0].block != pair[1].block {
                return Err(FillError::integrity(
                    start,
                    end,
                    "range crosses a paragraph or line break",
                ));
            }
        }

        Ok(RunSpan {
            first_run: first_seg.run_index,
            first_offset: first_seg.run_local_start + (start - first_seg.logical_start),
            last_run: last_seg.run_index,
            last_offset: last_seg.run_local_start + (end - last_seg.logical_start),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn runs(texts: &[&str]) -> Vec<Run> {
        texts.iter().map(|t| Run::new("<w:t>", *t, "</w:t>")).collect()
    }

    #[test]
    fn test_assemble_concatenates_and_skips_empty_runs() {
        let logical = LogicalText::assemble(&runs(&["#NA", "", "ME# is"]));
        assert_eq!(logical.as_str(), "#NAME# is");
        assert_eq!(
            logical.segments(),
            &[
                Segment {
                    logical_start: 0,
                    run_index: 0,
                    run_local_start: 0,
                    len: 3,
                    block: 0,
                },
                Segment {
                    logical_start: 3,
                    run_index: 2,
                    run_local_start: 0,
                    len: 6,
                    block: 0,
                },
            ]
        );
    }

    #[test]
    fn test_map_range_within_one_run() {
        let logical = LogicalText::assemble(&runs(&["Dear #NAME#,"]));
        let span = logical.map_range(5, 11).unwrap();
        assert!(span.is_single_run());
        assert_eq!((span.first_offset, span.last_offset), (5, 11));
    }

    #[test]
    fn test_map_range_across_runs() {
        let logical = LogicalText::assemble(&runs(&["x #N", "", "AM", "E# y"]));
        let span = logical.map_range(2, 8).unwrap();
        assert_eq!(
            span,
            RunSpan {
                first_run: 0,
                first_offset: 2,
                last_run: 3,
                last_offset: 2,
            }
        );
    }

    #[test]
    fn test_map_range_ending_on_run_boundary() {
        let logical = LogicalText::assemble(&runs(&["#NA", "ME#", "tail"]));
        let span = logical.map_range(0, 6).unwrap();
        assert_eq!((span.last_run, span.last_offset), (1, 3));
    }

    #[test]
    fn test_map_range_rejects_range_across_blocks() {
        let runs = vec![
            Run::new("<w:t>", "Total: #A", "</w:t>").in_block(1),
            Run::new("<w:t>", "B# items", "</w:t>").in_block(2),
        ];
        let logical = LogicalText::assemble(&runs);
        assert_eq!(logical.as_str(), "Total: #AB# items");
        assert!(!logical.is_single_block(7, 11));
        assert!(logical.is_single_block(0, 9));
        assert!(matches!(logical.map_range(7, 11), Err(FillError::Integrity { .. })));
    }

    #[test]
    fn test_map_range_rejects_bad_ranges() {
        let logical = LogicalText::assemble(&runs(&["abc"]));
        assert!(matches!(logical.map_range(2, 2), Err(FillError::Integrity { .. })));
        assert!(matches!(logical.map_range(1, 9), Err(FillError::Integrity { .. })));
        let empty = LogicalText::assemble(&[]);
        assert!(matches!(empty.map_range(0, 1), Err(FillError::Integrity { .. })));
    }
}

//! PaperKnife core: in-memory PDF processing pipeline
//!
//! Source files are packaged into a [`TaskPayload`], shipped to a background
//! worker over a [`DispatchChannel`], and the returned bytes are exposed as
//! [`ResourceHandle`]s by a [`ResultMaterializer`]. All PDF work goes through
//! the lopdf-backed [`Codec`] arena.

pub mod activity;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod inspect;
pub mod materialize;
pub mod payload;
pub mod protocol;
pub mod transfer;
pub mod worker;

#[cfg(test)]
mod fixtures;

pub use activity::{ActivityEntry, ActivityLog, Completion, ToolKind};
pub use codec::{Codec, DocumentId, ImagePlacement, ImageRef, PageRef, PageSize, RasterFormat};
pub use config::ToolkitConfig;
pub use dispatch::{DispatchChannel, TaskHandle};
pub use error::{CodecError, DispatchError, HandleError, ValidationError};
pub use inspect::{inspect, inspect_with_password, PdfMetadata};
pub use materialize::{ResourceHandle, ResultMaterializer};
pub use payload::{
    assembly_payload, merge_payload, split_payload, RasterPage, SourceFile, SplitMode,
    TaskPayload,
};
pub use protocol::{NamedOutput, ProgressEvent, TaskResult, WorkerMessage};
pub use transfer::TransferBuffer;

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, CodecError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| CodecError::Parse(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}

/// Parse page range string like "1-3, 5, 8-10" into sorted unique page numbers.
///
/// Pages past `max_page` are rejected before any range is expanded.
pub fn parse_ranges(input: &str, max_page: u32) -> Result<Vec<u32>, ValidationError> {
    use std::collections::BTreeSet;

    let mut pages = BTreeSet::new();

    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some((start, end)) = part.split_once('-') {
            // Range like "1-3"
            let start: u32 = start
                .trim()
                .parse()
                .map_err(|_| ValidationError::InvalidRange(format!("Invalid start: {}", start)))?;
            let end: u32 = end
                .trim()
                .parse()
                .map_err(|_| ValidationError::InvalidRange(format!("Invalid end: {}", end)))?;

            if start == 0 {
                return Err(ValidationError::InvalidRange("Pages start at 1".into()));
            }
            if start > end {
                return Err(ValidationError::InvalidRange(format!(
                    "Start {} > end {}",
                    start, end
                )));
            }
            check_bound(end, max_page)?;

            for page in start..=end {
                pages.insert(page);
            }
        } else {
            // Single page like "5"
            let page: u32 = part
                .parse()
                .map_err(|_| ValidationError::InvalidRange(format!("Invalid page: {}", part)))?;
            if page == 0 {
                return Err(ValidationError::InvalidRange("Pages start at 1".into()));
            }
            check_bound(page, max_page)?;
            pages.insert(page);
        }
    }

    Ok(pages.into_iter().collect())
}

fn check_bound(page: u32, max_page: u32) -> Result<(), ValidationError> {
    if page > max_page {
        return Err(ValidationError::InvalidPageSelection(format!(
            "Page {} is out of range (1-{})",
            page, max_page
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_get_page_count() {
        assert_eq!(get_page_count(&fixtures::sample_pdf(4, "Count")).unwrap(), 4);
        assert!(get_page_count(b"nope").is_err());
    }

    #[test]
    fn test_parse_ranges_single() {
        let result = parse_ranges("5", 10).unwrap();
        assert_eq!(result, vec![5]);
    }

    #[test]
    fn test_parse_ranges_range() {
        let result = parse_ranges("1-3", 10).unwrap();
        assert_eq!(result, vec![1, 2, 3]);
    }

    #[test]
    fn test_parse_ranges_complex() {
        let result = parse_ranges("1-3, 5, 8-10", 10).unwrap();
        assert_eq!(result, vec![1, 2, 3, 5, 8, 9, 10]);
    }

    #[test]
    fn test_parse_ranges_deduplicates() {
        let result = parse_ranges("1-3, 2-4", 10).unwrap();
        assert_eq!(result, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_parse_ranges_rejects_page_zero_and_reversed_ranges() {
        assert!(parse_ranges("0", 10).is_err());
        assert!(parse_ranges("0-2", 10).is_err());
        assert!(parse_ranges("5-3", 10).is_err());
        assert!(parse_ranges("a-b", 10).is_err());
    }

    #[test]
    fn test_parse_ranges_rejects_pages_past_the_document() {
        assert!(matches!(
            parse_ranges("1-4294967295", 5),
            Err(ValidationError::InvalidPageSelection(_))
        ));
        assert!(matches!(
            parse_ranges("2, 6", 5),
            Err(ValidationError::InvalidPageSelection(_))
        ));
        assert_eq!(parse_ranges("4-5", 5).unwrap(), vec![4, 5]);
    }

    proptest! {
        #[test]
        fn parse_ranges_output_is_sorted_and_unique(
            parts in prop::collection::vec((1u32..50, 0u32..5), 1..8)
        ) {
            let input = parts
                .iter()
                .map(|(start, len)| format!("{}-{}", start, start + len))
                .collect::<Vec<_>>()
                .join(", ");

            let pages = parse_ranges(&input, 60).unwrap();
            prop_assert!(pages.windows(2).all(|w| w[0] < w[1]));
            for (start, len) in parts {
                prop_assert!(pages.contains(&start));
                prop_assert!(pages.contains(&(start + len)));
            }
        }
    }
}

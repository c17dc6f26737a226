//! Task execution inside the background context
//!
//! Each task gets a fresh [`Codec`] arena, so every document loaded or
//! created for a task is released when the task ends, whatever the outcome.
//! Work is strictly sequential: one source document plus one output document
//! at a time.

use crate::codec::{Codec, DocumentId};
use crate::error::CodecError;
use crate::payload::{AssemblyPayload, MergePayload, SplitMode, SplitPayload, TaskPayload};
use crate::protocol::{NamedOutput, WorkerMessage};
use crate::transfer::TransferBuffer;
use tracing::{debug, info};

/// Run one task to completion.
///
/// `on_progress` receives non-decreasing percentages; the returned message is
/// always terminal. Failures are rendered into [`WorkerMessage::Error`] and
/// no partial output is returned.
pub fn execute(payload: TaskPayload, on_progress: impl FnMut(u8)) -> WorkerMessage {
    let kind = payload.kind();
    let mut codec = Codec::new();

    let outcome = match payload {
        TaskPayload::MergePdfs(merge) => {
            let mut progress = ProgressReporter::new(merge.files.len(), on_progress);
            merge_files(&mut codec, merge, &mut progress).map(WorkerMessage::Success)
        }
        TaskPayload::SplitPdf(split) => split_file(&mut codec, split, on_progress),
        TaskPayload::CompressPdfAssembly(assembly) => {
            let mut progress = ProgressReporter::new(assembly.pages.len(), on_progress);
            assemble_pages(&mut codec, assembly, &mut progress).map(WorkerMessage::Success)
        }
    };

    match outcome {
        Ok(message) => {
            info!("{} finished", kind);
            message
        }
        Err(e) => {
            info!("{} failed: {}", kind, e);
            WorkerMessage::Error(e.to_string())
        }
    }
}

/// Apply a rotation delta on top of a page's existing rotation
pub fn compose_rotation(current: i64, delta: u16) -> i64 {
    (current + i64::from(delta)).rem_euclid(360)
}

/// Emits `round(100 * done / total)`, never going backwards and never past 100
pub struct ProgressReporter<F: FnMut(u8)> {
    total: usize,
    done: usize,
    last: u8,
    sink: F,
}

impl<F: FnMut(u8)> ProgressReporter<F> {
    pub fn new(total: usize, sink: F) -> Self {
        Self {
            total,
            done: 0,
            last: 0,
            sink,
        }
    }

    /// Mark one more unit done and emit the new percentage
    pub fn advance(&mut self) {
        self.done += 1;
        let percent = percent_of(self.done, self.total).clamp(self.last, 100);
        self.last = percent;
        (self.sink)(percent);
    }
}

fn percent_of(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let percent = (100.0 * done as f64 / total as f64).round();
    percent.min(100.0) as u8
}

fn merge_files<F: FnMut(u8)>(
    codec: &mut Codec,
    payload: MergePayload,
    progress: &mut ProgressReporter<F>,
) -> Result<TransferBuffer, CodecError> {
    let output = codec.create_document();
    let total = payload.files.len();

    for (position, entry) in payload.files.into_iter().enumerate() {
        let source = codec.load_document(entry.buffer.as_slice(), entry.password.as_deref())?;
        let count = codec.page_count(source)?;
        let indices: Vec<usize> = (0..count).collect();

        for page in codec.copy_pages(source, output, &indices)? {
            let current = codec.page_rotation(page)?;
            codec.set_page_rotation(page, compose_rotation(current, entry.rotation))?;
            codec.add_page(output, page)?;
        }
        codec.close(source)?;

        debug!("Merged file {}/{} ({} pages)", position + 1, total, count);
        progress.advance();
    }

    codec.serialize(output).map(TransferBuffer::new)
}

fn split_file(
    codec: &mut Codec,
    payload: SplitPayload,
    on_progress: impl FnMut(u8),
) -> Result<WorkerMessage, CodecError> {
    let source = codec.load_document(payload.buffer.as_slice(), payload.password.as_deref())?;
    let count = codec.page_count(source)?;

    let mut selected = payload.selected_pages;
    selected.sort_unstable();
    if payload.mode == SplitMode::Batch {
        selected.dedup();
    }
    let indices = selected
        .iter()
        .map(|&page| page_index(page, count))
        .collect::<Result<Vec<_>, _>>()?;

    let mut progress = ProgressReporter::new(indices.len(), on_progress);

    match payload.mode {
        SplitMode::Single => {
            let output = codec.create_document();
            for page in codec.copy_pages(source, output, &indices)? {
                codec.add_page(output, page)?;
                progress.advance();
            }
            codec.close(source)?;
            debug!("Extracted {} of {} pages", indices.len(), count);

            codec
                .serialize(output)
                .map(|bytes| WorkerMessage::Success(TransferBuffer::new(bytes)))
        }
        SplitMode::Batch => {
            let mut outputs = Vec::with_capacity(indices.len());
            for (&page_number, &index) in selected.iter().zip(&indices) {
                let bytes = single_page_document(codec, source, index)?;
                outputs.push(NamedOutput {
                    name: format!("{}-{}.pdf", payload.output_name_prefix, page_number),
                    buffer: TransferBuffer::new(bytes),
                });
                debug!("Split out page {}", page_number);
                progress.advance();
            }
            codec.close(source)?;

            Ok(WorkerMessage::SuccessBatch(outputs))
        }
    }
}

fn single_page_document(
    codec: &mut Codec,
    source: DocumentId,
    index: usize,
) -> Result<Vec<u8>, CodecError> {
    let output = codec.create_document();
    for page in codec.copy_pages(source, output, &[index])? {
        codec.add_page(output, page)?;
    }
    codec.serialize(output)
}

fn assemble_pages<F: FnMut(u8)>(
    codec: &mut Codec,
    payload: AssemblyPayload,
    progress: &mut ProgressReporter<F>,
) -> Result<TransferBuffer, CodecError> {
    let output = codec.create_document();
    let total = payload.pages.len();

    for (position, raster) in payload.pages.into_iter().enumerate() {
        let size = raster.size();
        let image = codec.embed_raster_image(output, raster.buffer.as_slice(), raster.format)?;
        let page = codec.add_sized_page(output, size)?;
        codec.draw_image(page, image, size)?;

        debug!(
            "Assembled page {}/{} ({}x{})",
            position + 1,
            total,
            size.width,
            size.height
        );
        progress.advance();
    }

    codec.serialize(output).map(TransferBuffer::new)
}

/// 1-indexed page number to a 0-indexed codec index
fn page_index(page: u32, count: usize) -> Result<usize, CodecError> {
    let index = (page as usize)
        .checked_sub(1)
        .ok_or_else(|| CodecError::Operation("Page numbers start at 1".into()))?;
    if index >= count {
        return Err(CodecError::PageOutOfRange { index, count });
    }
    Ok(index)
}

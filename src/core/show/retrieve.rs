//! The multi-round retrieve algorithm (spec §4.3, "Retrieve algorithm").

use crate::errors::NodeResult;

use super::cache::ShowSessionCache;

/// Maximum rows returned per `RetrieveReq` (spec §3).
pub const PAGE: i32 = 100;

/// Fixed slack appended to the retrieve buffer's allocation beyond
/// `row_size * rows_to_read`, mirroring the original's per-allocation
/// padding. No further structure is specified for it; picked large enough
/// to hold the response envelope's own fixed-size fields.
pub const PAGE_PAD: usize = 64;

/// The `free_flag` carried on a `RetrieveReq` (spec §4.3 step 2). A single
/// bit in the wire format; modeled directly as a bool rather than reaching
/// for a bitflags crate for one flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeFlag(bool);

impl FreeFlag {
    pub const FREE_RESOURCE: FreeFlag = FreeFlag(true);

    pub fn empty() -> Self {
        FreeFlag(false)
    }

    pub fn contains(self, other: FreeFlag) -> bool {
        self.0 && other.0
    }
}

#[derive(Debug, Clone)]
pub struct RetrieveResponse {
    pub num_of_rows: i32,
    pub completed: bool,
    pub data: Vec<u8>,
}

/// Run one retrieve round for `show_id` (spec §4.3 steps 1-8).
pub fn retrieve(cache: &ShowSessionCache, show_id: u64, free_flag: FreeFlag) -> NodeResult<RetrieveResponse> {
    let handle = cache.acquire_session(show_id)?;

    let mut rows_read = 0i32;
    let mut data = Vec::new();
    let mut completed;

    let rows_to_read = handle.with_session(|session| {
        if free_flag.contains(FreeFlag::FREE_RESOURCE) {
            0
        } else if session.is_finished() {
            session.num_of_reads = session.num_of_rows;
            0
        } else {
            (session.num_of_rows - session.num_of_reads).max(0).min(PAGE)
        }
    });

    if rows_to_read > 0 {
        handle.with_session(|session| -> NodeResult<()> {
            let row_size = session.row_size().max(0) as usize;
            let mut buffer = vec![0u8; row_size * rows_to_read as usize + PAGE_PAD];

            let read = {
                let layout = session.layout.clone();
                let iter = session
                    .iter
                    .as_mut()
                    .expect("rows_to_read > 0 implies the iterator is still present");
                iter.retrieve(&mut buffer, rows_to_read, &layout)?
            };

            if read < rows_to_read {
                compact_columns(&mut buffer, &session.layout, read as usize);
            }
            buffer.truncate((row_size * read as usize).min(buffer.len()));

            session.num_of_reads += read;
            rows_read = read;
            data = buffer;

            if read == 0 || session.num_of_reads >= session.num_of_rows {
                session.iter = None;
            }
            Ok(())
        })?;
    }

    completed = rows_read == 0 || rows_to_read == 0;
    if !completed {
        handle.with_session(|session| {
            completed = rows_read == rows_to_read && session.num_of_reads == session.num_of_rows;
        });
    }

    handle.release(completed);

    Ok(RetrieveResponse {
        num_of_rows: rows_read,
        completed,
        data,
    })
}

/// Memmove each column `i`'s `rows` live rows from its full-`capacity`
/// offset down to its compacted offset (spec §4.3, "Column-packing
/// contract").
fn compact_columns(buffer: &mut [u8], layout: &super::session::ColumnLayout, rows: usize) {
    if rows == 0 {
        return;
    }
    let mut packed_offset = 0usize;
    for i in 0..layout.num_columns() {
        let width = layout.width[i] as usize;
        let src_start = layout.offset[i] as usize;
        let len = width * rows;
        if src_start != packed_offset {
            buffer.copy_within(src_start..src_start + len, packed_offset);
        }
        packed_offset += len;
    }
}

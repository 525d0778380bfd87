//! The paginated query session itself (spec §3 "ShowSession", §4.3).

use tokio::time::Instant;

use crate::errors::NodeResult;

/// Column byte layout for a show session's row buffer: `offset[i]` is the
/// byte offset of column `i` within a full-capacity buffer, `width[i]` is
/// the per-row byte width of column `i`. Used by the retrieve path to
/// compact a short page (spec §4.3, "Column-packing contract").
#[derive(Debug, Clone)]
pub struct ColumnLayout {
    pub offset: Vec<i32>,
    pub width: Vec<i32>,
}

impl ColumnLayout {
    pub fn num_columns(&self) -> usize {
        self.offset.len()
    }
}

/// The type-specific backing iterator a show session owns. Replaces the
/// original's C free-callback: an implementation's `Drop` does whatever
/// cleanup the old `free_iter` callback did, so dropping the `Box` is the
/// entire cleanup contract.
pub trait ShowIter: Send + Sync {
    /// Write up to `capacity` rows into `buffer` (sized for `capacity` rows
    /// at the session's row layout, plus padding) and return the number of
    /// rows actually written.
    fn retrieve(&mut self, buffer: &mut [u8], capacity: i32, layout: &ColumnLayout) -> NodeResult<i32>;
}

/// One active multi-round show query (spec §3).
pub struct ShowSession {
    pub id: u64,
    pub show_type: u32,
    pub db: String,
    pub payload: Vec<u8>,
    pub num_of_rows: i32,
    pub num_of_reads: i32,
    pub layout: ColumnLayout,
    pub iter: Option<Box<dyn ShowIter>>,
    pub deadline: Instant,
}

impl ShowSession {
    pub fn row_size(&self) -> i32 {
        self.layout
            .width
            .iter()
            .copied()
            .sum()
    }

    /// The session reports "finished" once its iterator has been dropped
    /// after at least one successful read (spec §4.3 step 3).
    pub fn is_finished(&self) -> bool {
        self.iter.is_none() && self.num_of_reads > 0
    }
}

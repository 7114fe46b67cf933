use std::sync::Arc;

use super::block::BlockIterator;
use super::reader::Table;
use crate::error::Result;
use crate::iterator::StorageIterator;

enum State {
    /// Fresh iterator; nothing read yet.
    Unpositioned,
    /// The index cursor points at a data block that is not open yet.
    AtIndexEntry,
    InBlock(BlockIterator),
    Exhausted,
}

/// Iterates a [`Table`] by walking its index block and opening each data
/// block in turn.
///
/// Empty data blocks are skipped. Any error leaves the iterator invalid;
/// seek again to resume.
pub struct TableIterator {
    table: Arc<Table>,
    index_iter: BlockIterator,
    state: State,
}

impl TableIterator {
    pub fn new(table: Arc<Table>) -> Self {
        let index_iter = table.index_block().iter(Arc::clone(table.comparator()));
        Self {
            table,
            index_iter,
            state: State::Unpositioned,
        }
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    fn open_current_block(&self) -> Result<BlockIterator> {
        let block = self.table.open_data_block(self.index_iter.value())?;
        Ok(block.iter(Arc::clone(self.table.comparator())))
    }

    fn after_index_move(&mut self) {
        self.state = if self.index_iter.is_valid() {
            State::AtIndexEntry
        } else {
            State::Exhausted
        };
    }

    /// Runs `op`; a failure leaves the iterator exhausted.
    fn or_exhaust(&mut self, op: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        let result = op(self);
        if result.is_err() {
            self.state = State::Exhausted;
        }
        result
    }

    /// Moves forward until the current block has an entry or the index runs out.
    fn settle_forward(&mut self) -> Result<()> {
        loop {
            match &self.state {
                State::InBlock(block_iter) if block_iter.is_valid() => return Ok(()),
                State::InBlock(_) => {
                    self.index_iter.next()?;
                    self.after_index_move();
                }
                State::AtIndexEntry => {
                    let mut block_iter = self.open_current_block()?;
                    block_iter.seek_to_first()?;
                    self.state = State::InBlock(block_iter);
                }
                State::Unpositioned | State::Exhausted => return Ok(()),
            }
        }
    }
}

impl StorageIterator for TableIterator {
    fn key(&self) -> &[u8] {
        match &self.state {
            State::InBlock(block_iter) => block_iter.key(),
            _ => &[],
        }
    }

    fn value(&self) -> &[u8] {
        match &self.state {
            State::InBlock(block_iter) => block_iter.value(),
            _ => &[],
        }
    }

    fn is_valid(&self) -> bool {
        matches!(&self.state, State::InBlock(block_iter) if block_iter.is_valid())
    }

    fn next(&mut self) -> Result<()> {
        self.or_exhaust(|iter| {
            if let State::InBlock(block_iter) = &mut iter.state {
                block_iter.next()?;
                iter.settle_forward()?;
            }
            Ok(())
        })
    }

    fn seek(&mut self, target: &[u8]) -> Result<()> {
        self.or_exhaust(|iter| {
            iter.index_iter.seek(target)?;
            iter.after_index_move();
            if let State::AtIndexEntry = iter.state {
                let mut block_iter = iter.open_current_block()?;
                block_iter.seek(target)?;
                iter.state = State::InBlock(block_iter);
            }
            iter.settle_forward()
        })
    }

    fn seek_to_first(&mut self) -> Result<()> {
        self.or_exhaust(|iter| {
            iter.index_iter.seek_to_first()?;
            iter.after_index_move();
            iter.settle_forward()
        })
    }
}

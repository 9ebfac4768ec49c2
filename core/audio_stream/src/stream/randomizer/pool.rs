use crate::{error::PoolError, stream::StreamHandle};

/// One weighted slot of a [`StreamPool`].
#[derive(Debug, Clone)]
pub struct PoolEntry {
    pub stream: Option<StreamHandle>,
    pub weight: f32,
}

impl Default for PoolEntry {
    fn default() -> Self {
        Self {
            stream: None,
            weight: 1.0,
        }
    }
}

/// Ordered, index-addressed list of weighted streams.
///
/// Every index operation checks `index < count` and leaves the pool untouched
/// on failure. Insert positions (`add`, the target of `move_stream`) may also
/// equal `count`, which appends.
#[derive(Debug, Clone, Default)]
pub struct StreamPool {
    entries: Vec<PoolEntry>,
}

impl StreamPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_index(&self, index: usize) -> Result<(), PoolError> {
        if index < self.entries.len() {
            Ok(())
        } else {
            Err(PoolError::OutOfRange {
                index,
                count: self.entries.len(),
            })
        }
    }

    fn check_insert_position(&self, index: usize) -> Result<(), PoolError> {
        if index <= self.entries.len() {
            Ok(())
        } else {
            Err(PoolError::OutOfRange {
                index,
                count: self.entries.len(),
            })
        }
    }

    /// Inserts an empty entry (no stream, weight 1.0) at `index`.
    pub fn add(&mut self, index: usize) -> Result<(), PoolError> {
        self.check_insert_position(index)?;
        self.entries.insert(index, PoolEntry::default());
        Ok(())
    }

    /// Moves the entry at `from` so that it lands before the entry currently at `to`.
    /// `to == count` moves it to the end.
    pub fn move_stream(&mut self, from: usize, to: usize) -> Result<(), PoolError> {
        self.check_index(from)?;
        self.check_insert_position(to)?;

        let entry = self.entries.remove(from);
        let to = if from < to { to - 1 } else { to };
        self.entries.insert(to, entry);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<PoolEntry, PoolError> {
        self.check_index(index)?;
        Ok(self.entries.remove(index))
    }

    pub fn set_stream(
        &mut self,
        index: usize,
        stream: Option<StreamHandle>,
    ) -> Result<(), PoolError> {
        self.check_index(index)?;
        self.entries[index].stream = stream;
        Ok(())
    }

    pub fn stream(&self, index: usize) -> Result<Option<StreamHandle>, PoolError> {
        self.check_index(index)?;
        Ok(self.entries[index].stream.clone())
    }

    pub fn set_weight(&mut self, index: usize, weight: f32) -> Result<(), PoolError> {
        self.check_index(index)?;
        if !weight.is_finite() || weight < 0.0 {
            return Err(PoolError::InvalidWeight(weight));
        }
        self.entries[index].weight = weight;
        Ok(())
    }

    pub fn weight(&self, index: usize) -> Result<f32, PoolError> {
        self.check_index(index)?;
        Ok(self.entries[index].weight)
    }

    /// Grows with empty entries or truncates, dropping the removed entries' streams.
    pub fn set_count(&mut self, count: usize) {
        self.entries.resize_with(count, PoolEntry::default);
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PoolEntry] {
        &self.entries
    }
}

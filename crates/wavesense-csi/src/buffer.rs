//! Row-oriented FIFO storage with contiguous views.

use ndarray::{Array2, ArrayView2, ArrayViewMut2};

use wavesense_core::{Error, Result};

/// Fixed-width matrix that keeps only its newest `capacity` rows.
///
/// Rows live in one contiguous allocation so the window can be handed out as
/// an `ndarray` view without copying. Evicted rows are skipped by a head
/// offset and compacted away once a full window's worth has accumulated.
#[derive(Debug, Clone)]
pub struct WindowBuffer<T> {
    data: Vec<T>,
    width: usize,
    capacity: usize,
    head: usize,
    rows: usize,
}

impl<T> WindowBuffer<T> {
    pub fn new(width: usize, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            data: Vec::with_capacity(width * capacity),
            width,
            capacity,
            head: 0,
            rows: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Append one row, evicting the oldest once over capacity.
    pub fn push_row<I>(&mut self, row: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
    {
        let before = self.data.len();
        self.data.extend(row);
        let pushed = self.data.len() - before;
        if pushed != self.width {
            self.data.truncate(before);
            return Err(Error::Shape(format!(
                "row of {} values for width {}",
                pushed, self.width
            )));
        }

        self.rows += 1;
        if self.rows > self.capacity {
            self.head += 1;
            self.rows -= 1;
        }
        if self.head >= self.capacity {
            self.data.drain(..self.head * self.width);
            self.head = 0;
        }
        Ok(())
    }

    /// Live rows, oldest first, as one flat slice.
    pub fn as_slice(&self) -> &[T] {
        &self.data[self.head * self.width..]
    }

    pub fn view(&self) -> Result<ArrayView2<'_, T>> {
        Ok(ArrayView2::from_shape(
            (self.rows, self.width),
            &self.data[self.head * self.width..],
        )?)
    }

    pub fn view_mut(&mut self) -> Result<ArrayViewMut2<'_, T>> {
        let start = self.head * self.width;
        Ok(ArrayViewMut2::from_shape(
            (self.rows, self.width),
            &mut self.data[start..],
        )?)
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.head = 0;
        self.rows = 0;
    }
}

impl<T: Clone> WindowBuffer<T> {
    /// Owned copy of the live rows.
    pub fn to_array(&self) -> Result<Array2<T>> {
        Ok(self.view()?.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest_rows() {
        let mut buffer = WindowBuffer::new(2, 3);
        for i in 0..5 {
            buffer.push_row([i, i * 10]).unwrap();
        }

        assert_eq!(buffer.len(), 3);
        let view = buffer.view().unwrap();
        assert_eq!(view.shape(), &[3, 2]);
        assert_eq!(view[[0, 0]], 2);
        assert_eq!(view[[2, 1]], 40);
    }

    #[test]
    fn test_rejects_wrong_width_without_side_effects() {
        let mut buffer = WindowBuffer::new(3, 4);
        buffer.push_row([1.0, 2.0, 3.0]).unwrap();

        assert!(buffer.push_row([1.0, 2.0]).is_err());
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.as_slice(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_compaction_keeps_contents() {
        let mut buffer = WindowBuffer::new(1, 4);
        for i in 0..50 {
            buffer.push_row([i]).unwrap();
        }
        assert_eq!(buffer.as_slice(), &[46, 47, 48, 49]);
    }

    #[test]
    fn test_mutable_view_writes_through() {
        let mut buffer = WindowBuffer::new(2, 2);
        buffer.push_row([1.0, 1.0]).unwrap();
        buffer.push_row([2.0, 2.0]).unwrap();
        buffer.push_row([3.0, 3.0]).unwrap();

        {
            let mut view = buffer.view_mut().unwrap();
            view.row_mut(1).fill(9.0);
        }
        assert_eq!(buffer.as_slice(), &[2.0, 2.0, 9.0, 9.0]);
    }
}

/// Ordered train/validation halves of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct ChronologicalSplit<T> {
    pub train: Vec<T>,
    pub validation: Vec<T>,
}

impl<T> ChronologicalSplit<T> {
    pub fn len(&self) -> usize {
        self.train.len() + self.validation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.train.is_empty() && self.validation.is_empty()
    }
}

/// `floor(fraction * len)`, clamped to `len`.
pub fn split_index(len: usize, fraction: f64) -> usize {
    if fraction.is_nan() || fraction <= 0.0 {
        return 0;
    }
    ((len as f64 * fraction).floor() as usize).min(len)
}

/// Splits at `floor(fraction * len)` without reordering: the prefix trains,
/// the suffix validates.
pub fn chronological_split<T>(mut items: Vec<T>, fraction: f64) -> ChronologicalSplit<T> {
    let split_at = split_index(items.len(), fraction);
    let validation = items.split_off(split_at);
    ChronologicalSplit {
        train: items,
        validation,
    }
}

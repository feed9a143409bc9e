/// Sampling primitives
///
/// All randomness flows through a `StdRng` that the caller constructs once per
/// query run and passes in explicitly; nothing here holds global state.
use crate::error::EngineResult;
use crate::ingestion::RowSource;
use crate::storage::columnar::ColumnarBatch;
use crate::storage::value::Value;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random source for one query run
pub fn query_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Keep exactly `round(rate * n)` rows chosen uniformly without replacement,
/// preserving their original order
pub fn uniform_sample(batch: &ColumnarBatch, rate: f64, rng: &mut StdRng) -> ColumnarBatch {
    let n = batch.row_count;
    let k = ((rate * n as f64).round() as usize).min(n);
    if k == n {
        return batch.clone();
    }
    let mut indices = rand::seq::index::sample(rng, n, k).into_vec();
    indices.sort_unstable();
    batch.take(&indices)
}

/// Independent per-row inclusion with probability `rate`
pub fn bernoulli_select(rows: &[usize], rate: f64, rng: &mut StdRng) -> Vec<usize> {
    rows.iter().copied().filter(|_| rng.gen::<f64>() < rate).collect()
}

/// Fixed-capacity uniform sample over a stream of unknown length (Algorithm R)
pub struct Reservoir<T> {
    capacity: usize,
    items: Vec<T>,
    seen: u64,
    rng: StdRng,
}

impl<T> Reservoir<T> {
    pub fn new(capacity: usize, seed: Option<u64>) -> Self {
        Self::with_rng(capacity, query_rng(seed))
    }

    pub fn with_rng(capacity: usize, rng: StdRng) -> Self {
        Self {
            capacity,
            items: Vec::with_capacity(capacity.min(1 << 16)),
            seen: 0,
            rng,
        }
    }

    pub fn feed(&mut self, item: T) {
        self.seen += 1;
        if self.items.len() < self.capacity {
            self.items.push(item);
            return;
        }
        if self.capacity == 0 {
            return;
        }
        // The n-th item survives with probability k/n and evicts a uniform slot
        let j = self.rng.gen_range(1..=self.seen);
        if j <= self.capacity as u64 {
            let slot = self.rng.gen_range(0..self.capacity);
            self.items[slot] = item;
        }
    }

    /// Number of items fed so far
    pub fn seen(&self) -> u64 {
        self.seen
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl<T> Extend<T> for Reservoir<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.feed(item);
        }
    }
}

/// Stream every row of `source` through a reservoir of `k` rows
pub fn reservoir_from_source(
    source: &dyn RowSource,
    k: usize,
    seed: Option<u64>,
    batch_size: usize,
) -> EngineResult<ColumnarBatch> {
    let mut iter = source.batches(None, batch_size)?;
    let schema = iter.schema();
    let mut reservoir: Reservoir<Vec<Value>> = Reservoir::new(k, seed);

    while let Some(batch) = iter.next()? {
        for row in 0..batch.row_count {
            reservoir.feed(batch.row(row));
        }
    }

    tracing::debug!(
        "Reservoir over '{}' kept {} of {} rows",
        source.name(),
        reservoir.items().len(),
        reservoir.seen()
    );

    let rows = reservoir.into_items();
    let mut columns: Vec<Vec<Value>> = schema.fields().iter().map(|_| Vec::with_capacity(rows.len())).collect();
    let row_count = rows.len();
    for row in rows {
        for (col, value) in columns.iter_mut().zip(row) {
            col.push(value);
        }
    }
    let mut batch = ColumnarBatch::new(columns, schema)?;
    batch.row_count = row_count;
    Ok(batch)
}

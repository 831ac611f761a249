use pdatastructs::tdigest::{TDigest, K1};
use tracing::error;

const TDIGEST_BACKLOG_SIZE: usize = 100;

/// Streaming quantile estimate over trend samples.
#[derive(Debug, Clone)]
pub(crate) struct Digest {
    tdigest: TDigest<K1>,
}

impl Digest {
    pub fn from_values(values: &[f64]) -> Self {
        let mut tdigest = TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE);
        for value in values {
            tdigest.insert(*value);
        }
        Self { tdigest }
    }

    /// `quantile` is in `0.0..=1.0`.
    pub fn quantile(&self, quantile: f64) -> f64 {
        let value = self.tdigest.quantile(quantile);

        // NOTE: TDigest occasionally yields NaN for sparse inputs.
        if value.is_finite() {
            value
        } else {
            error!("Non-finite quantile estimate for q={quantile}; reporting 0.");
            0.
        }
    }
}

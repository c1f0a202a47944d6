//! Grouping of index hits into contiguous read batches, and the per-batch
//! feature reader.

use crate::codec::table::read_u32;
use crate::codec::{Feature, SIZE_PREFIX_LEN};
use crate::config::Config;
use crate::error::{FgbError, Result};
use crate::index::SearchResult;
use crate::io::{BufferedRangeClient, RangeSource};
use bytes::Bytes;
use fgbstream_types::Header;
use futures::Stream;
use std::sync::Arc;

/// Byte location of one feature record, relative to the feature region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureLocation {
    pub offset: u64,
    pub length: u64,
    /// The length is a guess because the record was the last leaf.
    pub guessed: bool,
}

impl FeatureLocation {
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Feature locations in ascending offset order, close enough together to be
/// read through one buffered client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    locations: Vec<FeatureLocation>,
}

impl Batch {
    pub fn locations(&self) -> &[FeatureLocation] {
        &self.locations
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Bytes between the first record's start and the last record's end.
    pub fn span(&self) -> u64 {
        match (self.locations.first(), self.locations.last()) {
            (Some(first), Some(last)) => last.end() - first.offset,
            _ => 0,
        }
    }
}

/// Accumulates search hits into batches.
#[derive(Debug)]
pub struct BatchPlanner {
    threshold: u64,
    max_batches: usize,
    batches: Vec<Batch>,
    current: Batch,
}

impl BatchPlanner {
    pub fn new(config: &Config) -> Self {
        Self {
            threshold: config.extra_request_threshold as u64,
            max_batches: config.max_batches,
            batches: Vec::new(),
            current: Batch::default(),
        }
    }

    pub fn push(&mut self, hit: SearchResult) -> Result<()> {
        let location = match hit.length {
            Some(length) => FeatureLocation {
                offset: hit.offset,
                length,
                guessed: false,
            },
            None => {
                log::info!("final feature, guessing length {}", self.threshold);
                FeatureLocation {
                    offset: hit.offset,
                    length: self.threshold,
                    guessed: true,
                }
            }
        };

        if let Some(prev) = self.current.locations.last() {
            if location.offset < prev.offset {
                log::info!("pushing new feature batch, offset {} is behind", location.offset);
                self.close_current()?;
            } else {
                let gap = location.offset.saturating_sub(prev.end());
                if gap >= self.threshold {
                    log::info!("pushing new feature batch, since gap {} was too large", gap);
                    self.close_current()?;
                }
            }
        }
        self.current.locations.push(location);
        Ok(())
    }

    fn close_current(&mut self) -> Result<()> {
        if self.current.is_empty() {
            return Ok(());
        }
        if self.batches.len() >= self.max_batches {
            return Err(FgbError::Overflow(format!(
                "more than {} feature batches",
                self.max_batches
            )));
        }
        self.batches.push(std::mem::take(&mut self.current));
        Ok(())
    }

    pub fn finish(mut self) -> Result<Vec<Batch>> {
        self.close_current()?;
        Ok(self.batches)
    }
}

/// Plan batches for a complete list of hits.
pub fn plan_batches(
    hits: impl IntoIterator<Item = SearchResult>,
    config: &Config,
) -> Result<Vec<Batch>> {
    let mut planner = BatchPlanner::new(config);
    for hit in hits {
        planner.push(hit)?;
    }
    planner.finish()
}

/// Read one length-prefixed record at absolute `offset`.
pub(crate) async fn read_record<S: RangeSource>(
    client: &mut BufferedRangeClient<S>,
    offset: u64,
    min_request: usize,
) -> Result<Bytes> {
    let prefix = client
        .get_range(offset, SIZE_PREFIX_LEN, min_request, "feature length")
        .await?;
    let length = read_u32(&prefix, 0)? as usize;
    client
        .get_range(offset + SIZE_PREFIX_LEN as u64, length, min_request, "feature data")
        .await
}

/// Reads the features of one batch in order through its own buffered client.
pub struct BatchReader<S> {
    client: BufferedRangeClient<S>,
    locations: std::vec::IntoIter<FeatureLocation>,
    features_offset: u64,
    min_request: usize,
    header: Arc<Header>,
    max_depth: usize,
}

impl<S: RangeSource> BatchReader<S> {
    pub fn new(
        source: Arc<S>,
        batch: Batch,
        features_offset: u64,
        header: Arc<Header>,
        max_depth: usize,
    ) -> Self {
        let min_request = usize::try_from(batch.span()).unwrap_or(usize::MAX);
        Self {
            client: BufferedRangeClient::new(source),
            locations: batch.locations.into_iter(),
            features_offset,
            min_request,
            header,
            max_depth,
        }
    }

    async fn next_feature(&mut self) -> Result<Option<Feature>> {
        let Some(location) = self.locations.next() else {
            self.client.log_usage("feature");
            return Ok(None);
        };
        let record = read_record(
            &mut self.client,
            self.features_offset + location.offset,
            self.min_request,
        )
        .await?;
        if location.guessed && (record.len() + SIZE_PREFIX_LEN) as u64 > location.length {
            log::warn!(
                "final feature is {} bytes, longer than the guessed {}",
                record.len() + SIZE_PREFIX_LEN,
                location.length
            );
        }
        Feature::decode(&record, &self.header, self.max_depth).map(Some)
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Feature>> + Send + 'static {
        futures::stream::try_unfold(self, |mut reader| async move {
            Ok(reader.next_feature().await?.map(|feature| (feature, reader)))
        })
    }
}

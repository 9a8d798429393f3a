//! Names of the metrics the analysis reads or produces.
//!
//! Dumps carry many more metrics than listed here; everything numeric is kept
//! and diffed, these are only the ones with special meaning.

// block layer
pub const BLOCK_REQ_COUNT: &str = "blockReqCount";
pub const BLOCK_READ_SLAT_AVG: &str = "blockReadSlat_avg_ns";
pub const BLOCK_WRITE_SLAT_AVG: &str = "blockWriteSlat_avg_ns";
pub const BLOCK_READ_SLAT_PREFIX: &str = "blockReadSlat_";
pub const BLOCK_WRITE_SLAT_PREFIX: &str = "blockWriteSlat_";
pub const BANDWIDTH: &str = "bandwidth_byte/s";
pub const EXPERIMENT_TIME: &str = "experimentTime_s";
pub const WRITE_REQ_COUNT: &str = "writeReqCount";
pub const LOAD_DURATION_AVG: &str = "loadDuration_avg_ns";

// cache api
pub const T1_GET_COUNT: &str = "t1GetCount";
pub const FIND_LAT_AVG: &str = "findLat_avg_ns";
pub const ALLOC_COUNT: &str = "allocCount";
pub const ALLOC_LAT_AVG: &str = "allocLat_avg_ns";

// tiers
pub const T1_HIT_RATE: &str = "t1HitRate";
pub const T2_HIT_RATE: &str = "t2HitRate";
pub const T2_GET_COUNT: &str = "t2GetCount";
pub const T2_WRITE_LAT_P100: &str = "t2WriteLat_p100_us";
pub const T2_READ_LAT_AVG: &str = "t2ReadLat_avg_ns";
/// Number of items resident in tier-1.
pub const T1_SIZE: &str = "t1Size";
/// Number of pages resident in tier-2.
pub const T2_SIZE: &str = "t2Size";

// backing store
pub const BACKING_READ_LAT_AVG: &str = "backingReadLat_avg_ns";
pub const BACKING_WRITE_LAT_AVG: &str = "backingWriteLat_avg_ns";
pub const BACKING_REQ_COUNT: &str = "backingReqCount";
pub const BACKING_WRITE_REQ_COUNT: &str = "backingWriteReqCount";
pub const BACKING_READ_IO_BYTES: &str = "backingReadIORequested_byte";
pub const BACKING_WRITE_IO_BYTES: &str = "backingWriteIORequested_byte";
pub const BACKING_READ_SIZE_AVG: &str = "backingReadSize_avg_byte";
pub const BACKING_WRITE_SIZE_AVG: &str = "backingWriteSize_avg_byte";

// configuration, injected into the row after parsing
pub const CACHE_SIZE_MB: &str = "cacheSizeMB";
pub const NVM_CACHE_SIZE_MB: &str = "nvmCacheSizeMB";
pub const T1_ALLOC_SIZE: &str = "t1AllocSize";
pub const PAGE_SIZE_BYTES: &str = "pageSizeBytes";
pub const INPUT_QUEUE_SIZE: &str = "inputQueueSize";
pub const PROCESSOR_THREAD_COUNT: &str = "processorThreadCount";
pub const SCALE_IAT: &str = "scaleIAT";

// derived
pub const T2_HIT_COUNT: &str = "t2HitCount";
pub const HMRC1: &str = "hmrc1";
pub const WRITE_IO_RATIO: &str = "writeIORatio";
pub const WRITE_REQ_RATIO: &str = "writeReqRatio";
pub const FIND_LATENCY_INCREASE: &str = "findLatencyIncrease";
pub const ALLOC_LATENCY_INCREASE: &str = "allocLatencyIncrease";
pub const LOAD_LATENCY_INCREASE: &str = "loadLatencyIncrease";
pub const OVERHEAD: &str = "overhead";
pub const T2_GAIN: &str = "t2Gain";
pub const BACKING_WRITE_GAIN: &str = "backingWriteGain";
pub const BACKING_READ_GAIN: &str = "backingReadGain";
pub const NET_GAIN: &str = "netGain";
pub const T1_T2_SIZE_RATIO: &str = "t1_t2_size_ratio";
pub const T1_T2_HR_RATIO: &str = "t1_t2_hr_ratio";

// time series snapshot fields
pub const SNAPSHOT_TIMESTAMP: &str = "T";
pub const READ_IO_PROCESSED: &str = "readIOProcessed";
pub const WRITE_IO_PROCESSED: &str = "writeIOProcessed";

/// Metrics a dump must report before it is considered a finished run.
/// `inputQueueSize` may come from the configuration block instead.
pub const REQUIRED_FOR_COMPLETE: [&str; 4] =
    [T2_WRITE_LAT_P100, T2_GET_COUNT, INPUT_QUEUE_SIZE, BANDWIDTH];

/// Metrics that are written only once the benchmark reached its end.
pub const REQUIRED_FOR_SANITY: [&str; 3] =
    [BLOCK_REQ_COUNT, BLOCK_WRITE_SLAT_AVG, BLOCK_READ_SLAT_AVG];

/// Fields copied verbatim from the MT row into a diff record instead of
/// being expressed as a percent change.
pub const RAW_DIFF_FIELDS: [&str; 11] = [
    INPUT_QUEUE_SIZE,
    PROCESSOR_THREAD_COUNT,
    SCALE_IAT,
    CACHE_SIZE_MB,
    NVM_CACHE_SIZE_MB,
    T1_HIT_RATE,
    T2_HIT_RATE,
    HMRC1,
    T2_HIT_COUNT,
    WRITE_IO_RATIO,
    WRITE_REQ_RATIO,
];

/// Average item size in tier-2 including per-item overhead.
pub const T2_ITEM_SIZE_BYTES: f64 = 4136.0;
pub const DEFAULT_HMR_PAGE_SIZE: u64 = 4096;

pub mod config;
pub mod diff;
pub mod error;
pub mod event;
pub mod feed;
pub mod fetch;
pub mod infra;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod processor;
pub mod storage;
pub mod translate;

pub mod gtfs_rt {
    include!(concat!(env!("OUT_DIR"), "/transit_realtime.rs"));
}

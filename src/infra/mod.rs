//! AWS-backed adapters: S3 object storage and SSM secrets.

pub mod keys;
pub mod s3;
